use keepsake_core::carousel::Carousel;
use keepsake_core::chat::{
    ChatError, ChatResolver, ConversationEntry, HttpAnswerService, KeywordDictionary,
};
use keepsake_core::config::Config;
use keepsake_core::gallery::Lightbox;
use keepsake_core::playlist::{PlayerStatus, PlaylistController, ResourceProbe, Track};
use keepsake_core::preferences::{Language, Preferences, Theme};
use keepsake_core::scroll::{back_to_top_visible, PageLayout, RevealTracker};
use keepsake_core::storage::KeyValueStore;
use keepsake_core::verse::Verse;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::command::{GalleryAction, ShellCommand, SlideAction, HELP};
use crate::player::{MpvOutput, PlayerEvent};

/// How long the loading splash stays up once everything has loaded.
pub const SPLASH_HOLD: Duration = Duration::from_millis(500);

const SPLASH: &str = "♥ keepsake · loading…";

/// Everything on the page, owned by the shell's event loop.
pub struct Page {
    chat: ChatResolver,
    player: PlaylistController<MpvOutput>,
    prefs: Preferences,
    carousel: Carousel,
    lightbox: Lightbox,
    layout: PageLayout,
    reveals: RevealTracker,
    verses: Vec<Verse>,
    viewport_height: f64,
    scroll_y: f64,
}

impl Page {
    pub async fn build(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        player_events: mpsc::Sender<PlayerEvent>,
    ) -> anyhow::Result<Self> {
        let service = HttpAnswerService::from_config(&config.chat)?;
        let chat = ChatResolver::new(
            Arc::new(service),
            KeywordDictionary::builtin(),
            config.story_text(),
            store.clone(),
        );

        let base = Config::config_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let tracks: Vec<Track> = config
            .player
            .tracks
            .iter()
            .map(|t| resolve_track(t, &base))
            .collect();
        let probe = ResourceProbe::new(Duration::from_millis(config.player.probe_timeout_ms))?;
        let mut player = PlaylistController::new(
            MpvOutput::start(player_events).await,
            store.clone(),
            config.player.default_volume,
        );
        player.initialize(&tracks, &probe).await;

        let prefs = Preferences::load(store, prefers_dark());

        Ok(Self {
            chat,
            player,
            prefs,
            carousel: Carousel::new(config.carousel.slides.clone()),
            lightbox: Lightbox::new(config.gallery.images.clone()),
            layout: PageLayout::new(config.page.header_height, &config.page.sections),
            reveals: RevealTracker::new(),
            verses: config.page.verses.clone(),
            viewport_height: config.page.viewport_height,
            scroll_y: 0.0,
        })
    }

    /// Shown before `build`; `render_startup` replaces it.
    pub fn render_splash() {
        println!("{}", SPLASH);
    }

    pub fn render_startup(&mut self) {
        println!("{}", "─".repeat(SPLASH.chars().count()));
        self.render_preferences();
        for entry in self.chat.replay() {
            print_entry(entry);
        }
        self.on_scroll(0.0);
        println!("type `help` for commands");
    }

    pub async fn handle(&mut self, cmd: ShellCommand) {
        match cmd {
            ShellCommand::Empty | ShellCommand::Quit => {}
            ShellCommand::Ask(text) => self.ask(&text).await,
            ShellCommand::Play => self.player.play(),
            ShellCommand::Pause => self.player.pause(),
            ShellCommand::Toggle => self.player.toggle_play_pause(),
            ShellCommand::Next => self.player.next(),
            ShellCommand::Prev => self.player.previous(),
            ShellCommand::Volume(v) => {
                self.player.set_volume(v);
                println!("volume {:.0}%", self.player.state().volume * 100.0);
            }
            ShellCommand::Theme(theme) => self.set_theme(theme),
            ShellCommand::Lang(lang) => self.set_language(lang),
            ShellCommand::Slide(action) => {
                match action {
                    SlideAction::Next => self.carousel.next(),
                    SlideAction::Prev => self.carousel.previous(),
                    SlideAction::Show => {}
                }
                self.render_slide();
            }
            ShellCommand::Hover(true) => self.carousel.hover_enter(),
            ShellCommand::Hover(false) => self.carousel.hover_leave(),
            ShellCommand::Gallery(action) => self.gallery(action),
            ShellCommand::Scroll(y) => self.on_scroll(y),
            ShellCommand::Copy(idx) => self.copy_verse(idx),
            ShellCommand::Like(idx) => self.like_verse(idx),
            ShellCommand::Status => self.render_status(),
            ShellCommand::Help => println!("{}", HELP),
        }
    }

    pub fn on_player_event(&mut self, event: PlayerEvent) {
        if event.generation() != self.player.output().generation() {
            debug!("Dropping stale player event {:?}", event);
            return;
        }
        match event {
            PlayerEvent::Ended { .. } => self.player.on_track_ended(),
            PlayerEvent::Failed { reason, .. } => self.player.on_track_error(&reason),
        }
    }

    pub fn on_autoplay_tick(&mut self) {
        if self.carousel.tick() {
            debug!("Carousel advanced to slide {}", self.carousel.current_index());
        }
    }

    pub fn shutdown(&mut self) {
        self.player.output_mut().shutdown();
    }

    async fn ask(&mut self, text: &str) {
        println!("… typing");
        match self.chat.resolve(text).await {
            Ok(reply) => {
                if let Some(entry) = self.chat.history().last() {
                    print_entry(entry);
                }
                debug!("Reply source: {:?}", reply.source);
            }
            Err(ChatError::EmptyMessage) => {}
            Err(e) => {
                error!("Chat failed: {}", e);
                println!("! {}", e);
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        if let Err(e) = self.prefs.set_theme(theme) {
            warn!("Failed to save theme: {}", e);
        }
        self.render_preferences();
    }

    fn set_language(&mut self, lang: Language) {
        if let Err(e) = self.prefs.set_language(lang) {
            warn!("Failed to save language: {}", e);
        }
        self.render_preferences();
    }

    fn gallery(&mut self, action: GalleryAction) {
        match action {
            GalleryAction::Open(idx) => {
                if self.lightbox.open(idx).is_none() {
                    println!("no image {}", idx + 1);
                    return;
                }
            }
            GalleryAction::Next => self.lightbox.show_next(),
            GalleryAction::Prev => self.lightbox.show_previous(),
            GalleryAction::Close => self.lightbox.close(),
            GalleryAction::Key(key) => {
                if !self.lightbox.handle_key(key) {
                    return;
                }
            }
        }
        self.render_lightbox();
    }

    fn on_scroll(&mut self, y: f64) {
        self.scroll_y = y.max(0.0);
        for section in self.layout.sections() {
            let ratio = PageLayout::visible_ratio(section, self.scroll_y, self.viewport_height);
            if self.reveals.observe(&section.id, ratio) {
                println!("✧ {} fades in", section.id);
            }
        }
        match self.layout.active_section(self.scroll_y) {
            Some(id) => println!("[#{}]", id),
            None => println!("[—]"),
        }
        if back_to_top_visible(self.scroll_y) {
            println!("↑ back to top");
        }
    }

    fn copy_verse(&mut self, idx: usize) {
        let Some(verse) = self.verses.get(idx) else {
            println!("no verse {}", idx + 1);
            return;
        };
        let text = verse.clipboard_text();
        let copied = arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone()));
        match copied {
            Ok(()) => println!("Copied to clipboard!"),
            Err(e) => {
                error!("Failed to copy text: {}", e);
                println!("Copy manually:\n{}", text);
            }
        }
    }

    fn like_verse(&mut self, idx: usize) {
        let Some(verse) = self.verses.get_mut(idx) else {
            println!("no verse {}", idx + 1);
            return;
        };
        let hearts = verse.toggle_like();
        if hearts > 0 {
            println!("{}", "❤ ".repeat(hearts).trim_end());
        } else {
            println!("♡");
        }
    }

    fn render_preferences(&self) {
        let theme = self.prefs.theme();
        let lang = self.prefs.language();
        let palette = theme.palette();
        println!(
            "theme {} (particles {} / {}), language {} {:?}",
            theme,
            palette.particle,
            palette.line,
            lang.code(),
            lang.direction()
        );
        info!("Preferences: theme={} language={}", theme, lang.code());
    }

    fn render_slide(&self) {
        match self.carousel.current() {
            Some(slide) => println!(
                "slide {}/{}: {} {}",
                self.carousel.current_index() + 1,
                self.carousel.len(),
                slide.src,
                slide.caption
            ),
            None => println!("no slides"),
        }
    }

    fn render_lightbox(&self) {
        if !self.lightbox.is_open() {
            println!("(lightbox closed)");
            return;
        }
        if let Some(image) = self.lightbox.current() {
            println!("▣ {} — {}", image.src, image.caption);
        }
        let preload: Vec<&str> = self
            .lightbox
            .preload_indices()
            .into_iter()
            .filter_map(|i| self.lightbox.images().get(i))
            .map(|img| img.src.as_str())
            .collect();
        debug!("Preloading {:?}", preload);
    }

    fn render_status(&self) {
        let state = self.player.state();
        match self.player.status() {
            PlayerStatus::Ready => {
                let title = self
                    .player
                    .current_track()
                    .map(|t| t.title.as_str())
                    .unwrap_or("?");
                println!(
                    "music: {} [{}] {}/{} vol {:.0}%",
                    title,
                    if state.is_playing { "playing" } else { "paused" },
                    state.current_index + 1,
                    self.player.playlist().len(),
                    state.volume * 100.0
                );
            }
            PlayerStatus::Disabled if self.player.output().is_hidden() => {
                println!("music: hidden, no tracks available")
            }
            PlayerStatus::Disabled | PlayerStatus::Uninitialized => println!("music: unavailable"),
        }
        self.render_slide();
        println!("chat: {} messages", self.chat.history().len());
    }
}

fn print_entry(entry: &ConversationEntry) {
    let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_default();
    println!("{} {}> {}", when, entry.sender.label(), entry.text);
}

/// Relative local paths in the config are relative to the config directory.
fn resolve_track(track: &Track, base: &Path) -> Track {
    if track.is_remote() || Path::new(&track.src).is_absolute() {
        return track.clone();
    }
    Track::new(base.join(&track.src).to_string_lossy(), track.title.clone())
}

/// Best-effort terminal color scheme detection via `COLORFGBG` ("fg;bg").
fn prefers_dark() -> bool {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()))
        .map(|bg| bg < 7 || bg == 8)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splash_is_one_short_line() {
        assert!(!SPLASH.contains('\n'));
        assert_eq!(SPLASH_HOLD, Duration::from_millis(500));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_track_paths() {
        let base = Path::new("/home/me/.config/keepsake");
        let local = resolve_track(&Track::new("music/song1.mp3", "One"), base);
        assert_eq!(local.src, "/home/me/.config/keepsake/music/song1.mp3");

        let remote = Track::new("https://example.org/a.mp3", "A");
        assert_eq!(resolve_track(&remote, base), remote);
    }
}
