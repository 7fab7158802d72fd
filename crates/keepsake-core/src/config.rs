use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use super::carousel::Slide;
use super::gallery::GalleryImage;
use super::platform;
use super::playlist::Track;
use super::scroll::Section;
use super::verse::Verse;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub carousel: CarouselConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Remote answer endpoint, POSTed `{question, storyContext}`.
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,
    /// Plain-text narrative sent along with every question.
    #[serde(default = "default_story_file")]
    pub story_file: PathBuf,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume used when nothing has been persisted yet.
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Per-track availability check timeout (HEAD request for URLs).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_tracks")]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarouselConfig {
    #[serde(default = "default_autoplay_secs")]
    pub autoplay_secs: u64,
    #[serde(default = "default_slides")]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default)]
    pub images: Vec<GalleryImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_header_height")]
    pub header_height: f64,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    #[serde(default = "default_verses")]
    pub verses: Vec<Verse>,
    #[serde(default = "default_sections")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON file holding every persisted key (history, player, preferences).
    #[serde(default = "default_storage_file")]
    pub storage_file: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            story_file: default_story_file(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            probe_timeout_ms: default_probe_timeout_ms(),
            tracks: default_tracks(),
        }
    }
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            autoplay_secs: default_autoplay_secs(),
            slides: default_slides(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            header_height: default_header_height(),
            viewport_height: default_viewport_height(),
            verses: default_verses(),
            sections: default_sections(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_file: default_storage_file(),
        }
    }
}

fn default_chat_endpoint() -> String {
    "http://127.0.0.1:8888/.netlify/functions/ask-ai".to_string()
}

fn default_story_file() -> PathBuf {
    platform::config_dir().join("story.txt")
}

fn default_connect_timeout_ms() -> u64 {
    4000
}

fn default_request_timeout_ms() -> u64 {
    20000
}

fn default_tracks() -> Vec<Track> {
    vec![
        Track::new("music/song1.mp3", "Our Special Song"),
        Track::new("music/song2.mp3", "Campus Memories"),
        Track::new("music/song3.mp3", "Dreamy Nights"),
    ]
}

fn default_volume() -> f32 {
    0.5
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_slides() -> Vec<Slide> {
    (1..=3)
        .map(|n| Slide {
            src: format!("images/slide{}.jpg", n),
            caption: String::new(),
        })
        .collect()
}

fn default_autoplay_secs() -> u64 {
    5
}

fn default_header_height() -> f64 {
    80.0
}

fn default_viewport_height() -> f64 {
    900.0
}

fn default_verses() -> Vec<Verse> {
    vec![Verse::new(
        "Emily Brontë",
        &["Whatever our souls are made of,", "his and mine are the same."],
    )]
}

fn default_sections() -> Vec<Section> {
    ["home", "story", "gallery", "poetry", "chat"]
        .into_iter()
        .map(|id| Section::new(id, 800.0))
        .collect()
}

fn default_storage_file() -> PathBuf {
    platform::data_dir().join("storage.json")
}

const PLACEHOLDER_STORY: &str = "\
Replace this text with your story: how you met, the places you went, \
the songs that mattered. The chat sends it along with every question.
";

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            config.write_placeholder_story()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Narrative text for the chat context. Empty when the file is absent.
    pub fn story_text(&self) -> String {
        match std::fs::read_to_string(&self.chat.story_file) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Story file {:?} unreadable, chat context will be empty: {}",
                    self.chat.story_file, e
                );
                String::new()
            }
        }
    }

    /// First run only: never overwrites an existing story.
    pub fn write_placeholder_story(&self) -> anyhow::Result<()> {
        let path = &self.chat.story_file;
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, PLACEHOLDER_STORY)?;
        info!("Wrote placeholder story to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.chat.endpoint.ends_with("/.netlify/functions/ask-ai"));
        assert_eq!(config.player.tracks.len(), 3);
        assert_eq!(config.player.tracks[1].title, "Campus Memories");
        assert_eq!(config.player.default_volume, 0.5);
        assert_eq!(config.player.probe_timeout_ms, 5000);
        assert_eq!(config.carousel.autoplay_secs, 5);
        assert!(config.paths.storage_file.ends_with("keepsake/storage.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[chat]
endpoint = "https://example.org/ask"

[[player.tracks]]
src = "https://example.org/a.mp3"
title = "A"

[[gallery.images]]
src = "images/one.jpg"
caption = "First"
"#,
        )
        .unwrap();
        assert_eq!(config.chat.endpoint, "https://example.org/ask");
        assert_eq!(config.chat.request_timeout_ms, 20000);
        assert_eq!(config.player.tracks, vec![Track::new("https://example.org/a.mp3", "A")]);
        assert_eq!(config.gallery.images.len(), 1);
        assert_eq!(config.page.sections.len(), 5);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::from_toml_str(&text).unwrap();
        assert_eq!(parsed.player.tracks, Config::default().player.tracks);
    }

    #[test]
    fn test_placeholder_story_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.chat.story_file = dir.path().join("nested").join("story.txt");
        assert_eq!(config.story_text(), "");

        config.write_placeholder_story().unwrap();
        assert_eq!(config.story_text(), PLACEHOLDER_STORY);

        std::fs::write(&config.chat.story_file, "We met in the library.").unwrap();
        config.write_placeholder_story().unwrap();
        assert_eq!(config.story_text(), "We met in the library.");
    }
}
