//! Background music playlist.
//!
//! Lifecycle:
//!   Uninitialized -> (probe tracks) -> Ready | Disabled
//!
//! `Disabled` is terminal: no configured track was reachable, the player
//! surface is hidden and every playback operation is a no-op.
//!
//! The current index and volume are persisted (fire-and-forget) under
//! [`KEY_TRACK_INDEX`] and [`KEY_VOLUME`]; whether music is playing is not.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::storage::{KeyValueStore, KEY_TRACK_INDEX, KEY_VOLUME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// URL (`http://`, `https://`) or filesystem path.
    pub src: String,
    pub title: String,
}

impl Track {
    pub fn new(src: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            title: title.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.src.starts_with("http://") || self.src.starts_with("https://")
    }
}

// ── Collaborators ─────────────────────────────────────────────────────────────

/// The environment refused to start playback (e.g. no audio backend).
#[derive(Debug, thiserror::Error)]
#[error("playback rejected: {0}")]
pub struct PlaybackRejected(pub String);

/// The surface that actually plays audio and shows the player.
pub trait AudioOutput {
    /// Point the output at `track` without starting playback.
    fn load(&mut self, track: &Track);
    fn play(&mut self) -> Result<(), PlaybackRejected>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
    /// Remove the player from view for good.
    fn hide(&mut self);
}

#[async_trait]
pub trait TrackProbe: Send + Sync {
    async fn is_available(&self, track: &Track) -> bool;
}

/// `HEAD` request for URLs, existence check for filesystem paths.
pub struct ResourceProbe {
    client: reqwest::Client,
}

impl ResourceProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("keepsake/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TrackProbe for ResourceProbe {
    async fn is_available(&self, track: &Track) -> bool {
        if !track.is_remote() {
            return tokio::fs::metadata(Path::new(&track.src))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
        }
        match self.client.head(&track.src).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", track.src, e);
                false
            }
        }
    }
}

/// Probe every track concurrently and keep the reachable ones, in the
/// original order regardless of which probe finishes first.
pub async fn available_tracks(tracks: &[Track], probe: &dyn TrackProbe) -> Vec<Track> {
    let results = join_all(tracks.iter().map(|t| probe.is_available(t))).await;
    tracks
        .iter()
        .zip(results)
        .filter_map(|(track, ok)| {
            if !ok {
                warn!("Track not available: {} ({})", track.title, track.src);
            }
            ok.then(|| track.clone())
        })
        .collect()
}

// ── Controller ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Uninitialized,
    Ready,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub current_index: usize,
    pub volume: f32,
    pub is_playing: bool,
}

pub struct PlaylistController<O: AudioOutput> {
    output: O,
    store: Arc<dyn KeyValueStore>,
    playlist: Vec<Track>,
    state: PlayerState,
    status: PlayerStatus,
}

impl<O: AudioOutput> PlaylistController<O> {
    /// `default_volume` applies only when no volume has been persisted.
    pub fn new(output: O, store: Arc<dyn KeyValueStore>, default_volume: f32) -> Self {
        let current_index = store
            .get(KEY_TRACK_INDEX)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let volume = store
            .get(KEY_VOLUME)
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default_volume)
            .clamp(0.0, 1.0);

        Self {
            output,
            store,
            playlist: Vec::new(),
            state: PlayerState {
                current_index,
                volume,
                is_playing: false,
            },
            status: PlayerStatus::Uninitialized,
        }
    }

    pub async fn initialize(&mut self, configured: &[Track], probe: &dyn TrackProbe) {
        let available = available_tracks(configured, probe).await;

        if available.is_empty() {
            warn!("No music tracks available. Music player will be hidden.");
            self.status = PlayerStatus::Disabled;
            self.output.hide();
            return;
        }

        info!(
            "{} of {} tracks available",
            available.len(),
            configured.len()
        );
        self.playlist = available;
        self.status = PlayerStatus::Ready;
        self.output.set_volume(self.state.volume);
        let index = self.state.current_index.min(self.playlist.len() - 1);
        self.load_track(index);
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn current_track(&self) -> Option<&Track> {
        match self.status {
            PlayerStatus::Ready => self.playlist.get(self.state.current_index),
            _ => None,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn play(&mut self) {
        if self.status != PlayerStatus::Ready || self.state.is_playing {
            return;
        }
        match self.output.play() {
            Ok(()) => self.state.is_playing = true,
            Err(e) => {
                warn!("Autoplay prevented: {}", e);
                self.state.is_playing = false;
            }
        }
    }

    pub fn pause(&mut self) {
        if self.status != PlayerStatus::Ready {
            return;
        }
        self.output.pause();
        self.state.is_playing = false;
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn next(&mut self) {
        if self.status != PlayerStatus::Ready {
            return;
        }
        let len = self.playlist.len();
        self.switch_to((self.state.current_index + 1) % len);
    }

    pub fn previous(&mut self) {
        if self.status != PlayerStatus::Ready {
            return;
        }
        let len = self.playlist.len();
        self.switch_to((self.state.current_index + len - 1) % len);
    }

    /// A track failed mid-playback; move on as if the user pressed next.
    /// There is no cycle limit: a playlist of broken tracks keeps rotating.
    pub fn on_track_error(&mut self, reason: &str) {
        warn!("Audio error: {}", reason);
        self.next();
    }

    pub fn on_track_ended(&mut self) {
        debug!("Track ended");
        self.next();
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        self.output.set_volume(volume);
        self.persist(KEY_VOLUME, &volume.to_string());
    }

    fn switch_to(&mut self, index: usize) {
        let was_playing = self.state.is_playing;
        self.load_track(index);
        if was_playing {
            self.play();
        }
    }

    fn load_track(&mut self, index: usize) {
        let Some(track) = self.playlist.get(index) else {
            return;
        };
        debug!("Loading track {}: {}", index, track.title);
        self.output.load(track);
        self.state.current_index = index;
        self.state.is_playing = false;
        self.persist(KEY_TRACK_INDEX, &index.to_string());
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("Failed to persist {}: {}", key, e);
        }
    }
}
