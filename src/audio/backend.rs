//! Seams between the playback core and the outside world.
//!
//! The core never talks to Discord or songbird directly. It drives a
//! [`VoiceConnection`] per guild, the [`PlaybackHandle`]s that connection
//! produces, and a [`Messenger`] for announcements. The production
//! implementations live in `crate::bot`.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serenity::model::id::ChannelId;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::sync::oneshot;

/// How an ambiguous locator is resolved into a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// URLs are streamed directly, anything else is searched.
    #[default]
    Auto,
    /// Always search, even if the text parses as a URL.
    Search,
    /// Only accept URLs.
    Url,
}

impl SearchMode {
    /// Whether `locator` should be handed to the search backend.
    pub fn is_search(&self, locator: &str) -> bool {
        match self {
            SearchMode::Auto => !url::Url::parse(locator.trim())
                .map(|url| matches!(url.scheme(), "http" | "https"))
                .unwrap_or(false),
            SearchMode::Search => true,
            SearchMode::Url => false,
        }
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SearchMode::Auto),
            "search" => Ok(SearchMode::Search),
            "url" => Ok(SearchMode::Url),
            other => anyhow::bail!("unknown search mode: {}", other),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Auto => "auto",
            SearchMode::Search => "search",
            SearchMode::Url => "url",
        };
        f.write_str(name)
    }
}

/// Options fixed when a request is created and passed to every stream built for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct StreamOptions {
    pub search_mode: SearchMode,
    /// Suppress verbose diagnostics while resolving.
    pub quiet: bool,
}

/// What the source reports about a stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// One-shot "this stream is finished" signal.
///
/// Handed to [`VoiceConnection::create_stream`] and fired by the streaming
/// side when the stream ends for any reason. `fire` is synchronous and
/// thread-safe, so it may be called from a songbird event task, a driver
/// thread, or anywhere else. Only the first call has an effect.
#[derive(Clone)]
pub struct Completion {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Awaiting side of a [`Completion`].
pub type CompletionWait = oneshot::Receiver<()>;

impl Completion {
    pub fn new() -> (Self, CompletionWait) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn fire(&self) {
        if let Some(tx) = self.tx.lock().take() {
            // The waiter may already be gone (loop cancelled).
            let _ = tx.send(());
        }
    }

    /// True until the signal has been fired.
    pub fn is_pending(&self) -> bool {
        self.tx.lock().is_some()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// A single playable stream.
///
/// Volume is a fraction in `0.0..=1.0`.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    async fn start(&self) -> Result<()>;
    fn stop(&self);
    fn pause(&self);
    fn resume(&self);
    fn is_paused(&self) -> bool;
    /// The stream has ended (naturally, stopped or errored).
    fn is_done(&self) -> bool;
    fn volume(&self) -> f32;
    fn set_volume(&self, volume: f32);
    fn metadata(&self) -> &TrackMetadata;
}

impl fmt::Debug for dyn PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("title", &self.metadata().title)
            .field("paused", &self.is_paused())
            .field("done", &self.is_done())
            .finish()
    }
}

/// A guild's voice connection.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Resolves metadata without creating a stream. Used to reject bad
    /// requests before they are queued.
    async fn resolve(&self, locator: &str, options: &StreamOptions) -> Result<TrackMetadata>;

    /// Creates a stream that is ready to `start`. `on_complete` must be fired
    /// exactly once when the stream ends.
    async fn create_stream(
        &self,
        locator: &str,
        options: &StreamOptions,
        on_complete: Completion,
    ) -> Result<Arc<dyn PlaybackHandle>>;

    /// Moves the connection to another voice channel.
    async fn move_to(&self, channel: ChannelId) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Fire-and-forget text delivery to a channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()>;
}
