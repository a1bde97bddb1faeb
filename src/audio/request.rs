use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};
use std::{fmt, sync::Arc, time::Duration};

use super::backend::{PlaybackHandle, StreamOptions, TrackMetadata};

/// One playback unit: what to play, who asked, and where to report.
///
/// Everything except the handle slot and its metadata is fixed at creation.
/// The handle slot is only ever replaced by [`PlaybackQueue`] while it holds
/// its lock, so a refresh never interleaves with a stop.
///
/// [`PlaybackQueue`]: super::queue::PlaybackQueue
#[derive(Clone)]
pub struct Request {
    pub requester: UserId,
    pub channel: ChannelId,
    pub locator: String,
    pub options: StreamOptions,
    pub requested_at: DateTime<Utc>,
    metadata: Option<TrackMetadata>,
    handle: Option<Arc<dyn PlaybackHandle>>,
}

impl Request {
    pub fn new(
        requester: UserId,
        channel: ChannelId,
        locator: impl Into<String>,
        options: StreamOptions,
    ) -> Self {
        Self {
            requester,
            channel,
            locator: locator.into(),
            options,
            requested_at: Utc::now(),
            metadata: None,
            handle: None,
        }
    }

    /// Attaches metadata resolved at admission time.
    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata(&self) -> Option<&TrackMetadata> {
        self.metadata.as_ref()
    }

    pub fn handle(&self) -> Option<&Arc<dyn PlaybackHandle>> {
        self.handle.as_ref()
    }

    /// Swaps in a fresh stream, returning the one it replaces.
    pub(crate) fn replace_handle(
        &mut self,
        handle: Arc<dyn PlaybackHandle>,
    ) -> Option<Arc<dyn PlaybackHandle>> {
        self.metadata = Some(handle.metadata().clone());
        self.handle.replace(handle)
    }

    pub fn title(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.title.as_str())
            .unwrap_or(&self.locator)
    }

    /// Renders the request for "now playing" and "queued" announcements.
    pub fn describe(&self) -> String {
        let mut text = format!("**{}**", self.title());

        let duration = self.metadata.as_ref().and_then(|m| m.duration);
        if let Some(duration) = duration {
            text.push_str(&format!("\n[{}]", format_duration(duration)));
        }

        let uploader = self
            .metadata
            .as_ref()
            .and_then(|m| m.uploader.as_deref())
            .unwrap_or("unknown");
        text.push_str(&format!(" by {}\nQueued by <@{}>", uploader, self.requester));

        text
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("requester", &self.requester)
            .field("channel", &self.channel)
            .field("locator", &self.locator)
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

/// `m:ss`, or `h:mm:ss` past an hour.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
