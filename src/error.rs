use thiserror::Error;

/// Errors produced by the playback core.
///
/// None of these terminate a guild's playback loop. Each one is turned into a
/// user-facing message at the boundary of the operation that produced it
/// (see [`crate::ui::messages`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    /// The locator could not be turned into a playable stream.
    #[error("could not resolve `{locator}`: {reason}")]
    Admission { locator: String, reason: String },

    /// Pause, volume or skip invoked while nothing is active.
    #[error("nothing is playing")]
    NotPlaying,

    /// Resume invoked while the active stream is not paused.
    #[error("nothing to resume")]
    NothingToResume,

    /// Volume percentage outside 0..=100. Never clamped.
    #[error("volume must be between 0 and 100, got {0}")]
    InvalidVolume(i64),

    /// No voice connection is attached to the guild.
    #[error("not connected to a voice channel")]
    NotConnected,

    /// The guild's loop was torn down by an explicit stop.
    #[error("playback loop cancelled")]
    Cancelled,
}

impl PlaybackError {
    pub fn admission(locator: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Admission {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;
