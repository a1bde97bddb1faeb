//! User-facing text for every playback outcome.

use crate::{
    audio::{Request, SkipOutcome},
    error::PlaybackError,
};

pub const NOT_PLAYING: &str = "I'm not playing anything right now.";
pub const SKIPPING: &str = "Skipping...";

pub fn now_playing(request: &Request) -> String {
    format!("I'm currently playing:\n{}", request.describe())
}

pub fn queued(request: &Request, position: usize) -> String {
    format!("Added to queue (#{}):\n{}", position, request.describe())
}

pub fn accepted(request: &Request) -> String {
    format!("🎶 Got it, starting **{}**", request.title())
}

pub fn playback_error(error: &PlaybackError) -> String {
    match error {
        PlaybackError::Admission { reason, .. } => format!(
            "I could not process this request. Here's what went wrong: ```\n{}\n```",
            reason
        ),
        PlaybackError::NotPlaying => NOT_PLAYING.to_string(),
        PlaybackError::NothingToResume => "I have nothing to resume.".to_string(),
        PlaybackError::InvalidVolume(_) => {
            "You need to give me a volume level between 0-100 as follows: \n/volume <percentage>"
                .to_string()
        }
        PlaybackError::NotConnected => {
            "I'm not connected to a voice channel. Use /join or /summon first.".to_string()
        }
        PlaybackError::Cancelled => "Playback was stopped.".to_string(),
    }
}

pub fn volume_error(error: &PlaybackError) -> String {
    match error {
        PlaybackError::NotPlaying => {
            "I can't set the volume because I'm not playing anything right now.".to_string()
        }
        other => playback_error(other),
    }
}

pub fn volume_set(volume: f32) -> String {
    format!("I set the volume to {}%.", (volume * 100.0).round() as u32)
}

pub fn skip_outcome(outcome: &SkipOutcome) -> String {
    match outcome {
        SkipOutcome::NothingPlaying => NOT_PLAYING.to_string(),
        SkipOutcome::Skipped | SkipOutcome::Cleanup => SKIPPING.to_string(),
        SkipOutcome::VoteRecorded { votes, needed } => {
            format!("**{}/{}** people have asked me to skip this.", votes, needed)
        }
        SkipOutcome::AlreadyVoted => {
            "I'm gonna be real with you chief, you've already asked me to skip this.".to_string()
        }
        SkipOutcome::OwnerImmune { .. } => "wha?".to_string(),
    }
}

pub fn joined(channel_name: &str) -> String {
    format!("I have joined **{}**", channel_name)
}

pub const MUST_BE_IN_VOICE: &str = "You must be in a voice channel to summon me.";
pub const CHANNEL_NOT_FOUND: &str = "I couldn't find that channel in this Discord server.";
pub const JOIN_FAILED: &str = "I couldn't connect to that voice channel.";
pub const PLAY_USAGE: &str = "You need to request something as follows: \n/play <request>";
pub const PAUSED: &str = "⏸️ Paused.";
pub const RESUMED: &str = "▶️ Resumed.";
pub const STOPPED: &str = "👋 Stopped, cleared the queue and left the voice channel.";
