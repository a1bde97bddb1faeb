//! # Audio Module
//!
//! Per-guild playback core of Open Jukebox.
//!
//! Every guild gets its own [`queue::PlaybackQueue`] and a single
//! [`player::PlaybackLoop`] task consuming it. Guilds never share state,
//! so one guild waiting on a slow stream does not affect any other.
//!
//! ## Architecture
//!
//! ### [`registry`] - Guild Registry
//! - Lazily creates one queue + loop per guild, atomically
//! - Exposes the operations the command layer uses (enqueue, skip, volume, ...)
//! - Tears a guild down on explicit stop
//!
//! ### [`queue`] - Playback Queue
//! - Locked FIFO with a genuine, non-consuming snapshot
//! - Owns the active request, its stream slot and the skip votes
//!
//! ### [`player`] - Playback Loop
//! - Idle → Starting → Playing → Idle, until the queue is stopped
//! - Waits on a one-shot completion that may fire from any thread
//!
//! ### [`skip`] - Skip Votes
//! - Requester / owner skip immediately, everyone else votes (3 by default)
//! - Requests queued by the owner can't be voted off
//!
//! ### [`backend`] - Collaborators
//! - Traits for the voice connection, its streams and message delivery
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use crate::audio::{GuildRegistry, Request, StreamOptions};
//! use serenity::all::{ChannelId, GuildId, UserId};
//!
//! # fn example(registry: &GuildRegistry) {
//! let guild_id = GuildId::new(123456789);
//! let request = Request::new(
//!     UserId::new(1),
//!     ChannelId::new(2),
//!     "https://youtu.be/dQw4w9WgXcQ",
//!     StreamOptions::default(),
//! );
//!
//! let was_playing = registry.is_playing(guild_id);
//! let position = registry.enqueue(guild_id, request)?;
//! # }
//! ```

pub mod backend;
pub mod player;
pub mod queue;
pub mod registry;
pub mod request;
pub mod skip;

#[cfg(test)]
pub mod testing;

pub use backend::{
    Completion, Messenger, PlaybackHandle, SearchMode, StreamOptions, TrackMetadata,
    VoiceConnection,
};
pub use queue::NowPlaying;
pub use registry::{GuildRegistry, PlayerSettings};
pub use request::Request;
pub use skip::{SkipOutcome, SkipPolicy};
