use parking_lot::{Mutex, RwLock};
use serenity::model::id::{GuildId, UserId};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Notify;
use tracing::{debug, info};

use super::{
    backend::{Completion, CompletionWait, PlaybackHandle, VoiceConnection},
    request::Request,
    skip::{SkipOutcome, SkipPolicy, SkipVoteTracker, Vote},
};
use crate::error::{PlaybackError, PlaybackResult};

/// Where a guild's playback loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Nothing active, waiting for work.
    Idle,
    /// A request was dequeued and its stream is being created.
    Starting,
    /// The stream is installed and the loop awaits its completion.
    Playing,
    /// Torn down by an explicit stop.
    Stopped,
}

/// A request handed to the loop, with the signal that ends it.
pub struct Activation {
    pub request: Request,
    pub completion: Completion,
    pub wait: CompletionWait,
}

/// Point-in-time view of the active request.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub request: Request,
    pub votes: usize,
    pub threshold: usize,
    pub owner_immune: bool,
    pub paused: bool,
}

enum Verdict {
    Skip,
    Hold(SkipOutcome),
}

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Request>,
    current: Option<Request>,
    completion: Option<Completion>,
    votes: SkipVoteTracker,
    phase: LoopPhase,
    volume: f32,
    skip_requested: bool,
}

impl QueueState {
    /// The active stream, if it is actually streaming.
    fn streaming(&self) -> Option<Arc<dyn PlaybackHandle>> {
        if self.phase != LoopPhase::Playing {
            return None;
        }
        self.current
            .as_ref()
            .and_then(|r| r.handle())
            .filter(|h| !h.is_done())
            .cloned()
    }
}

/// Per-guild FIFO of pending requests plus the active one.
///
/// All state sits behind one lock that is never held across an await.
/// Producers call [`enqueue`](Self::enqueue) from any task; exactly one
/// [`PlaybackLoop`](super::player::PlaybackLoop) consumes through
/// [`next`](Self::next).
pub struct PlaybackQueue {
    guild_id: GuildId,
    policy: SkipPolicy,
    state: Mutex<QueueState>,
    work: Notify,
    voice: RwLock<Option<Arc<dyn VoiceConnection>>>,
}

impl PlaybackQueue {
    pub fn new(guild_id: GuildId, policy: SkipPolicy, default_volume: f32) -> Self {
        Self {
            guild_id,
            policy,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                current: None,
                completion: None,
                votes: SkipVoteTracker::new(policy.votes_to_skip),
                phase: LoopPhase::Idle,
                volume: default_volume,
                skip_requested: false,
            }),
            work: Notify::new(),
            voice: RwLock::new(None),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn attach_voice(&self, voice: Arc<dyn VoiceConnection>) {
        *self.voice.write() = Some(voice);
    }

    pub fn voice(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.voice.read().clone()
    }

    pub fn detach_voice(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.voice.write().take()
    }

    /// Appends to the pending sequence and wakes the loop. Returns the
    /// 1-based position in the pending sequence, or `Cancelled` once the
    /// queue has been shut down.
    pub fn enqueue(&self, request: Request) -> PlaybackResult<usize> {
        let position = {
            let mut state = self.state.lock();
            if state.phase == LoopPhase::Stopped {
                return Err(PlaybackError::Cancelled);
            }
            debug!("➕ Guild {}: queued {}", self.guild_id, request.title());
            state.pending.push_back(request);
            state.pending.len()
        };
        self.work.notify_one();
        Ok(position)
    }

    /// Copy of the pending sequence, in play order.
    pub fn list_pending(&self) -> Vec<Request> {
        self.state.lock().pending.iter().cloned().collect()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().streaming().is_some()
    }

    pub fn phase(&self) -> LoopPhase {
        self.state.lock().phase
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        let state = self.state.lock();
        let request = state.current.clone()?;
        Some(NowPlaying {
            owner_immune: self.policy.is_owner(request.requester),
            paused: request.handle().map_or(false, |h| h.is_paused()),
            votes: state.votes.count(),
            threshold: state.votes.threshold(),
            request,
        })
    }

    /// Waits until a request is pending, then makes it the active one.
    /// Returns `None` once the queue has been shut down.
    pub async fn next(&self) -> Option<Activation> {
        loop {
            let notified = self.work.notified();
            if self.phase() == LoopPhase::Stopped {
                return None;
            }
            if let Some(activation) = self.try_activate() {
                return Some(activation);
            }
            debug!("💤 Guild {}: idle, waiting for requests", self.guild_id);
            notified.await;
        }
    }

    fn try_activate(&self) -> Option<Activation> {
        let mut state = self.state.lock();
        if state.phase == LoopPhase::Stopped {
            return None;
        }
        let request = state.pending.pop_front()?;
        let (completion, wait) = Completion::new();

        state.current = Some(request.clone());
        state.completion = Some(completion.clone());
        state.votes.clear();
        state.skip_requested = false;
        state.phase = LoopPhase::Starting;

        Some(Activation {
            request,
            completion,
            wait,
        })
    }

    /// Installs the freshly created stream on the active request.
    ///
    /// Returns the volume to start at, or `None` when the request must not
    /// start (a skip arrived while it was starting, or the guild stopped).
    pub fn install(&self, handle: Arc<dyn PlaybackHandle>) -> Option<f32> {
        let mut state = self.state.lock();
        if state.phase != LoopPhase::Starting {
            return None;
        }
        let current = state.current.as_mut()?;
        current.replace_handle(handle);

        if state.skip_requested {
            return None;
        }
        state.phase = LoopPhase::Playing;
        Some(state.volume)
    }

    /// Drops the active request once its completion has fired.
    pub fn retire(&self) -> Option<Request> {
        let mut state = self.state.lock();
        state.completion = None;
        state.votes.clear();
        state.skip_requested = false;
        if state.phase != LoopPhase::Stopped {
            state.phase = LoopPhase::Idle;
        }
        state.current.take()
    }

    pub fn request_skip(&self, voter: UserId) -> SkipOutcome {
        let mut state = self.state.lock();
        let starting = state.phase == LoopPhase::Starting;
        let handle = state.streaming();

        if handle.is_none() && !starting {
            // A stream that already ended and is waiting for cleanup.
            let lingering = state.completion.as_ref().map_or(false, Completion::is_pending);
            if !lingering {
                return SkipOutcome::NothingPlaying;
            }
            state.skip_requested = true;
            state.votes.clear();
            let handle = state.current.as_ref().and_then(|r| r.handle()).cloned();
            drop(state);
            if let Some(handle) = handle {
                handle.stop();
            }
            info!("🧹 Guild {}: stopping lingering stream", self.guild_id);
            return SkipOutcome::Cleanup;
        }

        let requester = match state.current.as_ref() {
            Some(request) => request.requester,
            None => return SkipOutcome::NothingPlaying,
        };
        if starting && state.skip_requested {
            return SkipOutcome::Skipped;
        }

        match self.judge(&mut state, requester, voter) {
            Verdict::Hold(outcome) => outcome,
            Verdict::Skip => {
                state.votes.clear();
                match handle {
                    Some(handle) => {
                        drop(state);
                        self.force_skip(handle);
                    }
                    None => {
                        // Applied by `install` once the stream exists.
                        state.skip_requested = true;
                        info!("⏭️ Guild {}: skipping before start", self.guild_id);
                    }
                }
                SkipOutcome::Skipped
            }
        }
    }

    /// Requester and owner skip outright, everyone else votes. Requests
    /// queued by the owner never reach the threshold.
    fn judge(&self, state: &mut QueueState, requester: UserId, voter: UserId) -> Verdict {
        if voter == requester || self.policy.is_owner(voter) {
            return Verdict::Skip;
        }

        let vote = state.votes.record(voter);
        if self.policy.is_owner(requester) {
            return Verdict::Hold(match vote {
                Vote::Counted(votes) => SkipOutcome::OwnerImmune { votes },
                Vote::Duplicate => SkipOutcome::AlreadyVoted,
            });
        }

        match vote {
            Vote::Duplicate => Verdict::Hold(SkipOutcome::AlreadyVoted),
            Vote::Counted(_) if state.votes.reached() => Verdict::Skip,
            Vote::Counted(votes) => Verdict::Hold(SkipOutcome::VoteRecorded {
                votes,
                needed: state.votes.threshold(),
            }),
        }
    }

    fn force_skip(&self, handle: Arc<dyn PlaybackHandle>) {
        if handle.is_paused() {
            handle.resume();
        }
        handle.stop();
        info!("⏭️ Guild {}: skipping {}", self.guild_id, handle.metadata().title);
    }

    /// Sets the volume of the active stream from a 0-100 percentage.
    ///
    /// Out-of-range values are rejected, never clamped. The new level carries
    /// over to the requests that follow.
    pub fn set_volume(&self, percentage: i64) -> PlaybackResult<f32> {
        if !(0..=100).contains(&percentage) {
            return Err(PlaybackError::InvalidVolume(percentage));
        }
        let mut state = self.state.lock();
        let handle = state.streaming().ok_or(PlaybackError::NotPlaying)?;
        let volume = percentage as f32 / 100.0;
        state.volume = volume;
        handle.set_volume(volume);
        info!("🔊 Guild {}: volume set to {}%", self.guild_id, percentage);
        Ok(volume)
    }

    pub fn pause(&self) -> PlaybackResult<()> {
        let handle = self.state.lock().streaming().ok_or(PlaybackError::NotPlaying)?;
        if handle.is_paused() {
            return Err(PlaybackError::NotPlaying);
        }
        handle.pause();
        info!("⏸️ Guild {}: paused", self.guild_id);
        Ok(())
    }

    pub fn resume(&self) -> PlaybackResult<()> {
        let handle = self.state.lock().streaming().ok_or(PlaybackError::NotPlaying)?;
        if !handle.is_paused() {
            return Err(PlaybackError::NothingToResume);
        }
        handle.resume();
        info!("▶️ Guild {}: resumed", self.guild_id);
        Ok(())
    }

    /// Tears the queue down: drops every pending request, stops the active
    /// stream and marks the queue stopped. Returns how many pending requests
    /// were dropped.
    pub fn shutdown(&self) -> usize {
        let (dropped, handle) = {
            let mut state = self.state.lock();
            state.phase = LoopPhase::Stopped;
            state.votes.clear();
            state.completion = None;
            let dropped = state.pending.len();
            state.pending.clear();
            let handle = state.current.take().and_then(|r| r.handle().cloned());
            (dropped, handle)
        };

        // The stream may already be gone; stopping it again is harmless.
        if let Some(handle) = handle {
            if !handle.is_done() {
                handle.stop();
            }
        }
        self.work.notify_one();
        dropped
    }
}
