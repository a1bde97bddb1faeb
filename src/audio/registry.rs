use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    backend::{Messenger, VoiceConnection},
    player::PlaybackLoop,
    queue::{NowPlaying, PlaybackQueue},
    request::Request,
    skip::{SkipOutcome, SkipPolicy},
};
use crate::error::{PlaybackError, PlaybackResult};

/// Per-guild playback settings shared by every queue the registry creates.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub skip: SkipPolicy,
    pub default_volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            skip: SkipPolicy::default(),
            default_volume: 0.6,
        }
    }
}

/// A guild's queue together with the task consuming it.
pub struct GuildPlayer {
    queue: Arc<PlaybackQueue>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GuildPlayer {
    #[cfg(test)]
    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    /// Cancels the loop task and waits for it to go away.
    async fn cancel(&self) -> PlaybackResult<()> {
        let Some(task) = self.task.lock().take() else {
            return Ok(());
        };
        task.abort();
        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(PlaybackError::Cancelled),
            Err(e) => {
                warn!("Playback loop for guild {} panicked: {:?}", self.queue.guild_id(), e);
                Ok(())
            }
        }
    }
}

/// Concurrency-safe map from guild to its [`GuildPlayer`].
///
/// Entries are created lazily by [`enqueue`](Self::enqueue) and
/// [`attach_voice`](Self::attach_voice) and removed only by
/// [`stop`](Self::stop). Read operations never create an entry.
pub struct GuildRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    messenger: Arc<dyn Messenger>,
    settings: PlayerSettings,
}

impl GuildRegistry {
    pub fn new(messenger: Arc<dyn Messenger>, settings: PlayerSettings) -> Self {
        Self {
            players: DashMap::new(),
            messenger,
            settings,
        }
    }

    /// Returns the guild's player, creating it and starting its loop on first use.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                let queue = Arc::new(PlaybackQueue::new(
                    guild_id,
                    self.settings.skip,
                    self.settings.default_volume,
                ));
                let task = PlaybackLoop::new(queue.clone(), self.messenger.clone()).spawn();
                info!("🆕 Guild {}: player created", guild_id);
                Arc::new(GuildPlayer {
                    queue,
                    task: Mutex::new(Some(task)),
                })
            })
            .clone()
    }

    #[cfg(test)]
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    fn queue(&self, guild_id: GuildId) -> Option<Arc<PlaybackQueue>> {
        self.players.get(&guild_id).map(|p| p.queue.clone())
    }

    pub fn attach_voice(&self, guild_id: GuildId, voice: Arc<dyn VoiceConnection>) {
        self.get_or_create(guild_id).queue.attach_voice(voice);
    }

    pub fn voice(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        self.queue(guild_id)?.voice()
    }

    /// Moves an existing voice connection. Returns `false` when the guild
    /// has none, so the caller can connect instead.
    pub async fn move_voice(&self, guild_id: GuildId, channel: ChannelId) -> anyhow::Result<bool> {
        let Some(voice) = self.voice(guild_id) else {
            return Ok(false);
        };
        voice.move_to(channel).await?;
        Ok(true)
    }

    /// Queues a request. Callers deciding between "added to queue" and
    /// "now playing" must sample [`is_playing`](Self::is_playing) first.
    ///
    /// A player torn down by a concurrent [`stop`](Self::stop) refuses the
    /// request; it is then queued once more on a fresh player.
    pub fn enqueue(&self, guild_id: GuildId, request: Request) -> PlaybackResult<usize> {
        match self.get_or_create(guild_id).queue.enqueue(request.clone()) {
            Err(PlaybackError::Cancelled) => {
                debug!("Guild {}: player stopped during enqueue, retrying", guild_id);
                self.get_or_create(guild_id).queue.enqueue(request)
            }
            result => result,
        }
    }

    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.queue(guild_id).map_or(false, |q| q.is_playing())
    }

    pub fn skip(&self, guild_id: GuildId, voter: UserId) -> SkipOutcome {
        match self.queue(guild_id) {
            Some(queue) => queue.request_skip(voter),
            None => SkipOutcome::NothingPlaying,
        }
    }

    pub fn set_volume(&self, guild_id: GuildId, percentage: i64) -> PlaybackResult<f32> {
        if !(0..=100).contains(&percentage) {
            return Err(PlaybackError::InvalidVolume(percentage));
        }
        self.queue(guild_id)
            .ok_or(PlaybackError::NotPlaying)?
            .set_volume(percentage)
    }

    pub fn pause(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.queue(guild_id).ok_or(PlaybackError::NotPlaying)?.pause()
    }

    pub fn resume(&self, guild_id: GuildId) -> PlaybackResult<()> {
        self.queue(guild_id).ok_or(PlaybackError::NotPlaying)?.resume()
    }

    pub fn current_status(&self, guild_id: GuildId) -> Option<NowPlaying> {
        self.queue(guild_id)?.now_playing()
    }

    pub fn list_pending(&self, guild_id: GuildId) -> Vec<Request> {
        self.queue(guild_id)
            .map(|q| q.list_pending())
            .unwrap_or_default()
    }

    /// Explicit stop: removes the guild, drops its queue, stops the active
    /// stream, cancels the loop and disconnects voice. A no-op for unknown
    /// guilds. Teardown failures are logged, never returned.
    pub async fn stop(&self, guild_id: GuildId) {
        let Some((_, player)) = self.players.remove(&guild_id) else {
            debug!("Guild {}: stop requested with no player", guild_id);
            return;
        };

        let dropped = player.queue.shutdown();

        match player.cancel().await {
            Ok(()) | Err(PlaybackError::Cancelled) => {}
            Err(e) => warn!("Guild {}: loop teardown: {}", guild_id, e),
        }

        if let Some(voice) = player.queue.detach_voice() {
            if let Err(e) = voice.disconnect().await {
                debug!("Guild {}: voice already gone: {:?}", guild_id, e);
            }
        }

        info!("🛑 Guild {}: stopped, {} pending requests dropped", guild_id, dropped);
    }

    /// Stops every guild. Used on process shutdown.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.players.iter().map(|entry| *entry.key()).collect();
        for guild_id in guilds {
            self.stop(guild_id).await;
        }
    }

    pub fn guild_count(&self) -> usize {
        self.players.len()
    }
}
