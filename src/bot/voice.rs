//! songbird-backed implementations of the playback collaborators.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{AuxMetadata, Compose, Input, YoutubeDl},
    tracks::{Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

use crate::audio::{Completion, PlaybackHandle, StreamOptions, TrackMetadata, VoiceConnection};

/// A guild's songbird call, streaming through yt-dlp.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
}

impl SongbirdVoice {
    /// Joins `channel` and wraps the resulting call.
    pub async fn connect(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel: ChannelId,
        http: reqwest::Client,
    ) -> Result<Self> {
        let call = manager
            .join(guild_id, channel)
            .await
            .with_context(|| format!("could not join voice channel {}", channel))?;

        info!("🔊 Guild {}: connected to voice channel {}", guild_id, channel);

        Ok(Self {
            manager,
            guild_id,
            call,
            http,
        })
    }

    fn source(&self, locator: &str, options: &StreamOptions) -> Result<YoutubeDl<'static>> {
        let locator = locator.trim();
        if locator.is_empty() {
            anyhow::bail!("empty request");
        }

        let source = if options.search_mode.is_search(locator) {
            YoutubeDl::new_search(self.http.clone(), locator.to_string())
        } else {
            if url::Url::parse(locator).is_err() {
                anyhow::bail!("Unsupported URL: {}", locator);
            }
            YoutubeDl::new(self.http.clone(), locator.to_string())
        };

        Ok(source.user_args(ytdl_args(options.quiet)))
    }
}

#[async_trait]
impl VoiceConnection for SongbirdVoice {
    async fn resolve(&self, locator: &str, options: &StreamOptions) -> Result<TrackMetadata> {
        let mut source = self.source(locator, options)?;
        let aux = source
            .aux_metadata()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let metadata = metadata_from_aux(aux, locator);

        if options.quiet {
            debug!("🔍 Guild {}: resolved {} -> {}", self.guild_id, locator, metadata.title);
        } else {
            info!("🔍 Guild {}: resolved {} -> {}", self.guild_id, locator, metadata.title);
        }
        Ok(metadata)
    }

    async fn create_stream(
        &self,
        locator: &str,
        options: &StreamOptions,
        on_complete: Completion,
    ) -> Result<Arc<dyn PlaybackHandle>> {
        let mut source = self.source(locator, options)?;
        let aux = source
            .aux_metadata()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(Arc::new(SongbirdTrack {
            guild_id: self.guild_id,
            call: self.call.clone(),
            input: Mutex::new(Some(Input::from(source))),
            handle: Mutex::new(None),
            metadata: metadata_from_aux(aux, locator),
            state: Arc::new(TrackState::default()),
            volume: Mutex::new(1.0),
            completion: on_complete,
        }))
    }

    async fn move_to(&self, channel: ChannelId) -> Result<()> {
        self.manager
            .join(self.guild_id, channel)
            .await
            .with_context(|| format!("could not move to voice channel {}", channel))?;
        info!("🔀 Guild {}: moved to voice channel {}", self.guild_id, channel);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.manager.remove(self.guild_id).await?;
        info!("👋 Guild {}: left voice", self.guild_id);
        Ok(())
    }
}

fn ytdl_args(quiet: bool) -> Vec<String> {
    if quiet {
        vec!["--quiet".to_string(), "--no-warnings".to_string()]
    } else {
        Vec::new()
    }
}

fn metadata_from_aux(aux: AuxMetadata, locator: &str) -> TrackMetadata {
    let mut metadata = TrackMetadata::new(aux.title.unwrap_or_else(|| locator.to_string()));
    if let Some(uploader) = aux.artist.or(aux.channel) {
        metadata = metadata.with_uploader(uploader);
    }
    if let Some(duration) = aux.duration {
        metadata = metadata.with_duration(duration);
    }
    metadata
}

#[derive(Default)]
struct TrackState {
    paused: AtomicBool,
    stopped: AtomicBool,
    done: AtomicBool,
}

/// One request's stream. Nothing reaches the call until `start`.
pub struct SongbirdTrack {
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    input: Mutex<Option<Input>>,
    handle: Mutex<Option<TrackHandle>>,
    metadata: TrackMetadata,
    state: Arc<TrackState>,
    volume: Mutex<f32>,
    completion: Completion,
}

impl SongbirdTrack {
    fn finish(&self) {
        self.state.done.store(true, Ordering::SeqCst);
        self.completion.fire();
    }
}

#[async_trait]
impl PlaybackHandle for SongbirdTrack {
    async fn start(&self) -> Result<()> {
        let Some(input) = self.input.lock().take() else {
            return Ok(());
        };
        if self.state.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let volume = *self.volume.lock();
        let handle = self
            .call
            .lock()
            .await
            .play(Track::from(input).volume(volume));

        for event in [TrackEvent::End, TrackEvent::Error] {
            let ended = StreamEndHandler {
                guild_id: self.guild_id,
                state: self.state.clone(),
                completion: self.completion.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), ended) {
                // The track is already gone; nothing will fire for it.
                debug!("Guild {}: track ended before events attached: {:?}", self.guild_id, e);
                self.finish();
            }
        }

        if self.state.paused.load(Ordering::SeqCst) {
            let _ = handle.pause();
        }
        *self.handle.lock() = Some(handle.clone());

        // stop() may have raced the call lock.
        if self.state.stopped.load(Ordering::SeqCst) {
            let _ = handle.stop();
        }
        Ok(())
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.input.lock().take();
        if let Some(handle) = self.handle.lock().as_ref() {
            if let Err(e) = handle.stop() {
                debug!("Guild {}: stop on finished track: {:?}", self.guild_id, e);
            }
        }
        self.finish();
    }

    fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().as_ref() {
            if let Err(e) = handle.pause() {
                warn!("⏸️ Guild {}: pause failed: {:?}", self.guild_id, e);
            }
        }
    }

    fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().as_ref() {
            if let Err(e) = handle.play() {
                warn!("▶️ Guild {}: resume failed: {:?}", self.guild_id, e);
            }
        }
    }

    fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    fn is_done(&self) -> bool {
        self.state.done.load(Ordering::SeqCst)
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
        if let Some(handle) = self.handle.lock().as_ref() {
            if let Err(e) = handle.set_volume(volume) {
                debug!("Guild {}: volume on finished track: {:?}", self.guild_id, e);
            }
        }
    }

    fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }
}

/// Fires a track's completion when songbird reports it ended or errored.
struct StreamEndHandler {
    guild_id: GuildId,
    state: Arc<TrackState>,
    completion: Completion,
}

#[async_trait]
impl VoiceEventHandler for StreamEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                debug!("🎵 Guild {}: track ended in state {:?}", self.guild_id, state.playing);
            }
        }
        self.state.done.store(true, Ordering::SeqCst);
        self.completion.fire();
        None
    }
}
