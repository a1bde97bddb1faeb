//! Scripted stand-ins for the voice and messaging collaborators.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    backend::{
        Completion, Messenger, PlaybackHandle, StreamOptions, TrackMetadata, VoiceConnection,
    },
    request::Request,
};

pub fn request(user: u64, locator: &str) -> Request {
    Request::new(
        UserId::new(user),
        ChannelId::new(500),
        locator,
        StreamOptions::default(),
    )
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn metadata_for(locator: &str) -> TrackMetadata {
    TrackMetadata::new(format!("Title of {}", locator))
        .with_uploader("Uploader")
        .with_duration(Duration::from_secs(185))
}

/// Stream whose completion fires from a separate OS thread, like a driver would.
pub struct FakeHandle {
    pub locator: String,
    metadata: TrackMetadata,
    completion: Completion,
    volume: Mutex<f32>,
    started: AtomicBool,
    paused: AtomicBool,
    done: AtomicBool,
    stopped: AtomicBool,
    refuse_start: bool,
}

impl FakeHandle {
    fn new(locator: &str, completion: Completion, refuse_start: bool) -> Self {
        Self {
            locator: locator.to_string(),
            metadata: metadata_for(locator),
            completion,
            volume: Mutex::new(1.0),
            started: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            done: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            refuse_start,
        }
    }

    /// Natural end of stream.
    pub fn finish(&self) {
        self.end();
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn end(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let completion = self.completion.clone();
        std::thread::spawn(move || completion.fire());
    }
}

#[async_trait]
impl PlaybackHandle for FakeHandle {
    async fn start(&self) -> Result<()> {
        if self.refuse_start {
            anyhow::bail!("ffmpeg exited before the first packet");
        }
        if !self.done.load(Ordering::SeqCst) {
            self.started.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.end();
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
    }

    fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }
}

#[derive(Default)]
pub struct FakeVoice {
    failing: Mutex<HashSet<String>>,
    unstartable: Mutex<HashSet<String>>,
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    moved_to: Mutex<Vec<ChannelId>>,
    disconnected: AtomicBool,
}

impl FakeVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every resolution of `locator` fail.
    pub fn fail_on(&self, locator: &str) {
        self.failing.lock().insert(locator.to_string());
    }

    /// Streams for `locator` are created but refuse to start.
    pub fn fail_start_on(&self, locator: &str) {
        self.unstartable.lock().insert(locator.to_string());
    }

    pub fn stream_for(
        &self,
        locator: &str,
        completion: Completion,
    ) -> Result<Arc<dyn PlaybackHandle>> {
        if self.failing.lock().contains(locator) {
            anyhow::bail!("Unsupported URL: {}", locator);
        }
        let refuse_start = self.unstartable.lock().contains(locator);
        let handle = Arc::new(FakeHandle::new(locator, completion, refuse_start));
        self.handles.lock().push(handle.clone());
        Ok(handle)
    }

    /// Most recent stream created for `locator`.
    pub fn last_handle(&self, locator: &str) -> Option<Arc<FakeHandle>> {
        self.handles
            .lock()
            .iter()
            .rev()
            .find(|h| h.locator == locator)
            .cloned()
    }

    /// Locators in the order their streams were created.
    pub fn created(&self) -> Vec<String> {
        self.handles.lock().iter().map(|h| h.locator.clone()).collect()
    }

    /// Streams that were started and have not ended.
    pub fn live(&self) -> Vec<String> {
        self.handles
            .lock()
            .iter()
            .filter(|h| h.was_started() && !h.is_done())
            .map(|h| h.locator.clone())
            .collect()
    }

    pub fn moved_to(&self) -> Vec<ChannelId> {
        self.moved_to.lock().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    async fn resolve(&self, locator: &str, _options: &StreamOptions) -> Result<TrackMetadata> {
        if self.failing.lock().contains(locator) {
            anyhow::bail!("Unsupported URL: {}", locator);
        }
        Ok(metadata_for(locator))
    }

    async fn create_stream(
        &self,
        locator: &str,
        _options: &StreamOptions,
        on_complete: Completion,
    ) -> Result<Arc<dyn PlaybackHandle>> {
        tokio::task::yield_now().await;
        self.stream_for(locator, on_complete)
    }

    async fn move_to(&self, channel: ChannelId) -> Result<()> {
        self.moved_to.lock().push(channel);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every message; can be told to fail deliveries.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ChannelId, String)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let messenger = Self::default();
        messenger.failing.store(true, Ordering::SeqCst);
        messenger
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        self.sent.lock().push((channel, text.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Missing Access");
        }
        Ok(())
    }
}
