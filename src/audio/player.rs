use chrono::Utc;
use serenity::model::id::ChannelId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        backend::{Completion, Messenger},
        queue::{Activation, PlaybackQueue},
        request::Request,
    },
    error::{PlaybackError, PlaybackResult},
    ui::messages,
};

/// The single consumer of a guild's [`PlaybackQueue`].
///
/// Dequeues in order, creates the stream, announces it, starts it and then
/// waits for its completion signal before moving on. Errors are reported to
/// the request's channel and never end the loop; only a queue shutdown (or
/// aborting the task) does.
pub struct PlaybackLoop {
    queue: Arc<PlaybackQueue>,
    messenger: Arc<dyn Messenger>,
}

impl PlaybackLoop {
    pub fn new(queue: Arc<PlaybackQueue>, messenger: Arc<dyn Messenger>) -> Self {
        Self { queue, messenger }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let guild_id = self.queue.guild_id();
        info!("🎶 Guild {}: playback loop started", guild_id);

        while let Some(activation) = self.queue.next().await {
            self.play(activation).await;
        }

        info!("⏹️ Guild {}: playback loop finished", guild_id);
    }

    async fn play(&self, activation: Activation) {
        let Activation {
            request,
            completion,
            wait,
        } = activation;
        let guild_id = self.queue.guild_id();

        let waited = Utc::now().signed_duration_since(request.requested_at);
        debug!(
            "▶️ Guild {}: activating {} after {}s in queue",
            guild_id,
            request.title(),
            waited.num_seconds()
        );

        match self.start(&request, completion.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("⏭️ Guild {}: skipped before it started", guild_id);
                completion.fire();
            }
            Err(e) => {
                warn!("❌ Guild {}: could not play {}: {}", guild_id, request.locator, e);
                self.announce(request.channel, messages::playback_error(&e));
                completion.fire();
            }
        }

        // A dropped completion also means the stream is gone.
        if wait.await.is_err() {
            debug!("Guild {}: completion dropped without firing", guild_id);
        }

        if let Some(finished) = self.queue.retire() {
            debug!("✅ Guild {}: finished {}", guild_id, finished.title());
        }
    }

    /// Returns `Ok(false)` when the request was skipped while starting.
    async fn start(&self, request: &Request, completion: Completion) -> PlaybackResult<bool> {
        let voice = self.queue.voice().ok_or(PlaybackError::NotConnected)?;

        let handle = voice
            .create_stream(&request.locator, &request.options, completion)
            .await
            .map_err(|e| PlaybackError::admission(&request.locator, e))?;

        let Some(volume) = self.queue.install(handle.clone()) else {
            return Ok(false);
        };

        handle.set_volume(volume);
        handle
            .start()
            .await
            .map_err(|e| PlaybackError::admission(&request.locator, e))?;

        let mut playing = request.clone();
        playing.replace_handle(handle.clone());
        self.announce(request.channel, messages::now_playing(&playing));

        info!(
            "🎵 Guild {}: now playing {} at {}%",
            self.queue.guild_id(),
            playing.title(),
            (volume * 100.0).round() as u32
        );
        Ok(true)
    }

    /// Fire-and-forget delivery; a slow or failing channel never holds up playback.
    fn announce(&self, channel: ChannelId, text: String) {
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger.send(channel, &text).await {
                warn!("📭 Could not announce in channel {}: {:?}", channel, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        backend::{MockMessenger, PlaybackHandle},
        queue::LoopPhase,
        skip::SkipPolicy,
        testing::{eventually, request, FakeVoice, RecordingMessenger},
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::{GuildId, UserId};

    struct Harness {
        queue: Arc<PlaybackQueue>,
        voice: Arc<FakeVoice>,
        messenger: Arc<RecordingMessenger>,
        task: JoinHandle<()>,
    }

    fn harness_with(messenger: RecordingMessenger) -> Harness {
        let queue = Arc::new(PlaybackQueue::new(
            GuildId::new(1),
            SkipPolicy::default(),
            0.6,
        ));
        let voice = Arc::new(FakeVoice::new());
        queue.attach_voice(voice.clone());
        let messenger = Arc::new(messenger);
        let task = PlaybackLoop::new(queue.clone(), messenger.clone()).spawn();
        Harness {
            queue,
            voice,
            messenger,
            task,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingMessenger::new())
    }

    fn active(queue: &PlaybackQueue) -> Option<String> {
        queue.now_playing().map(|n| n.request.locator)
    }

    #[tokio::test]
    async fn requests_play_in_fifo_order() {
        let h = harness();
        for locator in ["a", "b", "c"] {
            h.queue.enqueue(request(1, locator)).unwrap();
        }

        eventually("a playing", || h.queue.is_playing()).await;
        assert_eq!(active(&h.queue).as_deref(), Some("a"));
        let pending: Vec<String> = h.queue.list_pending().into_iter().map(|r| r.locator).collect();
        assert_eq!(pending, vec!["b", "c"]);

        for locator in ["a", "b", "c"] {
            eventually("stream started", || {
                h.voice.last_handle(locator).map_or(false, |s| s.was_started())
            })
            .await;
            assert_eq!(h.voice.live(), vec![locator.to_string()]);
            h.voice.last_handle(locator).unwrap().finish();
        }

        eventually("idle", || h.queue.phase() == LoopPhase::Idle && active(&h.queue).is_none()).await;
        assert_eq!(h.voice.created(), vec!["a", "b", "c"]);
        h.task.abort();
    }

    #[tokio::test]
    async fn now_playing_is_announced_in_the_request_channel() {
        let h = harness();
        h.queue.enqueue(request(3, "song")).unwrap();

        eventually("announcement", || !h.messenger.sent().is_empty()).await;
        let (channel, text) = h.messenger.sent()[0].clone();
        assert_eq!(channel, ChannelId::new(500));
        assert!(text.starts_with("I'm currently playing:\n**Title of song**"));
        assert!(text.contains("Queued by <@3>"));
        h.task.abort();
    }

    #[tokio::test]
    async fn unresolvable_request_is_reported_and_dropped() {
        let h = harness();
        h.voice.fail_on("bad");
        h.queue.enqueue(request(1, "bad")).unwrap();
        h.queue.enqueue(request(1, "good")).unwrap();

        eventually("good playing", || active(&h.queue).as_deref() == Some("good")).await;
        eventually("error reported", || {
            h.messenger
                .texts()
                .iter()
                .any(|t| t.starts_with("I could not process this request."))
        })
        .await;
        assert!(h.queue.list_pending().is_empty());
        assert_eq!(h.voice.created(), vec!["good"]);
        h.task.abort();
    }

    #[tokio::test]
    async fn stream_that_fails_to_start_is_never_announced_as_playing() {
        let h = harness();
        h.voice.fail_start_on("broken");
        h.queue.enqueue(request(1, "broken")).unwrap();
        h.queue.enqueue(request(1, "fine")).unwrap();

        eventually("fine playing", || active(&h.queue).as_deref() == Some("fine")).await;
        eventually("fine announced", || {
            h.messenger.texts().iter().any(|t| t.contains("Title of fine"))
        })
        .await;

        let texts = h.messenger.texts();
        assert!(texts
            .iter()
            .any(|t| t.starts_with("I could not process this request.") && t.contains("ffmpeg")));
        assert!(!texts.iter().any(|t| t.contains("Title of broken")));
        h.task.abort();
    }

    #[tokio::test]
    async fn failing_announcements_do_not_stall_playback() {
        let h = harness_with(RecordingMessenger::failing());
        h.queue.enqueue(request(1, "a")).unwrap();
        h.queue.enqueue(request(1, "b")).unwrap();

        eventually("a playing", || h.queue.is_playing()).await;
        h.voice.last_handle("a").unwrap().finish();
        eventually("b playing", || active(&h.queue).as_deref() == Some("b")).await;
        h.task.abort();
    }

    #[tokio::test]
    async fn volume_carries_over_to_the_next_request() {
        let h = harness();
        h.queue.enqueue(request(1, "a")).unwrap();
        eventually("a playing", || h.queue.is_playing()).await;
        assert_eq!(h.voice.last_handle("a").unwrap().volume(), 0.6);

        h.queue.set_volume(30).unwrap();
        h.queue.enqueue(request(1, "b")).unwrap();
        h.voice.last_handle("a").unwrap().finish();

        eventually("b started", || {
            h.voice.last_handle("b").map_or(false, |s| s.was_started())
        })
        .await;
        assert_eq!(h.voice.last_handle("b").unwrap().volume(), 0.3);
        h.task.abort();
    }

    #[tokio::test]
    async fn vote_skip_advances_to_the_next_request() {
        let h = harness();
        h.queue.enqueue(request(9, "a")).unwrap();
        h.queue.enqueue(request(9, "b")).unwrap();
        eventually("a playing", || h.queue.is_playing()).await;

        for voter in 1..=3 {
            h.queue.request_skip(UserId::new(voter));
        }

        eventually("b playing", || {
            active(&h.queue).as_deref() == Some("b") && h.queue.is_playing()
        })
        .await;
        assert!(h.voice.last_handle("a").unwrap().was_stopped());
        assert_eq!(h.queue.now_playing().unwrap().votes, 0);
        h.task.abort();
    }

    #[tokio::test]
    async fn missing_voice_connection_is_reported() {
        let queue = Arc::new(PlaybackQueue::new(GuildId::new(2), SkipPolicy::default(), 0.6));
        let mut messenger = MockMessenger::new();
        messenger
            .expect_send()
            .withf(|channel, text| {
                *channel == ChannelId::new(500) && text.contains("voice channel")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let task = PlaybackLoop::new(queue.clone(), Arc::new(messenger)).spawn();

        queue.enqueue(request(1, "nowhere")).unwrap();
        eventually("request discarded", || {
            queue.phase() == LoopPhase::Idle && queue.list_pending().is_empty()
        })
        .await;
        // Let the spawned announcement reach the mock before it is checked on drop.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        task.abort();
    }

    #[tokio::test]
    async fn loop_ends_when_the_queue_shuts_down() {
        let h = harness();
        h.queue.enqueue(request(1, "a")).unwrap();
        eventually("a playing", || h.queue.is_playing()).await;

        h.queue.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), h.task)
            .await
            .expect("loop did not finish")
            .unwrap();
        assert!(h.voice.last_handle("a").unwrap().was_stopped());
    }
}
