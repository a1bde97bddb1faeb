use anyhow::Result;
use async_trait::async_trait;
use serenity::{http::Http, model::id::ChannelId};
use std::sync::Arc;

use crate::audio::Messenger;

/// Delivers announcements as plain channel messages.
pub struct SerenityMessenger {
    http: Arc<Http>,
}

impl SerenityMessenger {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Messenger for SerenityMessenger {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<()> {
        channel.say(self.http.as_ref(), text).await?;
        Ok(())
    }
}
