//! # Bot Module
//!
//! Discord side of Open Jukebox.
//!
//! - Slash command registration and dispatch
//! - Voice connections per guild (join, move, leave)
//! - Reacting to the bot being dropped from voice
//!
//! Playback itself lives in [`crate::audio`]; this module only translates
//! interactions into [`GuildRegistry`] operations and back into replies.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod messenger;
pub mod voice;

use crate::{
    audio::{GuildRegistry, StreamOptions},
    config::Config,
};
use voice::SongbirdVoice;

/// serenity event handler for Open Jukebox.
///
/// Holds the configuration and the [`GuildRegistry`] shared with `main`, plus
/// the HTTP client handed to every yt-dlp source.
pub struct JukeboxBot {
    config: Arc<Config>,
    registry: Arc<GuildRegistry>,
    http_client: reqwest::Client,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, registry: Arc<GuildRegistry>) -> Self {
        Self {
            config,
            registry,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn registry(&self) -> &Arc<GuildRegistry> {
        &self.registry
    }

    pub fn stream_options(&self) -> StreamOptions {
        self.config.stream_options()
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set the commands go to that guild only (instant
    /// propagation, for development); otherwise they are registered globally.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of guild {}, skipping registration", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Guild command registration failed: {:?}", e);
                        anyhow::anyhow!(
                            "Could not register guild commands. Check the bot has the 'applications.commands' scope."
                        )
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Global command registration failed: {:?}", e);
                    anyhow::anyhow!(
                        "Could not register global commands. Check the bot has the 'applications.commands' scope."
                    )
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Joins `channel_id`, or moves there if the guild already has a connection.
    pub async fn connect(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        if self.registry.move_voice(guild_id, channel_id).await? {
            return Ok(());
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialised"))?;

        let voice =
            SongbirdVoice::connect(manager, guild_id, channel_id, self.http_client.clone()).await?;
        self.registry.attach_voice(guild_id, Arc::new(voice));

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Stops the guild when the bot is dropped from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Disconnected from voice in guild {}", guild_id);
            self.registry.stop(guild_id).await;
        }
    }
}
