use anyhow::Result;
use serenity::{
    model::{gateway::GatewayIntents, id::ApplicationId},
    Client,
};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod ui;

use crate::audio::GuildRegistry;
use crate::bot::{messenger::SerenityMessenger, JukeboxBot};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Open Jukebox v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // The registry needs the client's HTTP handle and the handler needs the
    // registry, so the HTTP handle is built up front and shared.
    let http = Arc::new(serenity::http::Http::new(&config.discord_token));
    let messenger = Arc::new(SerenityMessenger::new(http));
    let registry = Arc::new(GuildRegistry::new(messenger, config.player_settings()));

    let handler = JukeboxBot::new(config.clone(), registry.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .application_id(ApplicationId::new(config.application_id))
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for ctrl-c: {:?}", e);
            return;
        }
        info!(
            "⚠️ Shutdown signal received, stopping {} guilds...",
            registry.guild_count()
        );
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Missing dependencies: yt-dlp and ffmpeg must be on PATH");
    }
}
