use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        channel::ChannelType,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use crate::{
    audio::Request,
    bot::JukeboxBot,
    error::PlaybackError,
    ui::{embeds, messages},
};

/// Dispatches a slash command to its handler.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(ctx, &command, "❌ Commands only work inside a server").await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "summon" => handle_summon(ctx, &command, bot, guild_id).await,
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "current" => handle_current(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        _ => respond(ctx, &command, "❌ Unknown command").await,
    }
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let name = string_option(command, "channel").unwrap_or_default();
    let Some(channel_id) = find_voice_channel(ctx, guild_id, name) else {
        return respond(ctx, command, messages::CHANNEL_NOT_FOUND).await;
    };

    defer(ctx, command).await?;
    if !connect(ctx, bot, guild_id, channel_id).await {
        return edit(ctx, command, messages::JOIN_FAILED).await;
    }
    edit(ctx, command, &messages::joined(name)).await
}

async fn handle_summon(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, messages::MUST_BE_IN_VOICE).await;
    };

    defer(ctx, command).await?;
    if !connect(ctx, bot, guild_id, channel_id).await {
        return edit(ctx, command, messages::JOIN_FAILED).await;
    }
    let name = channel_name(ctx, guild_id, channel_id).unwrap_or_else(|| channel_id.to_string());
    edit(ctx, command, &messages::joined(&name)).await
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let locator = string_option(command, "request")
        .map(str::trim)
        .unwrap_or_default();
    if locator.is_empty() {
        return respond(ctx, command, messages::PLAY_USAGE).await;
    }

    // Resolving can take a while
    defer(ctx, command).await?;

    let registry = bot.registry();
    if registry.voice(guild_id).is_none() {
        let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
            return edit(ctx, command, messages::MUST_BE_IN_VOICE).await;
        };
        if !connect(ctx, bot, guild_id, channel_id).await {
            return edit(ctx, command, messages::JOIN_FAILED).await;
        }
    }
    let Some(voice) = registry.voice(guild_id) else {
        return edit(ctx, command, &messages::playback_error(&PlaybackError::NotConnected)).await;
    };

    let options = bot.stream_options();
    let metadata = match voice.resolve(locator, &options).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Guild {}: rejected {}: {:?}", guild_id, locator, e);
            let error = PlaybackError::admission(locator, e);
            return edit(ctx, command, &messages::playback_error(&error)).await;
        }
    };

    let request = Request::new(command.user.id, command.channel_id, locator, options)
        .with_metadata(metadata);

    // Sampled before enqueueing, so the reply reflects what the user saw.
    let was_playing = registry.is_playing(guild_id);
    let position = match registry.enqueue(guild_id, request.clone()) {
        Ok(position) => position,
        Err(e) => return edit(ctx, command, &messages::playback_error(&e)).await,
    };

    let reply = if was_playing {
        messages::queued(&request, position)
    } else {
        messages::accepted(&request)
    };
    edit(ctx, command, &reply).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = match integer_option(command, "percentage") {
        Some(percentage) => match bot.registry().set_volume(guild_id, percentage) {
            Ok(volume) => messages::volume_set(volume),
            Err(e) => messages::volume_error(&e),
        },
        None => messages::volume_error(&PlaybackError::InvalidVolume(-1)),
    };
    respond(ctx, command, &reply).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = match bot.registry().pause(guild_id) {
        Ok(()) => messages::PAUSED.to_string(),
        Err(e) => messages::playback_error(&e),
    };
    respond(ctx, command, &reply).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let reply = match bot.registry().resume(guild_id) {
        Ok(()) => messages::RESUMED.to_string(),
        Err(e) => messages::playback_error(&e),
    };
    respond(ctx, command, &reply).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    defer(ctx, command).await?;
    bot.registry().stop(guild_id).await;
    edit(ctx, command, messages::STOPPED).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let outcome = bot.registry().skip(guild_id, command.user.id);
    debug!("Guild {}: skip by {} -> {:?}", guild_id, command.user.id, outcome);
    respond(ctx, command, &messages::skip_outcome(&outcome)).await
}

async fn handle_current(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.registry().current_status(guild_id) {
        Some(status) => respond_embed(ctx, command, embeds::create_now_playing_embed(&status)).await,
        None => respond(ctx, command, messages::NOT_PLAYING).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = integer_option(command, "page").unwrap_or(1).max(1) as usize;
    let registry = bot.registry();
    let current = registry.current_status(guild_id);
    let pending = registry.list_pending(guild_id);

    let embed = embeds::create_queue_embed(current.as_ref(), &pending, page);
    respond_embed(ctx, command, embed).await
}

// Helpers

async fn connect(ctx: &Context, bot: &JukeboxBot, guild_id: GuildId, channel_id: ChannelId) -> bool {
    match bot.connect(ctx, guild_id, channel_id).await {
        Ok(()) => true,
        Err(e) => {
            warn!("🔇 Guild {}: could not connect to {}: {:?}", guild_id, channel_id, e);
            false
        }
    }
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn find_voice_channel(ctx: &Context, guild_id: GuildId, name: &str) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .channels
        .values()
        .find(|channel| {
            matches!(channel.kind, ChannelType::Voice | ChannelType::Stage)
                && channel.name.eq_ignore_ascii_case(name.trim())
        })
        .map(|channel| channel.id)
}

fn channel_name(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Option<String> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild.channels.get(&channel_id).map(|channel| channel.name.clone())
}
