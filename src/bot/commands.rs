use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers the commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the commands for a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        summon_command(),
        play_command(),
        volume_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        current_command(),
        queue_command(),
    ]
}

// Connection

fn join_command() -> CreateCommand {
    CreateCommand::new("join")
        .description("Joins a voice channel")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "channel",
                "Name of the voice channel",
            )
            .required(true),
        )
}

fn summon_command() -> CreateCommand {
    CreateCommand::new("summon").description("Summons the bot to your voice channel")
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Queues a URL or a search")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "request",
                "URL or search terms",
            )
            .required(true),
        )
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Sets the volume of the current request")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "percentage",
                "Volume between 0 and 100",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pauses the current request")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resumes the current request")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops playback, clears the queue and leaves voice")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the current request, or votes to")
}

// Status

fn current_command() -> CreateCommand {
    CreateCommand::new("current").description("Shows what is playing right now")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Shows the pending requests")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

