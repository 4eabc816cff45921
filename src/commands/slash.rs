//! # Slash Commands (/)
//!
//! `/start`, `/menu`, `/cancel` and `/skip`. Everything else happens
//! through buttons and plain messages.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use anyhow::Result;
use log::info;
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::Command as ApplicationCommand;
use serenity::model::id::GuildId;
use serenity::prelude::Context;

use super::handler::Command;

fn describe(command: Command) -> &'static str {
    match command {
        Command::Start => "Open the study assistant",
        Command::Menu => "Back to the main menu",
        Command::Cancel => "Cancel the current input",
        Command::Skip => "Skip an optional field",
    }
}

/// Creates all slash command definitions
pub fn create_slash_commands() -> Vec<CreateApplicationCommand> {
    [Command::Start, Command::Menu, Command::Cancel, Command::Skip]
        .into_iter()
        .map(|command| {
            CreateApplicationCommand::default()
                .name(command.name())
                .description(describe(command))
                .dm_permission(true)
                .to_owned()
        })
        .collect()
}

/// Registers all slash commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    let slash_commands = create_slash_commands();
    let count = slash_commands.len();

    ApplicationCommand::set_global_application_commands(&ctx.http, |commands| {
        for command in slash_commands {
            commands.add_application_command(command);
        }
        commands
    })
    .await?;

    info!("Global slash commands registered successfully ({count} commands)");
    Ok(())
}

/// Registers all slash commands for a specific guild (faster for testing)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    let slash_commands = create_slash_commands();
    let count = slash_commands.len();

    guild_id
        .set_application_commands(&ctx.http, |commands| {
            for command in slash_commands {
                commands.add_application_command(command);
            }
            commands
        })
        .await?;

    info!("Guild slash commands registered for guild {guild_id} ({count} commands)");
    Ok(())
}
