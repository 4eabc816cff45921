use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::*;
use std::sync::Arc;

use study_buddy::commands::{
    register_global_commands, register_guild_commands, Command, CommandContext,
    ConversationHandler, DiscordNotifier, Menu, MenuAction, Screen,
};
use study_buddy::core::{chunk_for_message, Config};
use study_buddy::database::open_store;
use study_buddy::features::forms::conversation_key;
use study_buddy::features::{
    AchievementEvaluator, FormRegistry, JobScheduler, ReminderEngine, SharedNotifier,
};

struct Handler {
    conversation: Arc<ConversationHandler>,
    guild_id: Option<GuildId>,
}

/// Send chunks as consecutive messages; the menu goes under the last one
async fn send_chunks(
    http: &Http,
    channel_id: ChannelId,
    chunks: &[String],
    menu: Option<&Menu>,
) -> Result<()> {
    let last = chunks.len().saturating_sub(1);
    for (idx, chunk) in chunks.iter().enumerate() {
        channel_id
            .send_message(http, |m| {
                m.content(chunk);
                if let (true, Some(menu)) = (idx == last, menu) {
                    m.set_components(menu.to_components());
                }
                m
            })
            .await?;
    }
    Ok(())
}

/// First chunk for the interaction response, the rest as follow-up messages
fn split_screen(screen: &Screen) -> (String, Vec<String>) {
    let mut chunks = chunk_for_message(&screen.text).into_iter();
    let first = chunks.next().unwrap_or_default();
    (first, chunks.collect())
}

impl Handler {
    async fn handle_slash_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let owner = command.user.id.to_string();
        let conversation = conversation_key(command.channel_id, &owner);

        let screen = match Command::parse(&format!("/{}", command.data.name)) {
            Some(parsed) => {
                info!("/{} from {}", command.data.name, owner);
                self.conversation.on_command(&conversation, &owner, parsed).await
            }
            None => Screen::text("Unknown command."),
        };

        let (first, rest) = split_screen(&screen);
        let inline_menu = if rest.is_empty() { screen.menu.as_ref() } else { None };

        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message.content(&first);
                        if let Some(menu) = inline_menu {
                            message.set_components(menu.to_components());
                        }
                        message
                    })
            })
            .await?;

        if !rest.is_empty() {
            send_chunks(&ctx.http, command.channel_id, &rest, screen.menu.as_ref()).await?;
        }
        Ok(())
    }

    async fn handle_component(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
    ) -> Result<()> {
        let owner = component.user.id.to_string();
        let conversation = conversation_key(component.channel_id, &owner);
        let custom_id = &component.data.custom_id;

        let screen = match MenuAction::parse(custom_id) {
            Some(action) => {
                info!("Processing component interaction: {custom_id} from user: {owner}");
                self.conversation.on_action(&conversation, &owner, action).await
            }
            None => {
                warn!("Unknown component id {custom_id} from {owner}");
                Screen::text("Unknown component interaction.")
            }
        };

        let (first, rest) = split_screen(&screen);
        let inline_menu = if rest.is_empty() { screen.menu.as_ref() } else { None };

        component
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::UpdateMessage)
                    .interaction_response_data(|message| {
                        message.content(&first);
                        match inline_menu {
                            Some(menu) => message.set_components(menu.to_components()),
                            None => message.components(|c| c),
                        };
                        message
                    })
            })
            .await?;

        if !rest.is_empty() {
            send_chunks(&ctx.http, component.channel_id, &rest, screen.menu.as_ref()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let owner = msg.author.id.to_string();
        let conversation = conversation_key(msg.channel_id, &owner);
        let Some(screen) = self
            .conversation
            .on_text(&conversation, &owner, &msg.content)
            .await
        else {
            return;
        };

        let chunks = chunk_for_message(&screen.text);
        if let Err(e) = send_chunks(&ctx.http, msg.channel_id, &chunks, screen.menu.as_ref()).await {
            error!("Error replying to {}: {}", owner, e);
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());

        if let Some(guild_id) = self.guild_id {
            if let Err(e) = register_guild_commands(&ctx, guild_id).await {
                error!("❌ Failed to register guild slash commands: {e}");
            }
        } else if let Err(e) = register_global_commands(&ctx).await {
            error!("❌ Failed to register global slash commands: {e}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                if let Err(e) = self.handle_slash_command(&ctx, &command).await {
                    error!(
                        "Error handling slash command '{}': {}",
                        command.data.name, e
                    );
                }
            }
            Interaction::MessageComponent(component) => {
                if let Err(e) = self.handle_component(&ctx, &component).await {
                    error!(
                        "Error handling component interaction '{}': {}",
                        component.data.custom_id, e
                    );
                    let _ = component
                        .create_interaction_response(&ctx.http, |response| {
                            response
                                .kind(InteractionResponseType::ChannelMessageWithSource)
                                .interaction_response_data(|message| {
                                    message.content(
                                        "❌ Sorry, I encountered an error processing your interaction. Please try again.",
                                    )
                                })
                        })
                        .await;
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!(
        "Starting study assistant ({} storage)...",
        config.backend.name()
    );

    let store = open_store(&config).await?;

    let http = Arc::new(Http::new(&config.discord_token));
    let notifier: SharedNotifier = Arc::new(DiscordNotifier::new(http));
    let scheduler = JobScheduler::new();
    let reminders = ReminderEngine::new(
        store.clone(),
        scheduler.clone(),
        notifier.clone(),
        config.default_reminder_time,
    );
    let forms = FormRegistry::new(store.clone(), reminders.clone());
    let achievements = AchievementEvaluator::new(store.clone(), notifier);

    match reminders.restore_all().await {
        Ok(count) => info!("⏰ Reminders restored for {count} users"),
        Err(e) => error!("Failed to restore reminders: {e}"),
    }

    let context = CommandContext::new(store.clone(), reminders, forms, achievements);

    // Parse guild ID if provided for development mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler {
        conversation: Arc::new(ConversationHandler::new(Arc::new(context))),
        guild_id,
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            return;
        }
        info!("Shutdown requested, disconnecting from Discord...");
        shard_manager.lock().await.shutdown_all().await;
    });

    info!("Establishing WebSocket connection to Discord gateway...");
    let outcome = client.start().await;

    // jobs must stop before the store goes away
    scheduler.shutdown();
    if let Err(e) = store.close().await {
        error!("Failed to close store: {e}");
    }
    info!("Shutdown complete");

    outcome.map_err(|why| {
        error!("Gateway connection failed: {why:?}");
        anyhow::anyhow!("Failed to establish gateway connection: {}", why)
    })
}
