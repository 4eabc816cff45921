//! # Conversation Surface
//!
//! Slash commands, inline menus and the routing between them and the
//! feature services.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod context;
pub mod handler;
pub mod menus;
pub mod notifier;
pub mod slash;

pub use context::CommandContext;
pub use handler::{Command, ConversationHandler, Screen};
pub use menus::{Menu, MenuAction};
pub use notifier::DiscordNotifier;
pub use slash::{create_slash_commands, register_global_commands, register_guild_commands};
