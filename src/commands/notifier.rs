//! Reminder delivery over Discord DMs
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::debug;
use serenity::http::Http;
use serenity::model::id::UserId;
use std::sync::Arc;

use crate::core::response::chunk_for_message;
use crate::features::reminders::Notifier;

/// Sends reminder text to the owner's DM channel. Owners are Discord user ids.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

pub fn parse_owner(owner: &str) -> Result<UserId> {
    let id: u64 = owner
        .parse()
        .with_context(|| format!("Owner '{owner}' is not a Discord user id"))?;
    Ok(UserId(id))
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, owner: &str, text: &str) -> Result<()> {
        let user = parse_owner(owner)?;
        let dm = user
            .create_dm_channel(&self.http)
            .await
            .with_context(|| format!("Could not open a DM with {owner}"))?;
        for chunk in chunk_for_message(text) {
            dm.send_message(&self.http, |m| m.content(&chunk)).await?;
        }
        debug!("Sent DM to {}", owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner() {
        assert_eq!(parse_owner("123456789012345678").unwrap(), UserId(123456789012345678));
        assert!(parse_owner("alice").is_err());
    }
}
