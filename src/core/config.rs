//! Environment-driven configuration
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Result};
use chrono::NaiveTime;

use crate::features::validation::validate_time;

pub const DEFAULT_DATABASE_PATH: &str = "data/study_buddy.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_REMINDER_TIME: &str = "08:00";

/// Which persistence backend the Domain Store talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local sqlite file at `database_path`
    Sqlite,
    /// Hosted PostgREST tables (Supabase)
    Supabase { url: String, key: String },
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Supabase { .. } => "supabase",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub discord_guild_id: Option<String>,
    pub backend: StorageBackend,
    pub database_path: String,
    pub log_level: String,
    pub default_reminder_time: NaiveTime,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Missing credentials are fatal; there is no degraded mode.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token =
            get("DISCORD_TOKEN").ok_or_else(|| anyhow!("DISCORD_TOKEN must be set"))?;

        let backend = match get("STORAGE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StorageBackend::Sqlite,
            "supabase" => {
                let url = get("SUPABASE_URL");
                let key = get("SUPABASE_KEY");
                match (url, key) {
                    (Some(url), Some(key)) => StorageBackend::Supabase { url, key },
                    _ => {
                        return Err(anyhow!(
                            "SUPABASE_URL and SUPABASE_KEY must be set when STORAGE_BACKEND=supabase"
                        ))
                    }
                }
            }
            other => return Err(anyhow!("Unknown STORAGE_BACKEND: {}", other)),
        };

        let reminder_raw =
            get("DEFAULT_REMINDER_TIME").unwrap_or_else(|| DEFAULT_REMINDER_TIME.to_string());
        let default_reminder_time = validate_time(&reminder_raw)
            .map_err(|e| anyhow!("DEFAULT_REMINDER_TIME is invalid: {}", e))?;

        Ok(Config {
            discord_token,
            discord_guild_id: get("DISCORD_GUILD_ID"),
            backend,
            database_path: get("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            default_reminder_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_token_only() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.default_reminder_time,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert!(config.discord_guild_id.is_none());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn test_supabase_requires_credentials() {
        let result = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("STORAGE_BACKEND", "supabase"),
            ("SUPABASE_URL", "https://example.supabase.co"),
        ]));
        assert!(result.is_err());

        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("STORAGE_BACKEND", "Supabase"),
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.backend.name(), "supabase");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("STORAGE_BACKEND", "mongo"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_reminder_time_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEFAULT_REMINDER_TIME", "25:00"),
        ]));
        assert!(result.is_err());
    }
}
