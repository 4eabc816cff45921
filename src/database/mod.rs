//! Domain Store
//!
//! Owner-scoped persistence for schedule entries, homework, notes,
//! achievements and per-user settings. Callers only see [`DomainStore`];
//! which backend is active is decided once at startup by [`open_store`].
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod models;
pub mod sqlite_store;
pub mod supabase;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveTime;
use log::info;
use std::sync::Arc;

use crate::core::config::{Config, StorageBackend};

pub use models::{
    Achievement, AchievementKind, HomeworkEntry, HomeworkFilter, HomeworkPatch, HomeworkStats,
    NewHomework, NewNote, NewScheduleEntry, Note, NotePatch, RecordId, ScheduleEntry,
    ScheduleFilter, SchedulePatch, ScheduleSlot, SettingsPatch, UserSettings, DEFAULT_LANGUAGE,
    DEFAULT_THEME, LANGUAGES, THEMES,
};
pub use sqlite_store::SqliteStore;
pub use supabase::SupabaseStore;

/// Persistence contract shared by every backend.
///
/// Every method is scoped by `owner`; a record belonging to someone else
/// behaves exactly like a missing one. Mutations return `false` when
/// nothing matched.
#[async_trait]
pub trait DomainStore: Send + Sync {
    // Schedule
    async fn add_schedule(&self, owner: &str, entry: &NewScheduleEntry) -> Result<RecordId>;
    async fn list_schedule(&self, owner: &str, filter: ScheduleFilter)
        -> Result<Vec<ScheduleEntry>>;
    async fn get_schedule(&self, owner: &str, id: RecordId) -> Result<Option<ScheduleEntry>>;
    async fn update_schedule(&self, owner: &str, id: RecordId, patch: &SchedulePatch)
        -> Result<bool>;
    async fn delete_schedule(&self, owner: &str, id: RecordId) -> Result<bool>;

    // Homework
    async fn add_homework(&self, owner: &str, entry: &NewHomework) -> Result<RecordId>;
    async fn list_homework(&self, owner: &str, filter: &HomeworkFilter)
        -> Result<Vec<HomeworkEntry>>;
    async fn get_homework(&self, owner: &str, id: RecordId) -> Result<Option<HomeworkEntry>>;
    async fn update_homework(&self, owner: &str, id: RecordId, patch: &HomeworkPatch)
        -> Result<bool>;
    async fn complete_homework(&self, owner: &str, id: RecordId) -> Result<bool>;
    async fn delete_homework(&self, owner: &str, id: RecordId) -> Result<bool>;
    async fn homework_stats(&self, owner: &str) -> Result<HomeworkStats>;

    // Notes
    async fn add_note(&self, owner: &str, note: &NewNote) -> Result<RecordId>;
    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>>;
    async fn get_note(&self, owner: &str, id: RecordId) -> Result<Option<Note>>;
    async fn update_note(&self, owner: &str, id: RecordId, patch: &NotePatch) -> Result<bool>;
    async fn delete_note(&self, owner: &str, id: RecordId) -> Result<bool>;
    /// Case-insensitive substring match over title and content
    async fn search_notes(&self, owner: &str, query: &str) -> Result<Vec<Note>>;

    // Achievements
    /// Returns `true` only when the achievement was newly recorded
    async fn unlock_achievement(&self, owner: &str, kind: AchievementKind, detail: &str)
        -> Result<bool>;
    async fn list_achievements(&self, owner: &str) -> Result<Vec<Achievement>>;

    // Settings
    async fn get_or_create_settings(&self, owner: &str, default_reminder_time: NaiveTime)
        -> Result<UserSettings>;
    async fn update_settings(&self, owner: &str, patch: &SettingsPatch) -> Result<bool>;
    async fn list_settings(&self) -> Result<Vec<UserSettings>>;

    /// Remove the owner's schedule, homework and notes
    async fn clear_user_data(&self, owner: &str) -> Result<()>;

    /// Release the backend. Called after the job scheduler has stopped.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub type SharedStore = Arc<dyn DomainStore>;

/// Open the backend selected by configuration
pub async fn open_store(config: &Config) -> Result<SharedStore> {
    let store: SharedStore = match &config.backend {
        StorageBackend::Sqlite => {
            info!("Opening sqlite store at {}", config.database_path);
            Arc::new(SqliteStore::open(&config.database_path).await?)
        }
        StorageBackend::Supabase { url, key } => {
            info!("Using hosted store at {}", url);
            Arc::new(SupabaseStore::new(url, key)?)
        }
    };
    Ok(store)
}
