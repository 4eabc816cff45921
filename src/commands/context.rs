//! Shared services for the conversation surface
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use crate::database::SharedStore;
use crate::features::achievements::AchievementEvaluator;
use crate::features::forms::FormRegistry;
use crate::features::reminders::ReminderEngine;

/// Everything a handler needs, built once at startup
#[derive(Clone)]
pub struct CommandContext {
    pub store: SharedStore,
    pub reminders: ReminderEngine,
    pub forms: FormRegistry,
    pub achievements: AchievementEvaluator,
}

impl CommandContext {
    pub fn new(
        store: SharedStore,
        reminders: ReminderEngine,
        forms: FormRegistry,
        achievements: AchievementEvaluator,
    ) -> Self {
        Self {
            store,
            reminders,
            forms,
            achievements,
        }
    }
}
