//! # Features
//!
//! Each feature lives in its own module with a version header.

pub mod achievements;
pub mod forms;
pub mod reminders;
pub mod validation;

pub use achievements::AchievementEvaluator;
pub use forms::{FormRegistry, FormReply, FormState};
pub use reminders::{JobScheduler, Notifier, ReminderEngine, SharedNotifier};
