//! # Reminders Feature
//!
//! Derives class and homework-deadline reminders from stored records and
//! fires them through an in-process job scheduler.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Deliveries in progress are never aborted by re-derivation
//! - 1.0.0: Initial release

pub mod engine;
pub mod scheduler;

pub use engine::{
    daily_job_id, job_id, plan_class_reminder, plan_homework_reminders, Notifier,
    PlannedReminder, ReminderEngine, ReminderKind, SharedNotifier,
};
pub use scheduler::{JobAction, JobFuture, JobInfo, JobScheduler, Trigger};
