// Core layer - shared types, configuration and rendering
pub mod core;

// Features layer - forms, reminders, achievements, validation
pub mod features;

// Storage layer - domain store and its backends
pub mod database;

// Application layer - conversation routing and Discord glue
pub mod commands;

pub use core::Config;
pub use database::{open_store, DomainStore, SharedStore};
pub use features::{AchievementEvaluator, FormRegistry, JobScheduler, ReminderEngine};
