//! # Core Module
//!
//! Configuration, message sizing and reply rendering shared by every feature.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Add format module with schedule, homework, notes and progress renderers
//! - 1.0.0: Initial creation with config and response modules

pub mod config;
pub mod format;
pub mod response;

// Re-export commonly used items
pub use config::{Config, StorageBackend};
pub use response::{chunk_for_message, chunk_text, truncate_chars, BUTTON_LABEL_LIMIT, MESSAGE_LIMIT};
