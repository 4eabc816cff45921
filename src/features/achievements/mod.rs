//! # Achievements Feature
//!
//! Badges for finishing homework, checked whenever an item is completed.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod evaluator;

pub use evaluator::{longest_completed_streak, AchievementEvaluator, STREAK_TARGET};
