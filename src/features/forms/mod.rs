//! # Forms Feature
//!
//! Multi-turn input collection. Each conversation holds at most one form;
//! every turn is validated against the current step before it advances.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod registry;
pub mod state;

pub use registry::{conversation_key, FormRegistry, FormReply};
pub use state::{
    Edit, EditField, EditStep, FormState, HomeworkCreation, HomeworkField, NoteCreation,
    NoteField, ScheduleCreation, ScheduleField, Submission, Transition, SKIP_TOKEN,
};
