//! Form flows as tagged states
//!
//! Each variant carries only what has been collected so far. A turn either
//! advances to the next step, is rejected with a reason (state unchanged),
//! or completes with a [`Submission`] ready to be written.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{NaiveDate, NaiveTime, Weekday};

use crate::database::{
    HomeworkPatch, NewHomework, NewNote, NewScheduleEntry, NotePatch, RecordId, SchedulePatch,
    ScheduleSlot,
};
use crate::features::validation::{
    parse_weekday, validate_date_on, validate_room, validate_text, validate_time, Invalid,
    Validation,
};

/// Typed in place of a value to leave an optional field empty
pub const SKIP_TOKEN: &str = "/skip";

pub const MAX_SUBJECT_LEN: usize = 100;
pub const MAX_TASK_LEN: usize = 500;
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 1000;
pub const MAX_QUERY_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeworkCreation {
    Subject,
    Task { subject: String },
    Deadline { subject: String, task: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCreation {
    Day,
    Subject { slot: ScheduleSlot },
    Time { slot: ScheduleSlot, subject: String },
    Room { slot: ScheduleSlot, subject: String, time: NaiveTime },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteCreation {
    Title,
    Content { title: String },
}

/// A field that an edit flow can target
pub trait EditField: Copy + Sized + 'static {
    const ALL: &'static [Self];

    /// Machine key, also used as the button payload
    fn key(&self) -> &'static str;
    fn label(&self) -> &'static str;
    /// Whether skipping clears the field
    fn optional(&self) -> bool;

    fn parse(input: &str) -> Option<Self> {
        let wanted = input.trim();
        Self::ALL.iter().copied().find(|field| {
            field.key().eq_ignore_ascii_case(wanted) || field.label().eq_ignore_ascii_case(wanted)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeworkField {
    Subject,
    Task,
    Deadline,
}

impl EditField for HomeworkField {
    const ALL: &'static [Self] = &[HomeworkField::Subject, HomeworkField::Task, HomeworkField::Deadline];

    fn key(&self) -> &'static str {
        match self {
            HomeworkField::Subject => "subject",
            HomeworkField::Task => "task",
            HomeworkField::Deadline => "deadline",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HomeworkField::Subject => "Subject",
            HomeworkField::Task => "Task",
            HomeworkField::Deadline => "Deadline",
        }
    }

    fn optional(&self) -> bool {
        matches!(self, HomeworkField::Deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleField {
    Subject,
    Time,
    Room,
}

impl EditField for ScheduleField {
    const ALL: &'static [Self] = &[ScheduleField::Subject, ScheduleField::Time, ScheduleField::Room];

    fn key(&self) -> &'static str {
        match self {
            ScheduleField::Subject => "subject",
            ScheduleField::Time => "time",
            ScheduleField::Room => "room",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScheduleField::Subject => "Subject",
            ScheduleField::Time => "Time",
            ScheduleField::Room => "Room",
        }
    }

    fn optional(&self) -> bool {
        matches!(self, ScheduleField::Room)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Title,
    Content,
}

impl EditField for NoteField {
    const ALL: &'static [Self] = &[NoteField::Title, NoteField::Content];

    fn key(&self) -> &'static str {
        match self {
            NoteField::Title => "title",
            NoteField::Content => "content",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NoteField::Title => "Title",
            NoteField::Content => "Content",
        }
    }

    fn optional(&self) -> bool {
        matches!(self, NoteField::Content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep<F> {
    AwaitingField,
    AwaitingValue(F),
}

/// Two-step edit of one existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit<F> {
    pub id: RecordId,
    pub step: EditStep<F>,
}

impl<F: EditField> Edit<F> {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            step: EditStep::AwaitingField,
        }
    }

    /// Start with the field already chosen (picked from a button)
    pub fn with_field(id: RecordId, field: F) -> Self {
        Self {
            id,
            step: EditStep::AwaitingValue(field),
        }
    }

    fn choose(&self, input: &str) -> Validation<Self> {
        let field = F::parse(input).ok_or_else(|| {
            let names: Vec<&str> = F::ALL.iter().map(|f| f.key()).collect();
            Invalid::new(format!("Unknown field. Choose one of: {}", names.join(", ")))
        })?;
        Ok(Self::with_field(self.id, field))
    }

    fn field_prompt(&self) -> String {
        match self.step {
            EditStep::AwaitingField => {
                let names: Vec<&str> = F::ALL.iter().map(|f| f.label()).collect();
                format!("Which field do you want to change? ({})", names.join(", "))
            }
            EditStep::AwaitingValue(field) if field.optional() => {
                format!("Enter the new {} (or {SKIP_TOKEN} to clear it):", field.key())
            }
            EditStep::AwaitingValue(field) => format!("Enter the new {}:", field.key()),
        }
    }
}

/// Per-conversation form state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Homework(HomeworkCreation),
    Schedule(ScheduleCreation),
    Note(NoteCreation),
    EditHomework(Edit<HomeworkField>),
    EditSchedule(Edit<ScheduleField>),
    EditNote(Edit<NoteField>),
    ReminderTime,
    NoteSearch,
    HomeworkBySubject,
}

/// A completed form, ready for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Homework(NewHomework),
    Schedule(NewScheduleEntry),
    Note(NewNote),
    HomeworkUpdate { id: RecordId, patch: HomeworkPatch },
    ScheduleUpdate { id: RecordId, patch: SchedulePatch },
    NoteUpdate { id: RecordId, patch: NotePatch },
    ReminderTime(NaiveTime),
    NoteSearch(String),
    HomeworkBySubject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advance(FormState),
    Rejected(FormState, Invalid),
    Complete(Submission),
}

/// A weekday name/number, or a concrete date for a one-off class
fn parse_slot(input: &str, today: NaiveDate) -> Validation<ScheduleSlot> {
    match parse_weekday(input) {
        Ok(day) => Ok(ScheduleSlot::Weekly(day)),
        Err(day_err) => match validate_date_on(input, today) {
            Ok(date) => Ok(ScheduleSlot::Dated(date)),
            Err(_) => Err(day_err),
        },
    }
}

fn required(field: &str) -> Invalid {
    Invalid::new(format!("The {field} is required and cannot be skipped"))
}

impl FormState {
    pub fn homework() -> Self {
        FormState::Homework(HomeworkCreation::Subject)
    }

    pub fn schedule() -> Self {
        FormState::Schedule(ScheduleCreation::Day)
    }

    /// Schedule creation with the day already picked
    pub fn schedule_on(day: Weekday) -> Self {
        FormState::Schedule(ScheduleCreation::Subject {
            slot: ScheduleSlot::Weekly(day),
        })
    }

    pub fn note() -> Self {
        FormState::Note(NoteCreation::Title)
    }

    /// Text shown to the user for the current step
    pub fn prompt(&self) -> String {
        match self {
            FormState::Homework(step) => match step {
                HomeworkCreation::Subject => "📘 Enter the subject:".to_string(),
                HomeworkCreation::Task { subject } => format!("📘 {subject}\nDescribe the task:"),
                HomeworkCreation::Deadline { .. } => format!(
                    "📅 Enter the deadline as DD.MM.YY (or {SKIP_TOKEN} for no deadline):"
                ),
            },
            FormState::Schedule(step) => match step {
                ScheduleCreation::Day => {
                    "📅 Which day? (Monday-Sunday, 0-6, or a date DD.MM.YY)".to_string()
                }
                ScheduleCreation::Subject { .. } => "📚 Enter the subject:".to_string(),
                ScheduleCreation::Time { subject, .. } => {
                    format!("🕐 What time does {subject} start? (HH:MM)")
                }
                ScheduleCreation::Room { .. } => {
                    format!("🚪 Enter the room (or {SKIP_TOKEN}):")
                }
            },
            FormState::Note(step) => match step {
                NoteCreation::Title => "📝 Enter the note title:".to_string(),
                NoteCreation::Content { .. } => {
                    format!("📝 Enter the note text (or {SKIP_TOKEN} to leave it empty):")
                }
            },
            FormState::EditHomework(edit) => edit.field_prompt(),
            FormState::EditSchedule(edit) => edit.field_prompt(),
            FormState::EditNote(edit) => edit.field_prompt(),
            FormState::ReminderTime => "⏰ Enter the daily reminder time (HH:MM):".to_string(),
            FormState::NoteSearch => "🔍 Enter text to search for:".to_string(),
            FormState::HomeworkBySubject => "📘 Enter the subject:".to_string(),
        }
    }

    /// Feed one turn of input. `today` bounds deadline dates.
    pub fn advance(self, input: &str, today: NaiveDate) -> Transition {
        match self.accept(input.trim(), today) {
            Ok(transition) => transition,
            Err(reason) => Transition::Rejected(self, reason),
        }
    }

    fn accept(&self, input: &str, today: NaiveDate) -> Validation<Transition> {
        let skipped = input == SKIP_TOKEN;

        let transition = match self {
            FormState::Homework(step) => match step {
                HomeworkCreation::Subject => {
                    if skipped {
                        return Err(required("subject"));
                    }
                    let subject = validate_text(input, 1, MAX_SUBJECT_LEN)?;
                    Transition::Advance(FormState::Homework(HomeworkCreation::Task { subject }))
                }
                HomeworkCreation::Task { subject } => {
                    if skipped {
                        return Err(required("task"));
                    }
                    let task = validate_text(input, 1, MAX_TASK_LEN)?;
                    Transition::Advance(FormState::Homework(HomeworkCreation::Deadline {
                        subject: subject.clone(),
                        task,
                    }))
                }
                HomeworkCreation::Deadline { subject, task } => {
                    let deadline = if skipped {
                        None
                    } else {
                        Some(validate_date_on(input, today)?)
                    };
                    Transition::Complete(Submission::Homework(NewHomework {
                        subject: subject.clone(),
                        task: task.clone(),
                        deadline,
                    }))
                }
            },

            FormState::Schedule(step) => match step {
                ScheduleCreation::Day => {
                    if skipped {
                        return Err(required("day"));
                    }
                    let slot = parse_slot(input, today)?;
                    Transition::Advance(FormState::Schedule(ScheduleCreation::Subject { slot }))
                }
                ScheduleCreation::Subject { slot } => {
                    if skipped {
                        return Err(required("subject"));
                    }
                    let subject = validate_text(input, 1, MAX_SUBJECT_LEN)?;
                    Transition::Advance(FormState::Schedule(ScheduleCreation::Time {
                        slot: *slot,
                        subject,
                    }))
                }
                ScheduleCreation::Time { slot, subject } => {
                    if skipped {
                        return Err(required("time"));
                    }
                    let time = validate_time(input)?;
                    Transition::Advance(FormState::Schedule(ScheduleCreation::Room {
                        slot: *slot,
                        subject: subject.clone(),
                        time,
                    }))
                }
                ScheduleCreation::Room {
                    slot,
                    subject,
                    time,
                } => {
                    let room = if skipped { None } else { validate_room(input)? };
                    Transition::Complete(Submission::Schedule(NewScheduleEntry {
                        slot: *slot,
                        subject: subject.clone(),
                        time: *time,
                        room,
                    }))
                }
            },

            FormState::Note(step) => match step {
                NoteCreation::Title => {
                    if skipped {
                        return Err(required("title"));
                    }
                    let title = validate_text(input, 1, MAX_TITLE_LEN)?;
                    Transition::Advance(FormState::Note(NoteCreation::Content { title }))
                }
                NoteCreation::Content { title } => {
                    let content = if skipped || input.is_empty() {
                        String::new()
                    } else {
                        validate_text(input, 1, MAX_CONTENT_LEN)?
                    };
                    Transition::Complete(Submission::Note(NewNote {
                        title: title.clone(),
                        content,
                    }))
                }
            },

            FormState::EditHomework(edit) => match edit.step {
                EditStep::AwaitingField => {
                    Transition::Advance(FormState::EditHomework(edit.choose(input)?))
                }
                EditStep::AwaitingValue(field) => {
                    let patch = homework_patch(field, input, skipped, today)?;
                    Transition::Complete(Submission::HomeworkUpdate { id: edit.id, patch })
                }
            },

            FormState::EditSchedule(edit) => match edit.step {
                EditStep::AwaitingField => {
                    Transition::Advance(FormState::EditSchedule(edit.choose(input)?))
                }
                EditStep::AwaitingValue(field) => {
                    let patch = schedule_patch(field, input, skipped)?;
                    Transition::Complete(Submission::ScheduleUpdate { id: edit.id, patch })
                }
            },

            FormState::EditNote(edit) => match edit.step {
                EditStep::AwaitingField => {
                    Transition::Advance(FormState::EditNote(edit.choose(input)?))
                }
                EditStep::AwaitingValue(field) => {
                    let patch = note_patch(field, input, skipped)?;
                    Transition::Complete(Submission::NoteUpdate { id: edit.id, patch })
                }
            },

            FormState::ReminderTime => {
                if skipped {
                    return Err(required("time"));
                }
                Transition::Complete(Submission::ReminderTime(validate_time(input)?))
            }
            FormState::NoteSearch => {
                if skipped {
                    return Err(required("search text"));
                }
                Transition::Complete(Submission::NoteSearch(validate_text(
                    input,
                    1,
                    MAX_QUERY_LEN,
                )?))
            }
            FormState::HomeworkBySubject => {
                if skipped {
                    return Err(required("subject"));
                }
                Transition::Complete(Submission::HomeworkBySubject(validate_text(
                    input,
                    1,
                    MAX_SUBJECT_LEN,
                )?))
            }
        };
        Ok(transition)
    }
}

fn homework_patch(
    field: HomeworkField,
    input: &str,
    skipped: bool,
    today: NaiveDate,
) -> Validation<HomeworkPatch> {
    if skipped && !field.optional() {
        return Err(required(field.key()));
    }
    let mut patch = HomeworkPatch::default();
    match field {
        HomeworkField::Subject => patch.subject = Some(validate_text(input, 1, MAX_SUBJECT_LEN)?),
        HomeworkField::Task => patch.task = Some(validate_text(input, 1, MAX_TASK_LEN)?),
        HomeworkField::Deadline => {
            patch.deadline = Some(if skipped {
                None
            } else {
                Some(validate_date_on(input, today)?)
            })
        }
    }
    Ok(patch)
}

fn schedule_patch(field: ScheduleField, input: &str, skipped: bool) -> Validation<SchedulePatch> {
    if skipped && !field.optional() {
        return Err(required(field.key()));
    }
    let mut patch = SchedulePatch::default();
    match field {
        ScheduleField::Subject => patch.subject = Some(validate_text(input, 1, MAX_SUBJECT_LEN)?),
        ScheduleField::Time => patch.time = Some(validate_time(input)?),
        ScheduleField::Room => {
            patch.room = Some(if skipped { None } else { validate_room(input)? })
        }
    }
    Ok(patch)
}

fn note_patch(field: NoteField, input: &str, skipped: bool) -> Validation<NotePatch> {
    if skipped && !field.optional() {
        return Err(required(field.key()));
    }
    let mut patch = NotePatch::default();
    match field {
        NoteField::Title => patch.title = Some(validate_text(input, 1, MAX_TITLE_LEN)?),
        NoteField::Content => {
            patch.content = Some(if skipped {
                String::new()
            } else {
                validate_text(input, 1, MAX_CONTENT_LEN)?
            })
        }
    }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn feed(mut state: FormState, inputs: &[&str]) -> Transition {
        let (last, rest) = inputs.split_last().unwrap();
        for input in rest {
            state = match state.advance(input, today()) {
                Transition::Advance(next) => next,
                other => panic!("unexpected transition on {input:?}: {other:?}"),
            };
        }
        state.advance(last, today())
    }

    #[test]
    fn test_homework_flow_with_skipped_deadline() {
        let result = feed(FormState::homework(), &["Math", "Read ch.1", "/skip"]);
        assert_eq!(
            result,
            Transition::Complete(Submission::Homework(NewHomework {
                subject: "Math".into(),
                task: "Read ch.1".into(),
                deadline: None,
            }))
        );
    }

    #[test]
    fn test_homework_flow_with_deadline() {
        let result = feed(FormState::homework(), &["Math", "Read ch.1", "10.01.30"]);
        let Transition::Complete(Submission::Homework(hw)) = result else {
            panic!("expected completion");
        };
        assert_eq!(hw.deadline, NaiveDate::from_ymd_opt(2030, 1, 10));
    }

    #[test]
    fn test_empty_subject_keeps_state() {
        match FormState::homework().advance("", today()) {
            Transition::Rejected(state, reason) => {
                assert_eq!(state, FormState::homework());
                assert_eq!(reason.reason(), "Text cannot be empty");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_required_fields_cannot_be_skipped() {
        assert!(matches!(
            FormState::homework().advance(SKIP_TOKEN, today()),
            Transition::Rejected(FormState::Homework(HomeworkCreation::Subject), _)
        ));
        assert!(matches!(
            FormState::ReminderTime.advance(SKIP_TOKEN, today()),
            Transition::Rejected(FormState::ReminderTime, _)
        ));
    }

    #[test]
    fn test_past_deadline_rejected_at_deadline_step() {
        match feed(FormState::homework(), &["Math", "Read", "06.01.2030"]) {
            Transition::Rejected(FormState::Homework(HomeworkCreation::Deadline { subject, task }), _) => {
                assert_eq!(subject, "Math");
                assert_eq!(task, "Read");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_flow() {
        let result = feed(FormState::schedule(), &["Tuesday", "Physics", "9:30", "B-204"]);
        assert_eq!(
            result,
            Transition::Complete(Submission::Schedule(NewScheduleEntry {
                slot: ScheduleSlot::Weekly(Weekday::Tue),
                subject: "Physics".into(),
                time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                room: Some("B-204".into()),
            }))
        );

        let dated = feed(FormState::schedule(), &["15.01.30", "Exam", "10:00", "/skip"]);
        let Transition::Complete(Submission::Schedule(entry)) = dated else {
            panic!("expected completion");
        };
        assert_eq!(
            entry.slot,
            ScheduleSlot::Dated(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap())
        );
        assert_eq!(entry.room, None);
    }

    #[test]
    fn test_schedule_rejects_bad_time_and_long_room() {
        assert!(matches!(
            feed(FormState::schedule_on(Weekday::Mon), &["Math", "25:00"]),
            Transition::Rejected(FormState::Schedule(ScheduleCreation::Time { .. }), _)
        ));
        let long_room = "R".repeat(21);
        assert!(matches!(
            feed(FormState::schedule_on(Weekday::Mon), &["Math", "10:00", &long_room]),
            Transition::Rejected(FormState::Schedule(ScheduleCreation::Room { .. }), _)
        ));
    }

    #[test]
    fn test_note_content_optional() {
        let result = feed(FormState::note(), &["Ideas", "/skip"]);
        assert_eq!(
            result,
            Transition::Complete(Submission::Note(NewNote {
                title: "Ideas".into(),
                content: String::new(),
            }))
        );
    }

    #[test]
    fn test_edit_flow_picks_field_then_value() {
        let state = FormState::EditHomework(Edit::new(7));
        let result = feed(state, &["Deadline", "/skip"]);
        assert_eq!(
            result,
            Transition::Complete(Submission::HomeworkUpdate {
                id: 7,
                patch: HomeworkPatch {
                    deadline: Some(None),
                    ..HomeworkPatch::default()
                },
            })
        );
    }

    #[test]
    fn test_edit_rejects_unknown_field_and_skipping_required() {
        let state = FormState::EditSchedule(Edit::new(3));
        assert!(matches!(
            state.clone().advance("building", today()),
            Transition::Rejected(FormState::EditSchedule(Edit { step: EditStep::AwaitingField, .. }), _)
        ));

        let subject = FormState::EditSchedule(Edit::with_field(3, ScheduleField::Subject));
        assert!(matches!(
            subject.advance(SKIP_TOKEN, today()),
            Transition::Rejected(_, _)
        ));

        let room = FormState::EditSchedule(Edit::with_field(3, ScheduleField::Room));
        assert_eq!(
            room.advance(SKIP_TOKEN, today()),
            Transition::Complete(Submission::ScheduleUpdate {
                id: 3,
                patch: SchedulePatch {
                    room: Some(None),
                    ..SchedulePatch::default()
                },
            })
        );
    }

    #[test]
    fn test_single_step_queries() {
        assert_eq!(
            FormState::ReminderTime.advance("07:15", today()),
            Transition::Complete(Submission::ReminderTime(
                NaiveTime::from_hms_opt(7, 15, 0).unwrap()
            ))
        );
        assert_eq!(
            FormState::NoteSearch.advance("  physics ", today()),
            Transition::Complete(Submission::NoteSearch("physics".into()))
        );
    }

    #[test]
    fn test_prompts_mention_skip_only_on_optional_steps() {
        assert!(!FormState::homework().prompt().contains(SKIP_TOKEN));
        let deadline = FormState::Homework(HomeworkCreation::Deadline {
            subject: "Math".into(),
            task: "Read".into(),
        });
        assert!(deadline.prompt().contains(SKIP_TOKEN));
        assert!(FormState::EditNote(Edit::new(1)).prompt().contains("Title"));
    }
}
