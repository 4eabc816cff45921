//! Active forms per conversation
//!
//! The registry owns the [`FormState`] slot of every conversation, feeds it
//! one turn at a time and commits completed forms to the store.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use chrono::{Local, NaiveDate};
use dashmap::DashMap;
use log::{debug, error, info};
use std::fmt::Display;
use std::sync::Arc;

use super::state::{FormState, Submission, Transition};
use crate::core::format::{render_homework_list, render_search_results, weekday_name};
use crate::database::{HomeworkFilter, ScheduleSlot, SettingsPatch, SharedStore};
use crate::features::reminders::ReminderEngine;

const GENERIC_FAILURE: &str = "❌ Something went wrong while saving. Please try again.";

/// Key of one conversation slot
pub fn conversation_key(channel: impl Display, owner: &str) -> String {
    format!("{channel}:{owner}")
}

/// What the surface should say after a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormReply {
    /// Next step
    Prompt(String),
    /// Input rejected, same step again
    Retry { reason: String, prompt: String },
    /// Form committed; the state is gone
    Done(String),
    /// Commit failed; the state is gone
    Failed(String),
    /// No form is active for this conversation
    Idle,
}

impl FormReply {
    pub fn text(&self) -> Option<String> {
        match self {
            FormReply::Prompt(text) | FormReply::Done(text) | FormReply::Failed(text) => {
                Some(text.clone())
            }
            FormReply::Retry { reason, prompt } => Some(format!("❌ {reason}\n\n{prompt}")),
            FormReply::Idle => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, FormReply::Done(_) | FormReply::Failed(_))
    }
}

#[derive(Clone)]
pub struct FormRegistry {
    states: Arc<DashMap<String, FormState>>,
    store: SharedStore,
    reminders: ReminderEngine,
}

impl FormRegistry {
    pub fn new(store: SharedStore, reminders: ReminderEngine) -> Self {
        Self {
            states: Arc::new(DashMap::new()),
            store,
            reminders,
        }
    }

    /// Start a form, replacing whatever the conversation had in progress.
    /// Returns the first prompt.
    pub fn begin(&self, conversation: &str, state: FormState) -> String {
        let prompt = state.prompt();
        if self.states.insert(conversation.to_string(), state).is_some() {
            debug!("Replaced active form in {}", conversation);
        }
        prompt
    }

    /// Drop the conversation's form, discarding partial input
    pub fn cancel(&self, conversation: &str) -> bool {
        self.states.remove(conversation).is_some()
    }

    pub fn is_active(&self, conversation: &str) -> bool {
        self.states.contains_key(conversation)
    }

    pub fn current(&self, conversation: &str) -> Option<FormState> {
        self.states.get(conversation).map(|state| state.clone())
    }

    pub async fn submit(&self, conversation: &str, owner: &str, input: &str) -> FormReply {
        self.submit_on(conversation, owner, input, Local::now().date_naive())
            .await
    }

    /// Feed one turn, with `today` bounding deadline dates
    pub async fn submit_on(
        &self,
        conversation: &str,
        owner: &str,
        input: &str,
        today: NaiveDate,
    ) -> FormReply {
        let Some((_, state)) = self.states.remove(conversation) else {
            return FormReply::Idle;
        };

        match state.advance(input, today) {
            Transition::Advance(next) => {
                let prompt = next.prompt();
                self.states.insert(conversation.to_string(), next);
                FormReply::Prompt(prompt)
            }
            Transition::Rejected(same, reason) => {
                let prompt = same.prompt();
                self.states.insert(conversation.to_string(), same);
                FormReply::Retry {
                    reason: reason.to_string(),
                    prompt,
                }
            }
            Transition::Complete(submission) => match self.commit(owner, submission).await {
                Ok(text) => FormReply::Done(text),
                Err(e) => {
                    error!("Failed to commit form for {}: {:#}", owner, e);
                    FormReply::Failed(GENERIC_FAILURE.to_string())
                }
            },
        }
    }

    async fn commit(&self, owner: &str, submission: Submission) -> Result<String> {
        match submission {
            Submission::Homework(entry) => {
                let id = self.store.add_homework(owner, &entry).await?;
                info!("Added homework {} for {}", id, owner);
                self.rederive_homework(owner).await;
                Ok(format!("✅ Homework added: {} - {}", entry.subject, entry.task))
            }
            Submission::Schedule(entry) => {
                let id = self.store.add_schedule(owner, &entry).await?;
                info!("Added schedule entry {} for {}", id, owner);
                self.reminders.refresh(owner).await;
                let day = match entry.slot {
                    ScheduleSlot::Weekly(day) => weekday_name(day).to_string(),
                    ScheduleSlot::Dated(date) => date.format("%d.%m.%Y").to_string(),
                };
                Ok(format!(
                    "✅ Class added: {} on {} at {}",
                    entry.subject,
                    day,
                    entry.time.format("%H:%M")
                ))
            }
            Submission::Note(note) => {
                let id = self.store.add_note(owner, &note).await?;
                info!("Added note {} for {}", id, owner);
                Ok(format!("✅ Note saved: {}", note.title))
            }
            Submission::HomeworkUpdate { id, patch } => {
                if !self.store.update_homework(owner, id, &patch).await? {
                    return Ok("❌ Homework item not found".to_string());
                }
                self.rederive_homework(owner).await;
                Ok("✅ Homework updated".to_string())
            }
            Submission::ScheduleUpdate { id, patch } => {
                if !self.store.update_schedule(owner, id, &patch).await? {
                    return Ok("❌ Class not found".to_string());
                }
                self.reminders.refresh(owner).await;
                Ok("✅ Class updated".to_string())
            }
            Submission::NoteUpdate { id, patch } => {
                if !self.store.update_note(owner, id, &patch).await? {
                    return Ok("❌ Note not found".to_string());
                }
                Ok("✅ Note updated".to_string())
            }
            Submission::ReminderTime(time) => {
                self.store
                    .get_or_create_settings(owner, self.reminders.default_reminder_time())
                    .await?;
                let patch = SettingsPatch {
                    reminder_time: Some(time),
                    ..SettingsPatch::default()
                };
                self.store.update_settings(owner, &patch).await?;
                self.reminders.register_daily(owner, time);
                Ok(format!("✅ Daily reminders set for {}", time.format("%H:%M")))
            }
            Submission::NoteSearch(query) => {
                let notes = self.store.search_notes(owner, &query).await?;
                Ok(render_search_results(&query, &notes))
            }
            Submission::HomeworkBySubject(subject) => {
                let items = self
                    .store
                    .list_homework(owner, &HomeworkFilter::for_subject(subject.clone()))
                    .await?;
                Ok(render_homework_list(&format!("Homework: {subject}"), &items))
            }
        }
    }

    async fn rederive_homework(&self, owner: &str) {
        if let Err(e) = self.reminders.setup_homework_reminders(owner).await {
            error!("Failed to derive homework reminders for {}: {}", owner, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DomainStore, HomeworkFilter, NewNote, SqliteStore};
    use crate::features::forms::state::{Edit, HomeworkField};
    use crate::features::reminders::{JobScheduler, Notifier, SharedNotifier};
    use async_trait::async_trait;
    use chrono::NaiveTime;

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn deliver(&self, _owner: &str, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn registry() -> (FormRegistry, SharedStore) {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier: SharedNotifier = Arc::new(SilentNotifier);
        let engine = ReminderEngine::new(
            store.clone(),
            JobScheduler::new(),
            notifier,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        );
        (FormRegistry::new(store.clone(), engine), store)
    }

    #[tokio::test]
    async fn test_homework_form_commits_and_clears() {
        let (forms, store) = registry();
        let key = conversation_key(1, "alice");
        forms.begin(&key, FormState::homework());

        assert!(matches!(
            forms.submit_on(&key, "alice", "Math", today()).await,
            FormReply::Prompt(_)
        ));
        forms.submit_on(&key, "alice", "Read ch.1", today()).await;
        let reply = forms.submit_on(&key, "alice", "/skip", today()).await;

        assert!(matches!(reply, FormReply::Done(_)));
        assert!(!forms.is_active(&key));

        let items = store.list_homework("alice", &HomeworkFilter::everything()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subject, "Math");
        assert_eq!(items[0].task, "Read ch.1");
        assert_eq!(items[0].deadline, None);
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts() {
        let (forms, store) = registry();
        let key = conversation_key(1, "alice");
        forms.begin(&key, FormState::homework());

        let reply = forms.submit_on(&key, "alice", "", today()).await;
        match reply {
            FormReply::Retry { prompt, .. } => assert_eq!(prompt, FormState::homework().prompt()),
            other => panic!("expected retry, got {other:?}"),
        }
        assert_eq!(forms.current(&key), Some(FormState::homework()));
        assert!(store.list_homework("alice", &HomeworkFilter::everything()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_discards_partial_input() {
        let (forms, store) = registry();
        let key = conversation_key(1, "alice");
        forms.begin(&key, FormState::homework());
        forms.submit_on(&key, "alice", "Math", today()).await;

        assert!(forms.cancel(&key));
        assert!(!forms.cancel(&key));
        assert_eq!(forms.submit_on(&key, "alice", "Read", today()).await, FormReply::Idle);
        assert!(store.list_homework("alice", &HomeworkFilter::everything()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_cannot_touch_other_owner() {
        let (forms, store) = registry();
        let id = store
            .add_note(
                "alice",
                &NewNote {
                    title: "Mine".into(),
                    content: String::new(),
                },
            )
            .await
            .unwrap();
        let hw = store
            .add_homework(
                "alice",
                &crate::database::NewHomework {
                    subject: "Math".into(),
                    task: "Read".into(),
                    deadline: None,
                },
            )
            .await
            .unwrap();

        let key = conversation_key(2, "mallory");
        forms.begin(&key, FormState::EditHomework(Edit::with_field(hw, HomeworkField::Subject)));
        let reply = forms.submit_on(&key, "mallory", "Hacked", today()).await;
        assert_eq!(reply, FormReply::Done("❌ Homework item not found".into()));

        let note = store.get_note("alice", id).await.unwrap().unwrap();
        assert_eq!(note.title, "Mine");
        let item = store.get_homework("alice", hw).await.unwrap().unwrap();
        assert_eq!(item.subject, "Math");
    }

    #[tokio::test]
    async fn test_reminder_time_updates_settings_and_daily_job() {
        let (forms, store) = registry();
        let key = conversation_key(1, "alice");
        forms.begin(&key, FormState::ReminderTime);
        let reply = forms.submit_on(&key, "alice", "07:30", today()).await;
        assert!(reply.is_finished());

        let seven_thirty = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
        let settings = store
            .get_or_create_settings("alice", NaiveTime::from_hms_opt(8, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(settings.reminder_time, seven_thirty);
        assert_eq!(
            forms.reminders.scheduler().trigger_of("daily_alice"),
            Some(crate::features::reminders::Trigger::Daily(seven_thirty))
        );
        forms.reminders.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_note_search_renders_results() {
        let (forms, store) = registry();
        store
            .add_note(
                "alice",
                &NewNote {
                    title: "Physics".into(),
                    content: "Newton laws".into(),
                },
            )
            .await
            .unwrap();

        let key = conversation_key(1, "alice");
        forms.begin(&key, FormState::NoteSearch);
        match forms.submit_on(&key, "alice", "NEWTON", today()).await {
            FormReply::Done(text) => assert!(text.contains("Physics")),
            other => panic!("expected results, got {other:?}"),
        }
    }
}
