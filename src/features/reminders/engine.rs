//! Reminder derivation
//!
//! Turns schedule and homework records into one-shot jobs, keeps a daily
//! job per owner that re-runs the derivation, and reconciles pending jobs
//! against the current data.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::scheduler::{JobAction, JobFuture, JobInfo, JobScheduler, Trigger};
use crate::database::{HomeworkEntry, HomeworkFilter, ScheduleEntry, ScheduleFilter, SharedStore};

/// Minutes before the first class of the day
pub const CLASS_LEAD_MINUTES: i64 = 30;
/// Homework reminders go out at this hour on the day before the deadline
pub const HOMEWORK_REMINDER_HOUR: u32 = 9;

/// Delivery capability used as the job payload
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, owner: &str, text: &str) -> Result<()>;
}

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Class,
    Homework,
    Daily,
}

impl ReminderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ReminderKind::Class => "class",
            ReminderKind::Homework => "homework",
            ReminderKind::Daily => "daily",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReminder {
    pub kind: ReminderKind,
    pub fire_at: NaiveDateTime,
    pub text: String,
}

/// Deterministic id for a one-shot reminder
pub fn job_id(kind: ReminderKind, owner: &str, at: NaiveDateTime) -> String {
    format!("{}_{}_{}", kind.tag(), owner, at.format("%Y%m%d%H%M"))
}

pub fn daily_job_id(owner: &str) -> String {
    format!("{}_{}", ReminderKind::Daily.tag(), owner)
}

fn owns_kind(job: &JobInfo, owner: &str, kind: ReminderKind) -> bool {
    job.owner == owner && job.id.starts_with(&format!("{}_{}_", kind.tag(), owner))
}

/// Wrap reminder text the way it is delivered
pub fn delivery_text(text: &str) -> String {
    format!("⏰ **Reminder**\n\n{text}")
}

/// Reminder for the earliest class taking place on `now`'s date
pub fn plan_class_reminder(entries: &[ScheduleEntry], now: NaiveDateTime) -> Option<PlannedReminder> {
    let today = now.date();
    let first = entries
        .iter()
        .filter(|entry| entry.slot.occurs_on(today))
        .min_by_key(|entry| (entry.time, entry.id))?;

    let fire_at = today.and_time(first.time) - Duration::minutes(CLASS_LEAD_MINUTES);
    if fire_at <= now {
        return None;
    }
    Some(PlannedReminder {
        kind: ReminderKind::Class,
        fire_at,
        text: format!(
            "{} in {} minutes at {}",
            first.subject,
            CLASS_LEAD_MINUTES,
            first.time.format("%H:%M")
        ),
    })
}

/// Deadline reminders, one per instant. Items due on the same day share
/// one reminder with a line each.
pub fn plan_homework_reminders(entries: &[HomeworkEntry], now: NaiveDateTime) -> Vec<PlannedReminder> {
    let today = now.date();
    let mut by_instant: BTreeMap<NaiveDateTime, Vec<String>> = BTreeMap::new();

    for entry in entries.iter().filter(|e| !e.completed) {
        let Some(deadline) = entry.deadline else {
            continue;
        };
        if deadline < today {
            continue;
        }
        let Some(fire_at) = (deadline - Duration::days(1)).and_hms_opt(HOMEWORK_REMINDER_HOUR, 0, 0)
        else {
            continue;
        };
        if fire_at <= now {
            continue;
        }
        by_instant
            .entry(fire_at)
            .or_default()
            .push(format!("{} deadline tomorrow: {}", entry.subject, entry.task));
    }

    by_instant
        .into_iter()
        .map(|(fire_at, lines)| PlannedReminder {
            kind: ReminderKind::Homework,
            fire_at,
            text: lines.join("\n"),
        })
        .collect()
}

async fn deliver_logged(notifier: &dyn Notifier, owner: &str, text: &str) {
    match notifier.deliver(owner, text).await {
        Ok(()) => debug!("Delivered reminder to {}", owner),
        Err(e) => error!("Failed to deliver reminder to {}: {}", owner, e),
    }
}

#[derive(Clone)]
pub struct ReminderEngine {
    store: SharedStore,
    scheduler: JobScheduler,
    notifier: SharedNotifier,
    default_reminder_time: NaiveTime,
}

impl ReminderEngine {
    pub fn new(
        store: SharedStore,
        scheduler: JobScheduler,
        notifier: SharedNotifier,
        default_reminder_time: NaiveTime,
    ) -> Self {
        Self {
            store,
            scheduler,
            notifier,
            default_reminder_time,
        }
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn default_reminder_time(&self) -> NaiveTime {
        self.default_reminder_time
    }

    /// Pending jobs of one owner, soonest first
    pub fn pending(&self, owner: &str) -> Vec<JobInfo> {
        self.scheduler.jobs_for(owner)
    }

    pub async fn setup_schedule_reminders(&self, owner: &str, reminder_time: NaiveTime) -> Result<usize> {
        self.setup_schedule_reminders_at(owner, reminder_time, Local::now().naive_local())
            .await
    }

    /// Derive today's class reminder and make sure the daily job exists
    pub async fn setup_schedule_reminders_at(
        &self,
        owner: &str,
        reminder_time: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<usize> {
        let entries = self
            .store
            .list_schedule(owner, ScheduleFilter::On(now.date()))
            .await?;
        let planned: Vec<_> = plan_class_reminder(&entries, now).into_iter().collect();
        let registered = self.apply(owner, ReminderKind::Class, planned);
        self.register_daily(owner, reminder_time);
        Ok(registered)
    }

    pub async fn setup_homework_reminders(&self, owner: &str) -> Result<usize> {
        self.setup_homework_reminders_at(owner, Local::now().naive_local())
            .await
    }

    pub async fn setup_homework_reminders_at(&self, owner: &str, now: NaiveDateTime) -> Result<usize> {
        let entries = self
            .store
            .list_homework(owner, &HomeworkFilter::pending())
            .await?;
        let planned = plan_homework_reminders(&entries, now);
        Ok(self.apply(owner, ReminderKind::Homework, planned))
    }

    /// Replace the owner's pending jobs of `kind` with `planned`
    fn apply(&self, owner: &str, kind: ReminderKind, planned: Vec<PlannedReminder>) -> usize {
        let wanted: HashSet<String> = planned
            .iter()
            .map(|p| job_id(kind, owner, p.fire_at))
            .collect();
        let stale = self
            .scheduler
            .cancel_where(|job| owns_kind(job, owner, kind) && !wanted.contains(&job.id));
        if stale > 0 {
            debug!("Dropped {} stale {} reminders for {}", stale, kind.tag(), owner);
        }

        let mut registered = 0;
        for reminder in planned {
            if self.schedule_delivery(owner, reminder) {
                registered += 1;
            }
        }
        registered
    }

    fn schedule_delivery(&self, owner: &str, reminder: PlannedReminder) -> bool {
        let id = job_id(reminder.kind, owner, reminder.fire_at);
        let notifier = self.notifier.clone();
        let recipient = owner.to_string();
        let text = delivery_text(&reminder.text);

        let action: JobAction = Arc::new(move || -> JobFuture {
            let notifier = notifier.clone();
            let recipient = recipient.clone();
            let text = text.clone();
            Box::pin(async move { deliver_logged(notifier.as_ref(), &recipient, &text).await })
        });

        let scheduled =
            self.scheduler
                .schedule_once(id.clone(), owner, reminder.fire_at, reminder.text, action);
        if !scheduled {
            warn!("Could not schedule reminder {}", id);
        }
        scheduled
    }

    /// Ensure the owner's daily re-derivation job runs at `reminder_time`.
    /// Returns `false` when an identical job was already pending.
    pub fn register_daily(&self, owner: &str, reminder_time: NaiveTime) -> bool {
        let id = daily_job_id(owner);
        let trigger = Trigger::Daily(reminder_time);
        if self.scheduler.trigger_of(&id) == Some(trigger) {
            return false;
        }

        let engine = self.clone();
        let target = owner.to_string();
        let action: JobAction = Arc::new(move || -> JobFuture {
            let engine = engine.clone();
            let target = target.clone();
            // refresh re-registers this very job, so it runs outside of it
            Box::pin(async move {
                let scheduler = engine.scheduler.clone();
                scheduler.spawn_task(async move { engine.refresh(&target).await });
            })
        });

        self.scheduler.schedule_daily(
            id,
            owner,
            reminder_time,
            format!("Daily reminder check at {}", reminder_time.format("%H:%M")),
            action,
        )
    }

    /// Re-derive every reminder for one owner. Each derivation fails alone.
    pub async fn refresh(&self, owner: &str) {
        let reminder_time = match self
            .store
            .get_or_create_settings(owner, self.default_reminder_time)
            .await
        {
            Ok(settings) => settings.reminder_time,
            Err(e) => {
                error!("Failed to load settings for {}: {}", owner, e);
                self.default_reminder_time
            }
        };

        if let Err(e) = self.setup_schedule_reminders(owner, reminder_time).await {
            error!("Failed to derive class reminders for {}: {}", owner, e);
        }
        if let Err(e) = self.setup_homework_reminders(owner).await {
            error!("Failed to derive homework reminders for {}: {}", owner, e);
        }
    }

    /// Recreate reminders for every known owner after a restart
    pub async fn restore_all(&self) -> Result<usize> {
        let settings = self.store.list_settings().await?;
        for entry in &settings {
            self.refresh(&entry.owner).await;
        }
        info!("Restored reminders for {} users", settings.len());
        Ok(settings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewHomework, NewScheduleEntry, ScheduleSlot, SqliteStore};
    use anyhow::anyhow;
    use chrono::{NaiveDate, Weekday};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, owner: &str, text: &str) -> Result<()> {
            self.sent.lock().await.push((owner.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Takes its time and cannot reach `unreachable`
    struct SlowNotifier {
        sent: Mutex<Vec<String>>,
        delay_millis: u64,
        unreachable: &'static str,
    }

    impl SlowNotifier {
        fn new(delay_millis: u64, unreachable: &'static str) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                delay_millis,
                unreachable,
            })
        }
    }

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn deliver(&self, owner: &str, _text: &str) -> Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_millis)).await;
            if owner == self.unreachable {
                return Err(anyhow!("cannot message {owner}"));
            }
            self.sent.lock().await.push(owner.to_string());
            Ok(())
        }
    }

    fn soon(kind: ReminderKind, millis: i64) -> PlannedReminder {
        PlannedReminder {
            kind,
            fire_at: Local::now().naive_local() + Duration::milliseconds(millis),
            text: "Math deadline tomorrow: read".into(),
        }
    }

    // 2030-01-07 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    fn engine() -> (ReminderEngine, SharedStore) {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier: SharedNotifier = Arc::new(RecordingNotifier::default());
        let engine = ReminderEngine::new(store.clone(), JobScheduler::new(), notifier, eight());
        (engine, store)
    }

    async fn add_class(store: &SharedStore, owner: &str, subject: &str, h: u32, m: u32) {
        store
            .add_schedule(
                owner,
                &NewScheduleEntry {
                    slot: ScheduleSlot::Weekly(Weekday::Mon),
                    subject: subject.into(),
                    time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
                    room: None,
                },
            )
            .await
            .unwrap();
    }

    async fn add_homework(store: &SharedStore, owner: &str, subject: &str, deadline: NaiveDate) -> i64 {
        store
            .add_homework(
                owner,
                &NewHomework {
                    subject: subject.into(),
                    task: format!("{subject} exercises"),
                    deadline: Some(deadline),
                },
            )
            .await
            .unwrap()
    }

    fn entry(id: i64, subject: &str, h: u32, m: u32) -> ScheduleEntry {
        ScheduleEntry {
            id,
            owner: "alice".into(),
            slot: ScheduleSlot::Weekly(Weekday::Mon),
            subject: subject.into(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            room: None,
            created_at: at(monday(), 0, 0),
        }
    }

    #[test]
    fn test_class_reminder_picks_earliest_class() {
        let entries = vec![entry(1, "Physics", 11, 0), entry(2, "Math", 9, 0)];
        let planned = plan_class_reminder(&entries, at(monday(), 8, 0)).unwrap();
        assert_eq!(planned.fire_at, at(monday(), 8, 30));
        assert_eq!(planned.text, "Math in 30 minutes at 09:00");
    }

    #[test]
    fn test_class_reminder_skips_passed_and_other_days() {
        let entries = vec![entry(1, "Math", 9, 0)];
        assert!(plan_class_reminder(&entries, at(monday(), 8, 35)).is_none());
        assert!(plan_class_reminder(&entries, at(monday(), 8, 30)).is_none());

        let tuesday = monday().succ_opt().unwrap();
        assert!(plan_class_reminder(&entries, at(tuesday, 7, 0)).is_none());
        assert!(plan_class_reminder(&[], at(monday(), 7, 0)).is_none());
    }

    #[test]
    fn test_homework_reminders_merge_same_day() {
        let today = monday();
        let make = |id: i64, subject: &str, deadline: Option<NaiveDate>, completed: bool| HomeworkEntry {
            id,
            owner: "alice".into(),
            subject: subject.into(),
            task: "read".into(),
            deadline,
            completed,
            created_at: at(today, 0, 0),
        };
        let due = today + Duration::days(2);
        let entries = vec![
            make(1, "Math", Some(due), false),
            make(2, "History", Some(due), false),
            make(3, "Art", Some(due), true),
            make(4, "Music", None, false),
            make(5, "Biology", Some(today + Duration::days(5)), false),
        ];

        let planned = plan_homework_reminders(&entries, at(today, 12, 0));
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].fire_at, at(today + Duration::days(1), 9, 0));
        assert_eq!(
            planned[0].text,
            "Math deadline tomorrow: read\nHistory deadline tomorrow: read"
        );
        assert_eq!(planned[1].fire_at, at(today + Duration::days(4), 9, 0));
    }

    #[tokio::test]
    async fn test_class_job_registered_at_lead_time() {
        let (engine, store) = engine();
        add_class(&store, "alice", "Math", 9, 0).await;

        let count = engine
            .setup_schedule_reminders_at("alice", eight(), at(monday(), 8, 0))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let id = job_id(ReminderKind::Class, "alice", at(monday(), 8, 30));
        assert_eq!(
            engine.scheduler().trigger_of(&id),
            Some(Trigger::Once(at(monday(), 8, 30)))
        );
        assert!(engine.scheduler().contains(&daily_job_id("alice")));
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_no_class_job_after_lead_time() {
        let (engine, store) = engine();
        add_class(&store, "alice", "Math", 9, 0).await;

        let count = engine
            .setup_schedule_reminders_at("alice", eight(), at(monday(), 8, 35))
            .await
            .unwrap();
        assert_eq!(count, 0);
        // only the daily job remains
        assert_eq!(engine.pending("alice").len(), 1);
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_homework_job_day_before_deadline() {
        let (engine, store) = engine();
        let today = monday();
        add_homework(&store, "alice", "Math", today + Duration::days(2)).await;
        add_homework(&store, "alice", "History", today).await;

        let count = engine
            .setup_homework_reminders_at("alice", at(today, 10, 0))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let id = job_id(ReminderKind::Homework, "alice", at(today + Duration::days(1), 9, 0));
        assert!(engine.scheduler().contains(&id));
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_homework_derivation_is_idempotent() {
        let (engine, store) = engine();
        let today = monday();
        add_homework(&store, "alice", "Math", today + Duration::days(2)).await;
        add_homework(&store, "alice", "History", today + Duration::days(3)).await;

        engine.setup_homework_reminders_at("alice", at(today, 10, 0)).await.unwrap();
        let after_first = engine.scheduler().len();
        engine.setup_homework_reminders_at("alice", at(today, 10, 0)).await.unwrap();
        assert_eq!(engine.scheduler().len(), after_first);
        assert_eq!(after_first, 2);
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_deleted_homework_loses_its_reminder() {
        let (engine, store) = engine();
        let today = monday();
        let id = add_homework(&store, "alice", "Math", today + Duration::days(2)).await;
        add_homework(&store, "bob", "Math", today + Duration::days(2)).await;

        engine.setup_homework_reminders_at("alice", at(today, 10, 0)).await.unwrap();
        engine.setup_homework_reminders_at("bob", at(today, 10, 0)).await.unwrap();
        assert_eq!(engine.scheduler().len(), 2);

        store.delete_homework("alice", id).await.unwrap();
        engine.setup_homework_reminders_at("alice", at(today, 10, 0)).await.unwrap();

        assert!(engine.pending("alice").is_empty());
        assert_eq!(engine.pending("bob").len(), 1);
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_register_daily_keeps_existing_job() {
        let (engine, _store) = engine();
        assert!(engine.register_daily("alice", eight()));
        assert!(!engine.register_daily("alice", eight()));

        let seven = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        assert!(engine.register_daily("alice", seven));
        assert_eq!(engine.scheduler().len(), 1);
        assert_eq!(
            engine.scheduler().trigger_of(&daily_job_id("alice")),
            Some(Trigger::Daily(seven))
        );
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_restore_registers_daily_job_per_user() {
        let (engine, store) = engine();
        store.get_or_create_settings("alice", eight()).await.unwrap();
        store.get_or_create_settings("bob", eight()).await.unwrap();

        assert_eq!(engine.restore_all().await.unwrap(), 2);
        assert!(engine.scheduler().contains(&daily_job_id("alice")));
        assert!(engine.scheduler().contains(&daily_job_id("bob")));
        engine.scheduler().shutdown();
    }

    #[tokio::test]
    async fn test_delivery_reaches_notifier() {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ReminderEngine::new(store, JobScheduler::new(), notifier.clone(), eight());

        let fire_at = Local::now().naive_local() + Duration::milliseconds(50);
        assert!(engine.schedule_delivery(
            "alice",
            PlannedReminder {
                kind: ReminderKind::Homework,
                fire_at,
                text: "Math deadline tomorrow: read".into(),
            },
        ));

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice");
        assert!(sent[0].1.ends_with("Math deadline tomorrow: read"));
    }

    #[tokio::test]
    async fn test_rederiving_does_not_cut_off_delivery() {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = SlowNotifier::new(300, "nobody");
        let engine = ReminderEngine::new(store, JobScheduler::new(), notifier.clone(), eight());

        assert!(engine.schedule_delivery("alice", soon(ReminderKind::Homework, 100)));

        // The homework was completed while its reminder is being sent
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(engine.setup_homework_reminders("alice").await.unwrap(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(*notifier.sent.lock().await, vec!["alice".to_string()]);
        assert!(engine.scheduler().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_affect_others() {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = SlowNotifier::new(0, "bob");
        let engine = ReminderEngine::new(store, JobScheduler::new(), notifier.clone(), eight());

        assert!(engine.schedule_delivery("bob", soon(ReminderKind::Homework, 50)));
        assert!(engine.schedule_delivery("alice", soon(ReminderKind::Homework, 100)));
        assert!(engine.schedule_delivery("bob", soon(ReminderKind::Class, 150)));

        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(*notifier.sent.lock().await, vec!["alice".to_string()]);
        assert!(engine.scheduler().is_empty());
        assert!(engine.scheduler().is_running());
    }

    #[tokio::test]
    async fn test_daily_job_refreshes_in_background() {
        let (engine, store) = engine();
        let deadline = Local::now().date_naive() + Duration::days(2);
        add_homework(&store, "alice", "Math", deadline).await;

        let fire = (Local::now().naive_local() + Duration::milliseconds(100)).time();
        assert!(engine.register_daily("alice", fire));
        assert!(engine.pending("alice").iter().all(|job| job.id == daily_job_id("alice")));

        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let reminder = job_id(
            ReminderKind::Homework,
            "alice",
            at(deadline - Duration::days(1), HOMEWORK_REMINDER_HOUR, 0),
        );
        assert!(engine.scheduler().contains(&reminder));
        // the refresh moved the daily job to the stored reminder time
        assert_eq!(
            engine.scheduler().trigger_of(&daily_job_id("alice")),
            Some(Trigger::Daily(eight()))
        );
        engine.scheduler().shutdown();
    }
}
