//! In-process job scheduler
//!
//! Jobs are tokio tasks keyed by id. Registering an id that is already
//! pending aborts the old task and takes its place, so deriving the same
//! reminders twice never produces duplicates.
//!
//! A one-shot job leaves the table the moment it fires. From then on only
//! [`JobScheduler::shutdown`] can stop it, so replacing or cancelling
//! reminders never cuts a delivery in half. Background work started by a
//! job goes through [`JobScheduler::spawn_task`] for the same reason.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Firing one-shot jobs are claimed before delivery; tracked background tasks
//! - 1.0.0: Initial release

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Longest single sleep; keeps long waits honest against wall-clock changes
const MAX_SLEEP: std::time::Duration = std::time::Duration::from_secs(3600);

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type JobAction = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// When a job fires, in local wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Once(NaiveDateTime),
    Daily(NaiveTime),
}

impl Trigger {
    /// Next firing strictly after `now`, if any
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Trigger::Once(at) => (at > now).then_some(at),
            Trigger::Daily(time) => {
                let today = now.date().and_time(time);
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: String,
    pub owner: String,
    pub trigger: Trigger,
    pub description: String,
}

impl JobInfo {
    /// Next fire time as seen from `now`. A one-shot job that is firing
    /// right now reports its own instant.
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self.trigger {
            Trigger::Once(at) => at,
            Trigger::Daily(_) => self.trigger.next_after(now).unwrap_or(now),
        }
    }

    /// A one-shot job whose instant has arrived
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        matches!(self.trigger, Trigger::Once(at) if at <= now)
    }
}

struct ScheduledJob {
    info: JobInfo,
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    jobs: DashMap<String, ScheduledJob>,
    /// Firing one-shot jobs and background tasks, keyed by generation
    tasks: DashMap<u64, JoinHandle<()>>,
    next_generation: AtomicU64,
    running: AtomicBool,
}

impl Inner {
    /// Move a due one-shot job out of the table and into the task list.
    /// Returns `false` if it was replaced or cancelled first, or the
    /// scheduler has stopped.
    fn claim(&self, id: &str, generation: u64) -> bool {
        let Some((_, job)) = self.jobs.remove_if(id, |_, job| job.generation == generation) else {
            return false;
        };
        self.tasks.insert(generation, job.handle);
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn sleep_until(at: NaiveDateTime) {
    loop {
        let now = Local::now().naive_local();
        if at <= now {
            return;
        }
        let remaining = (at - now).to_std().unwrap_or_default().min(MAX_SLEEP);
        tokio::time::sleep(remaining).await;
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                tasks: DashMap::new(),
                next_generation: AtomicU64::new(0),
                running: AtomicBool::new(true),
            }),
        }
    }

    /// Register a job, replacing any pending job with the same id.
    ///
    /// Returns `false` when the job was not registered: the scheduler is
    /// shut down or a one-shot trigger is not in the future.
    pub fn schedule(&self, info: JobInfo, action: JobAction) -> bool {
        if !self.is_running() {
            debug!("Scheduler stopped, ignoring job {}", info.id);
            return false;
        }

        let now = Local::now().naive_local();
        let Some(first) = info.trigger.next_after(now) else {
            debug!("Job {} is in the past, not scheduling", info.id);
            return false;
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let id = info.id.clone();

        match self.inner.jobs.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get().handle.abort();
                let handle = self.spawn(id.clone(), info.trigger, first, generation, action);
                occupied.insert(ScheduledJob {
                    info,
                    generation,
                    handle,
                });
                debug!("Replaced job {} (next at {})", id, first);
            }
            Entry::Vacant(vacant) => {
                let handle = self.spawn(id.clone(), info.trigger, first, generation, action);
                vacant.insert(ScheduledJob {
                    info,
                    generation,
                    handle,
                });
                debug!("Scheduled job {} (next at {})", id, first);
            }
        }
        true
    }

    pub fn schedule_once(
        &self,
        id: impl Into<String>,
        owner: impl Into<String>,
        at: NaiveDateTime,
        description: impl Into<String>,
        action: JobAction,
    ) -> bool {
        self.schedule(
            JobInfo {
                id: id.into(),
                owner: owner.into(),
                trigger: Trigger::Once(at),
                description: description.into(),
            },
            action,
        )
    }

    pub fn schedule_daily(
        &self,
        id: impl Into<String>,
        owner: impl Into<String>,
        time: NaiveTime,
        description: impl Into<String>,
        action: JobAction,
    ) -> bool {
        self.schedule(
            JobInfo {
                id: id.into(),
                owner: owner.into(),
                trigger: Trigger::Daily(time),
                description: description.into(),
            },
            action,
        )
    }

    fn spawn(
        &self,
        id: String,
        trigger: Trigger,
        first: NaiveDateTime,
        generation: u64,
        action: JobAction,
    ) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut next = first;
            loop {
                sleep_until(next).await;

                match trigger {
                    Trigger::Once(_) => {
                        let claimed = inner
                            .upgrade()
                            .map_or(false, |inner| inner.claim(&id, generation));
                        if claimed {
                            debug!("Firing job {}", id);
                            action().await;
                        }
                        if let Some(inner) = inner.upgrade() {
                            inner.tasks.remove(&generation);
                        }
                        break;
                    }
                    Trigger::Daily(_) => {
                        debug!("Firing job {}", id);
                        action().await;
                        let now = Local::now().naive_local().max(next);
                        match trigger.next_after(now) {
                            Some(at) => next = at,
                            None => break,
                        }
                    }
                }
            }
        })
    }

    /// Cancel a pending job. Returns `true` if one was removed.
    pub fn cancel(&self, id: &str) -> bool {
        match self.inner.jobs.remove(id) {
            Some((_, job)) => {
                job.handle.abort();
                debug!("Cancelled job {}", id);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending job matching `predicate`; returns how many.
    ///
    /// One-shot jobs that are already due are left to fire.
    pub fn cancel_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&JobInfo) -> bool,
    {
        let now = Local::now().naive_local();
        let ids: Vec<String> = self
            .inner
            .jobs
            .iter()
            .filter(|job| !job.info.is_due(now) && predicate(&job.info))
            .map(|job| job.key().clone())
            .collect();
        ids.iter()
            .filter(|id| {
                let removed = self
                    .inner
                    .jobs
                    .remove_if(id.as_str(), |_, job| !job.info.is_due(now));
                match removed {
                    Some((_, job)) => {
                        job.handle.abort();
                        debug!("Cancelled job {}", id);
                        true
                    }
                    None => false,
                }
            })
            .count()
    }

    /// Run `task` in the background until it finishes or the scheduler
    /// shuts down. Dropped silently once the scheduler has stopped.
    pub fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_running() {
            debug!("Scheduler stopped, dropping background task");
            return;
        }
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
        let key = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.tasks.insert(key, tokio::spawn(task));
    }

    /// Pending jobs of one owner, soonest first
    pub fn jobs_for(&self, owner: &str) -> Vec<JobInfo> {
        let now = Local::now().naive_local();
        let mut jobs: Vec<JobInfo> = self
            .inner
            .jobs
            .iter()
            .filter(|job| job.info.owner == owner)
            .map(|job| job.info.clone())
            .collect();
        jobs.sort_by(|a, b| {
            a.next_fire(now)
                .cmp(&b.next_fire(now))
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs
    }

    pub fn trigger_of(&self, id: &str) -> Option<Trigger> {
        self.inner.jobs.get(id).map(|job| job.info.trigger)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop the scheduler: abort every pending job and background task and
    /// refuse new ones
    pub fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let pending = self.inner.jobs.len();
        for job in self.inner.jobs.iter() {
            job.handle.abort();
        }
        self.inner.jobs.clear();
        for task in self.inner.tasks.iter() {
            task.abort();
        }
        self.inner.tasks.clear();
        info!("Job scheduler stopped ({} pending jobs dropped)", pending);
    }
}
