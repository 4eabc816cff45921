//! Achievement rules over homework completion
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use log::{error, info};

use crate::database::{AchievementKind, HomeworkEntry, HomeworkFilter, SharedStore};
use crate::features::reminders::SharedNotifier;

/// Completed items in a row needed for the streak badge
pub const STREAK_TARGET: usize = 5;

/// Longest run of completed items, in creation order
pub fn longest_completed_streak(items: &[HomeworkEntry]) -> usize {
    let mut ordered: Vec<&HomeworkEntry> = items.iter().collect();
    ordered.sort_by_key(|item| (item.created_at, item.id));

    let mut best = 0;
    let mut current = 0;
    for item in ordered {
        if item.completed {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

fn unlock_message(kind: AchievementKind) -> String {
    let cheer = match kind {
        AchievementKind::HomeworkStreak5 => "Great job, keep it going!",
        AchievementKind::Homework10 => "You're on the right track!",
        AchievementKind::Homework50 => "An incredible result!",
    };
    format!("🎉 **Achievement unlocked!**\n\n🏆 {}\n\n{}", kind.title(), cheer)
}

#[derive(Clone)]
pub struct AchievementEvaluator {
    store: SharedStore,
    notifier: SharedNotifier,
}

impl AchievementEvaluator {
    pub fn new(store: SharedStore, notifier: SharedNotifier) -> Self {
        Self { store, notifier }
    }

    /// Record every rule the owner now satisfies and announce the new ones.
    /// Returns only the kinds unlocked by this call.
    pub async fn check_and_unlock(&self, owner: &str) -> Result<Vec<AchievementKind>> {
        let items = self
            .store
            .list_homework(owner, &HomeworkFilter::everything())
            .await?;
        let streak = longest_completed_streak(&items);
        let completed = self.store.homework_stats(owner).await?.completed;

        let mut earned = Vec::new();
        if streak >= STREAK_TARGET {
            earned.push((AchievementKind::HomeworkStreak5, format!("Completed {streak} homework items in a row")));
        }
        if completed >= 10 {
            earned.push((AchievementKind::Homework10, format!("Completed {completed} homework items")));
        }
        if completed >= 50 {
            earned.push((AchievementKind::Homework50, format!("Completed {completed} homework items")));
        }

        let mut unlocked = Vec::new();
        for (kind, detail) in earned {
            if !self.store.unlock_achievement(owner, kind, &detail).await? {
                continue;
            }
            info!("User {} unlocked {}", owner, kind);
            if let Err(e) = self.notifier.deliver(owner, &unlock_message(kind)).await {
                error!("Failed to announce {} to {}: {}", kind, owner, e);
            }
            unlocked.push(kind);
        }
        Ok(unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewHomework, SqliteStore};
    use crate::features::reminders::Notifier;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, _owner: &str, text: &str) -> Result<()> {
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn item(id: i64, completed: bool, day: u32) -> HomeworkEntry {
        HomeworkEntry {
            id,
            owner: "alice".into(),
            subject: "Math".into(),
            task: "Read".into(),
            deadline: None,
            completed,
            created_at: NaiveDate::from_ymd_opt(2030, 1, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_streak_follows_creation_order() {
        let items = vec![
            item(1, true, 1),
            item(2, true, 2),
            item(3, false, 3),
            item(4, true, 4),
            item(5, true, 5),
            item(6, true, 6),
        ];
        assert_eq!(longest_completed_streak(&items), 3);

        let mut shuffled = items.clone();
        shuffled.reverse();
        assert_eq!(longest_completed_streak(&shuffled), 3);
        assert_eq!(longest_completed_streak(&[]), 0);
    }

    async fn completed_items(store: &SharedStore, owner: &str, count: usize) {
        for n in 0..count {
            let id = store
                .add_homework(
                    owner,
                    &NewHomework {
                        subject: "Math".into(),
                        task: format!("Exercise {n}"),
                        deadline: None,
                    },
                )
                .await
                .unwrap();
            store.complete_homework(owner, id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_streak_unlocked_exactly_once() {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AchievementEvaluator::new(store.clone(), notifier.clone());
        completed_items(&store, "alice", 5).await;

        let first = evaluator.check_and_unlock("alice").await.unwrap();
        assert_eq!(first, vec![AchievementKind::HomeworkStreak5]);
        let second = evaluator.check_and_unlock("alice").await.unwrap();
        assert!(second.is_empty());

        let achievements = store.list_achievements("alice").await.unwrap();
        assert_eq!(achievements.len(), 1);
        assert_eq!(achievements[0].kind, AchievementKind::HomeworkStreak5);
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_total_thresholds() {
        let store: SharedStore = Arc::new(SqliteStore::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let evaluator = AchievementEvaluator::new(store.clone(), notifier);

        completed_items(&store, "alice", 4).await;
        assert!(evaluator.check_and_unlock("alice").await.unwrap().is_empty());

        completed_items(&store, "alice", 6).await;
        let unlocked = evaluator.check_and_unlock("alice").await.unwrap();
        assert_eq!(
            unlocked,
            vec![AchievementKind::HomeworkStreak5, AchievementKind::Homework10]
        );
        assert!(store.list_achievements("bob").await.unwrap().is_empty());
    }
}
