//! Canonical record shapes shared by every storage backend
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::fmt;
use std::str::FromStr;

/// Primary key of any stored record
pub type RecordId = i64;

/// Storage format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage and display format for times of day
pub const TIME_FORMAT: &str = "%H:%M";

/// When a class takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSlot {
    /// Every week on this day
    Weekly(Weekday),
    /// Once, on this date
    Dated(NaiveDate),
}

impl ScheduleSlot {
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        match self {
            ScheduleSlot::Weekly(day) => date.weekday() == *day,
            ScheduleSlot::Dated(d) => *d == date,
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            ScheduleSlot::Weekly(day) => *day,
            ScheduleSlot::Dated(d) => d.weekday(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub id: RecordId,
    pub owner: String,
    pub slot: ScheduleSlot,
    pub subject: String,
    pub time: NaiveTime,
    pub room: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduleEntry {
    pub slot: ScheduleSlot,
    pub subject: String,
    pub time: NaiveTime,
    pub room: Option<String>,
}

/// Single- or multi-field update. `room: Some(None)` clears the room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    pub subject: Option<String>,
    pub time: Option<NaiveTime>,
    pub room: Option<Option<String>>,
}

impl SchedulePatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.time.is_none() && self.room.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFilter {
    All,
    /// Entries taking place on the given date
    On(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeworkEntry {
    pub id: RecordId,
    pub owner: String,
    pub subject: String,
    pub task: String,
    pub deadline: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHomework {
    pub subject: String,
    pub task: String,
    pub deadline: Option<NaiveDate>,
}

/// `deadline: Some(None)` clears the deadline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeworkPatch {
    pub subject: Option<String>,
    pub task: Option<String>,
    pub deadline: Option<Option<NaiveDate>>,
}

impl HomeworkPatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.task.is_none() && self.deadline.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeworkFilter {
    pub deadline: Option<NaiveDate>,
    pub subject: Option<String>,
    pub include_completed: bool,
}

impl HomeworkFilter {
    /// Everything not yet completed
    pub fn pending() -> Self {
        Self::default()
    }

    /// Completed and pending items alike
    pub fn everything() -> Self {
        Self {
            include_completed: true,
            ..Self::default()
        }
    }

    pub fn due_on(date: NaiveDate) -> Self {
        Self {
            deadline: Some(date),
            ..Self::default()
        }
    }

    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HomeworkStats {
    pub total: usize,
    pub completed: usize,
}

impl HomeworkStats {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: RecordId,
    pub owner: String,
    pub title: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Note {
    /// Case-insensitive substring match over title and content.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.content.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Achievement kinds. At most one of each per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementKind {
    HomeworkStreak5,
    Homework10,
    Homework50,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 3] = [
        AchievementKind::HomeworkStreak5,
        AchievementKind::Homework10,
        AchievementKind::Homework50,
    ];

    /// Stable tag persisted in the achievements table
    pub fn tag(&self) -> &'static str {
        match self {
            AchievementKind::HomeworkStreak5 => "homework_streak_5",
            AchievementKind::Homework10 => "homework_10",
            AchievementKind::Homework50 => "homework_50",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementKind::HomeworkStreak5 => "5 homework items in a row",
            AchievementKind::Homework10 => "10 homework items completed",
            AchievementKind::Homework50 => "50 homework items completed",
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AchievementKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        AchievementKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown achievement kind: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub id: RecordId,
    pub owner: String,
    pub kind: AchievementKind,
    pub detail: String,
    pub unlocked_at: NaiveDateTime,
}

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_THEME: &str = "light";
pub const LANGUAGES: [(&str, &str); 2] = [("en", "English"), ("ru", "Русский")];
pub const THEMES: [(&str, &str); 3] = [("light", "Light"), ("dark", "Dark"), ("color", "Colorful")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub owner: String,
    pub language: String,
    pub theme: String,
    pub reminder_time: NaiveTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub language: Option<String>,
    pub theme: Option<String>,
    pub reminder_time: Option<NaiveTime>,
}

/// Parse a stored time, accepting both `HH:MM` and `HH:MM:SS`
pub fn parse_stored_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, TIME_FORMAT))
        .map_err(|e| anyhow::anyhow!("Invalid stored time '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_occurs_on() {
        // 2030-01-07 is a Monday
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let tuesday = monday.succ_opt().unwrap();

        assert!(ScheduleSlot::Weekly(Weekday::Mon).occurs_on(monday));
        assert!(!ScheduleSlot::Weekly(Weekday::Mon).occurs_on(tuesday));
        assert!(ScheduleSlot::Weekly(Weekday::Mon).occurs_on(monday + chrono::Duration::days(7)));
        assert!(ScheduleSlot::Dated(tuesday).occurs_on(tuesday));
        assert!(!ScheduleSlot::Dated(tuesday).occurs_on(tuesday + chrono::Duration::days(7)));
        assert_eq!(ScheduleSlot::Dated(tuesday).weekday(), Weekday::Tue);
    }

    #[test]
    fn test_achievement_tags_round_trip() {
        for kind in AchievementKind::ALL {
            assert_eq!(kind.tag().parse::<AchievementKind>().unwrap(), kind);
        }
        assert!("homework_1000".parse::<AchievementKind>().is_err());
    }

    #[test]
    fn test_stats_percentage() {
        let stats = HomeworkStats { total: 4, completed: 1 };
        assert_eq!(stats.pending(), 3);
        assert!((stats.percentage() - 25.0).abs() < f64::EPSILON);
        assert_eq!(HomeworkStats::default().percentage(), 0.0);
    }

    #[test]
    fn test_parse_stored_time() {
        let t = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_stored_time("09:30").unwrap(), t);
        assert_eq!(parse_stored_time("09:30:00").unwrap(), t);
        assert!(parse_stored_time("nine").is_err());
    }
}
