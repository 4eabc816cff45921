//! Text renderers for bot replies
//!
//! Pure functions from records to Discord markdown. Callers chunk the
//! result with [`crate::core::chunk_for_message`] before sending.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::{NaiveDate, NaiveDateTime, Weekday};

use crate::core::response::truncate_chars;
use crate::database::{Achievement, HomeworkEntry, HomeworkStats, Note, ScheduleEntry};
use crate::features::reminders::JobInfo;
use crate::features::validation::weekday_from_index;

const PROGRESS_BAR_LEN: usize = 10;
const NOTE_PREVIEW_CHARS: usize = 50;

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

fn schedule_line(entry: &ScheduleEntry) -> String {
    let mut line = format!("🕐 **{}** - {}", entry.time.format("%H:%M"), entry.subject);
    if let Some(room) = &entry.room {
        line.push_str(&format!(" (room {room})"));
    }
    line
}

/// One day of classes, sorted by time
pub fn render_schedule_day(title: &str, entries: &[ScheduleEntry]) -> String {
    if entries.is_empty() {
        return format!("📅 **{title}**\n\nNo classes");
    }
    let mut sorted: Vec<&ScheduleEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (e.time, e.id));

    let mut text = format!("📅 **{title}**\n\n");
    for entry in sorted {
        text.push_str(&schedule_line(entry));
        text.push('\n');
    }
    text
}

/// The whole week grouped by day, Monday first. Days without classes are skipped.
pub fn render_week_schedule(entries: &[ScheduleEntry]) -> String {
    if entries.is_empty() {
        return "📅 **Weekly schedule**\n\nNo classes".to_string();
    }
    let mut text = String::from("📅 **Weekly schedule**\n");
    for day in (0..7).filter_map(weekday_from_index) {
        let mut today: Vec<&ScheduleEntry> =
            entries.iter().filter(|e| e.slot.weekday() == day).collect();
        if today.is_empty() {
            continue;
        }
        today.sort_by_key(|e| (e.time, e.id));
        text.push_str(&format!("\n**{}**\n", weekday_name(day)));
        for entry in today {
            text.push_str(&schedule_line(entry));
            text.push('\n');
        }
    }
    text
}

pub fn render_homework_list(title: &str, entries: &[HomeworkEntry]) -> String {
    if entries.is_empty() {
        return format!("📘 **{title}**\n\nNo homework");
    }
    let mut text = format!("📘 **{title}**\n\n");
    for (idx, item) in entries.iter().enumerate() {
        let status = if item.completed { "✅" } else { "⏳" };
        text.push_str(&format!("{status} **{}.** {}\n", idx + 1, item.subject));
        text.push_str(&format!("   {}\n", item.task));
        if let Some(deadline) = item.deadline {
            text.push_str(&format!("   📅 Due: {}\n", format_date(deadline)));
        }
        text.push('\n');
    }
    text
}

fn note_lines(notes: &[Note]) -> String {
    let mut text = String::new();
    for (idx, note) in notes.iter().enumerate() {
        text.push_str(&format!("**{}.** {}\n", idx + 1, note.title));
        if !note.content.is_empty() {
            text.push_str(&format!(
                "   {}\n",
                truncate_chars(&note.content, NOTE_PREVIEW_CHARS)
            ));
        }
        text.push_str(&format!("   📅 {}\n\n", format_date(note.created_at.date())));
    }
    text
}

pub fn render_notes_list(notes: &[Note]) -> String {
    if notes.is_empty() {
        return "📝 **Notes**\n\nNo notes".to_string();
    }
    format!("📝 **Notes**\n\n{}", note_lines(notes))
}

pub fn render_search_results(query: &str, notes: &[Note]) -> String {
    if notes.is_empty() {
        return format!("🔍 Nothing found for \"{query}\"");
    }
    format!(
        "🔍 **Results for \"{query}\"** ({})\n\n{}",
        notes.len(),
        note_lines(notes)
    )
}

/// Ten-cell bar coloured by how far along the owner is
pub fn progress_bar(percentage: f64) -> String {
    let clamped = percentage.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * PROGRESS_BAR_LEN as f64) as usize;
    let cell = if clamped >= 80.0 {
        "🟩"
    } else if clamped >= 50.0 {
        "🟨"
    } else {
        "🟥"
    };
    format!(
        "{}{}",
        cell.repeat(filled),
        "⬜".repeat(PROGRESS_BAR_LEN - filled)
    )
}

pub fn render_progress(stats: &HomeworkStats, achievements: &[Achievement]) -> String {
    let percentage = stats.percentage();
    let mut text = format!(
        "📊 **Your progress**\n\n{} {:.1}%\n\n📘 Total: {}\n✅ Completed: {}\n⏳ Pending: {}\n\n",
        progress_bar(percentage),
        percentage,
        stats.total,
        stats.completed,
        stats.pending()
    );

    text.push_str(if percentage >= 80.0 {
        "🎉 Great work, keep it up!"
    } else if percentage >= 50.0 {
        "👍 Good progress!"
    } else if percentage > 0.0 {
        "💪 Every finished task counts."
    } else {
        "🚀 Complete some homework to see your progress."
    });

    if !achievements.is_empty() {
        text.push_str("\n\n🏆 **Achievements**\n");
        for achievement in achievements {
            text.push_str(&format!(
                "• {} ({})\n",
                achievement.kind.title(),
                format_date(achievement.unlocked_at.date())
            ));
        }
    }
    text
}

pub fn render_pending_jobs(jobs: &[JobInfo], now: NaiveDateTime) -> String {
    if jobs.is_empty() {
        return "⏰ **Reminders**\n\nNo pending reminders".to_string();
    }
    let mut text = String::from("⏰ **Reminders**\n\n");
    for job in jobs {
        let at = job.next_fire(now);
        text.push_str(&format!(
            "• {} {}: {}\n",
            format_date(at.date()),
            at.format("%H:%M"),
            job.description.replace('\n', "; ")
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AchievementKind, ScheduleSlot};
    use crate::features::reminders::Trigger;
    use chrono::NaiveTime;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn class(id: i64, day: Weekday, subject: &str, h: u32, room: Option<&str>) -> ScheduleEntry {
        ScheduleEntry {
            id,
            owner: "alice".into(),
            slot: ScheduleSlot::Weekly(day),
            subject: subject.into(),
            time: NaiveTime::from_hms_opt(h, 0, 0).unwrap(),
            room: room.map(str::to_string),
            created_at: stamp(),
        }
    }

    #[test]
    fn test_progress_bar_colours() {
        assert_eq!(progress_bar(0.0), "⬜".repeat(10));
        assert_eq!(progress_bar(100.0), "🟩".repeat(10));
        assert_eq!(progress_bar(85.0), format!("{}{}", "🟩".repeat(8), "⬜".repeat(2)));
        assert_eq!(progress_bar(50.0), format!("{}{}", "🟨".repeat(5), "⬜".repeat(5)));
        assert_eq!(progress_bar(25.0), format!("{}{}", "🟥".repeat(2), "⬜".repeat(8)));
        assert_eq!(progress_bar(150.0).chars().count(), 10);
    }

    #[test]
    fn test_schedule_day_sorted_with_room() {
        let text = render_schedule_day(
            "Monday",
            &[
                class(1, Weekday::Mon, "Physics", 11, None),
                class(2, Weekday::Mon, "Math", 9, Some("B-204")),
            ],
        );
        let math = text.find("Math").unwrap();
        let physics = text.find("Physics").unwrap();
        assert!(math < physics);
        assert!(text.contains("**09:00** - Math (room B-204)"));
        assert!(render_schedule_day("Sunday", &[]).contains("No classes"));
    }

    #[test]
    fn test_week_schedule_groups_days() {
        let text = render_week_schedule(&[
            class(1, Weekday::Wed, "Art", 10, None),
            class(2, Weekday::Mon, "Math", 9, None),
        ]);
        assert!(text.find("**Monday**").unwrap() < text.find("**Wednesday**").unwrap());
        assert!(!text.contains("Tuesday"));
    }

    #[test]
    fn test_homework_list_marks_status() {
        let entry = |completed| HomeworkEntry {
            id: 1,
            owner: "alice".into(),
            subject: "Math".into(),
            task: "Read ch.1".into(),
            deadline: NaiveDate::from_ymd_opt(2030, 1, 10),
            completed,
            created_at: stamp(),
        };
        let text = render_homework_list("Homework", &[entry(false), entry(true)]);
        assert!(text.contains("⏳ **1.** Math"));
        assert!(text.contains("✅ **2.** Math"));
        assert!(text.contains("Due: 10.01.2030"));
        assert!(render_homework_list("Homework", &[]).contains("No homework"));
    }

    #[test]
    fn test_note_preview_truncated() {
        let note = Note {
            id: 1,
            owner: "alice".into(),
            title: "Long".into(),
            content: "x".repeat(80),
            created_at: stamp(),
            updated_at: stamp(),
        };
        let text = render_notes_list(&[note.clone()]);
        assert!(text.contains(&format!("{}...", "x".repeat(47))));
        assert!(!text.contains(&"x".repeat(51)));
        assert!(render_search_results("long", &[note]).contains("(1)"));
        assert!(render_search_results("zzz", &[]).contains("Nothing found"));
    }

    #[test]
    fn test_progress_lists_achievements() {
        let stats = HomeworkStats { total: 10, completed: 10 };
        let achievement = Achievement {
            id: 1,
            owner: "alice".into(),
            kind: AchievementKind::Homework10,
            detail: String::new(),
            unlocked_at: stamp(),
        };
        let text = render_progress(&stats, &[achievement]);
        assert!(text.contains("100.0%"));
        assert!(text.contains(AchievementKind::Homework10.title()));
        assert!(!render_progress(&HomeworkStats::default(), &[]).contains("Achievements"));
    }

    #[test]
    fn test_pending_jobs_listing() {
        let job = JobInfo {
            id: "homework_alice_203001080900".into(),
            owner: "alice".into(),
            trigger: Trigger::Once(stamp() + chrono::Duration::days(1)),
            description: "Math deadline tomorrow: a\nArt deadline tomorrow: b".into(),
        };
        let text = render_pending_jobs(&[job], stamp());
        assert!(text.contains("08.01.2030 12:00"));
        assert!(text.contains("a; Art"));
        assert!(render_pending_jobs(&[], stamp()).contains("No pending"));
    }
}
