//! Hosted backend over the PostgREST API
//!
//! The hosted tables predate the canonical model, so this adapter translates
//! at the boundary:
//! - homework text lives in `hw`, not `task`
//! - there is no completion column: completing an item deletes it and every
//!   row read back is reported as not completed
//! - schedule rows carry a concrete `date`; a weekly slot is stored as its
//!   next occurrence on or after today
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use log::{debug, info, warn};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::models::{
    parse_stored_time, Achievement, AchievementKind, HomeworkEntry, HomeworkFilter,
    HomeworkPatch, HomeworkStats, NewHomework, NewNote, NewScheduleEntry, Note, NotePatch,
    RecordId, ScheduleEntry, ScheduleFilter, SchedulePatch, ScheduleSlot, SettingsPatch,
    UserSettings, DATE_FORMAT, DEFAULT_LANGUAGE, DEFAULT_THEME, TIME_FORMAT,
};
use super::DomainStore;
use crate::core::config::DEFAULT_REMINDER_TIME;

const REQUEST_TIMEOUT_SECS: u64 = 15;

type Query = Vec<(&'static str, String)>;

pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct HomeworkRow {
    id: RecordId,
    user_id: String,
    subject: String,
    hw: String,
    deadline: Option<NaiveDate>,
    created_at: Option<DateTime<FixedOffset>>,
}

impl HomeworkRow {
    fn into_entry(self) -> HomeworkEntry {
        HomeworkEntry {
            id: self.id,
            owner: self.user_id,
            subject: self.subject,
            task: self.hw,
            deadline: self.deadline,
            completed: false,
            created_at: naive_or_now(self.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    id: RecordId,
    user_id: String,
    date: NaiveDate,
    subject: String,
    time: String,
    room: Option<String>,
    created_at: Option<DateTime<FixedOffset>>,
}

impl ScheduleRow {
    fn into_entry(self) -> Result<ScheduleEntry> {
        Ok(ScheduleEntry {
            id: self.id,
            owner: self.user_id,
            slot: ScheduleSlot::Dated(self.date),
            subject: self.subject,
            time: parse_stored_time(&self.time)?,
            room: self.room,
            created_at: naive_or_now(self.created_at),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NoteRow {
    id: RecordId,
    user_id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    created_at: Option<DateTime<FixedOffset>>,
    updated_at: Option<DateTime<FixedOffset>>,
}

impl NoteRow {
    fn into_note(self) -> Note {
        let created_at = naive_or_now(self.created_at);
        Note {
            id: self.id,
            owner: self.user_id,
            title: self.title,
            content: self.content.unwrap_or_default(),
            created_at,
            updated_at: self.updated_at.map(|t| t.naive_local()).unwrap_or(created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AchievementRow {
    id: RecordId,
    user_id: String,
    achievement_type: String,
    description: Option<String>,
    unlocked_at: Option<DateTime<FixedOffset>>,
}

impl AchievementRow {
    fn into_achievement(self) -> Result<Achievement> {
        Ok(Achievement {
            id: self.id,
            owner: self.user_id,
            kind: self.achievement_type.parse()?,
            detail: self.description.unwrap_or_default(),
            unlocked_at: naive_or_now(self.unlocked_at),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SettingsRow {
    user_id: String,
    language: Option<String>,
    theme: Option<String>,
    reminder_time: Option<String>,
    created_at: Option<DateTime<FixedOffset>>,
}

impl SettingsRow {
    fn into_settings(self, fallback_time: NaiveTime) -> Result<UserSettings> {
        let reminder_time = match self.reminder_time {
            Some(raw) => parse_stored_time(&raw)?,
            None => fallback_time,
        };
        Ok(UserSettings {
            owner: self.user_id,
            language: self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            theme: self.theme.unwrap_or_else(|| DEFAULT_THEME.to_string()),
            reminder_time,
            created_at: naive_or_now(self.created_at),
        })
    }
}

fn naive_or_now(stamp: Option<DateTime<FixedOffset>>) -> NaiveDateTime {
    stamp
        .map(|t| t.naive_local())
        .unwrap_or_else(|| Local::now().naive_local())
}

/// First date on or after `today` that falls on `day`
pub fn next_date_for(day: Weekday, today: NaiveDate) -> NaiveDate {
    let ahead = (7 + day.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    today + Duration::days(ahead)
}

fn slot_date(slot: ScheduleSlot, today: NaiveDate) -> NaiveDate {
    match slot {
        ScheduleSlot::Dated(date) => date,
        ScheduleSlot::Weekly(day) => next_date_for(day, today),
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn date_json(date: Option<NaiveDate>) -> Value {
    date.map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
        .unwrap_or(Value::Null)
}

fn time_json(time: NaiveTime) -> Value {
    Value::String(time.format(TIME_FORMAT).to_string())
}

fn fallback_reminder_time() -> Result<NaiveTime> {
    parse_stored_time(DEFAULT_REMINDER_TIME)
}

impl SupabaseStore {
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        info!("Hosted store client ready");
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            key: key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    async fn check(response: Response, table: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("{} request failed with {}: {}", table, status, body))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>> {
        let response = self
            .request(Method::GET, table)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to query {table}"))?;
        let rows = Self::check(response, table).await?.json::<Vec<T>>().await?;
        debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    /// Insert and return the stored rows. With `on_conflict` set, a
    /// conflicting insert becomes a no-op that returns no rows.
    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &Value,
        on_conflict: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut request = self.request(Method::POST, table).json(body);
        request = match on_conflict {
            Some(columns) => request
                .query(&[("on_conflict", columns)])
                .header("Prefer", "resolution=ignore-duplicates,return=representation"),
            None => request.header("Prefer", "return=representation"),
        };
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to insert into {table}"))?;
        Ok(Self::check(response, table).await?.json::<Vec<T>>().await?)
    }

    /// PATCH or DELETE matching rows, returning how many were touched
    async fn modify(&self, method: Method, table: &str, query: &Query, body: Option<Value>) -> Result<usize> {
        let mut request = self
            .request(method, table)
            .query(query)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to modify {table}"))?;
        let rows = Self::check(response, table).await?.json::<Vec<Value>>().await?;
        Ok(rows.len())
    }

    fn owned(owner: &str, id: RecordId) -> Query {
        vec![("id", eq(id)), ("user_id", eq(owner))]
    }

    async fn patch_owned(&self, table: &str, owner: &str, id: RecordId, fields: Map<String, Value>) -> Result<bool> {
        if fields.is_empty() {
            return Ok(false);
        }
        let touched = self
            .modify(Method::PATCH, table, &Self::owned(owner, id), Some(Value::Object(fields)))
            .await?;
        Ok(touched > 0)
    }

    async fn delete_owned(&self, table: &str, owner: &str, id: RecordId) -> Result<bool> {
        Ok(self.modify(Method::DELETE, table, &Self::owned(owner, id), None).await? > 0)
    }

    fn first<T>(rows: Vec<T>, table: &str) -> Result<T> {
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} insert returned no row", table))
    }
}

#[async_trait]
impl DomainStore for SupabaseStore {
    async fn add_schedule(&self, owner: &str, entry: &NewScheduleEntry) -> Result<RecordId> {
        let date = slot_date(entry.slot, Local::now().date_naive());
        let body = json!({
            "user_id": owner,
            "date": date.format(DATE_FORMAT).to_string(),
            "subject": entry.subject,
            "time": time_json(entry.time),
            "room": entry.room,
        });
        let rows: Vec<ScheduleRow> = self.insert("schedule", &body, None).await?;
        let row = Self::first(rows, "schedule")?;
        info!("Added schedule entry {} for {} on {}", row.id, owner, date);
        Ok(row.id)
    }

    async fn list_schedule(&self, owner: &str, filter: ScheduleFilter) -> Result<Vec<ScheduleEntry>> {
        let mut query: Query = vec![("user_id", eq(owner))];
        match filter {
            ScheduleFilter::All => query.push(("order", "date.asc,time.asc".into())),
            ScheduleFilter::On(date) => {
                query.push(("date", eq(date.format(DATE_FORMAT))));
                query.push(("order", "time.asc".into()));
            }
        }
        self.select::<ScheduleRow>("schedule", &query)
            .await?
            .into_iter()
            .map(ScheduleRow::into_entry)
            .collect()
    }

    async fn get_schedule(&self, owner: &str, id: RecordId) -> Result<Option<ScheduleEntry>> {
        self.select::<ScheduleRow>("schedule", &Self::owned(owner, id))
            .await?
            .into_iter()
            .next()
            .map(ScheduleRow::into_entry)
            .transpose()
    }

    async fn update_schedule(&self, owner: &str, id: RecordId, patch: &SchedulePatch) -> Result<bool> {
        let mut fields = Map::new();
        if let Some(subject) = &patch.subject {
            fields.insert("subject".into(), json!(subject));
        }
        if let Some(time) = patch.time {
            fields.insert("time".into(), time_json(time));
        }
        if let Some(room) = &patch.room {
            fields.insert("room".into(), json!(room));
        }
        self.patch_owned("schedule", owner, id, fields).await
    }

    async fn delete_schedule(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.delete_owned("schedule", owner, id).await
    }

    async fn add_homework(&self, owner: &str, entry: &NewHomework) -> Result<RecordId> {
        let body = json!({
            "user_id": owner,
            "subject": entry.subject,
            "hw": entry.task,
            "deadline": date_json(entry.deadline),
        });
        let rows: Vec<HomeworkRow> = self.insert("homework", &body, None).await?;
        let row = Self::first(rows, "homework")?;
        info!("Added homework {} for {}", row.id, owner);
        Ok(row.id)
    }

    async fn list_homework(&self, owner: &str, filter: &HomeworkFilter) -> Result<Vec<HomeworkEntry>> {
        let mut query: Query = vec![("user_id", eq(owner))];
        if let Some(deadline) = filter.deadline {
            query.push(("deadline", eq(deadline.format(DATE_FORMAT))));
        }
        if let Some(subject) = &filter.subject {
            query.push(("subject", format!("ilike.{}", subject.replace('*', ""))));
        }
        query.push(("order", "deadline.asc.nullslast,id.asc".into()));
        // every stored row is pending, so `include_completed` has nothing to add
        Ok(self
            .select::<HomeworkRow>("homework", &query)
            .await?
            .into_iter()
            .map(HomeworkRow::into_entry)
            .collect())
    }

    async fn get_homework(&self, owner: &str, id: RecordId) -> Result<Option<HomeworkEntry>> {
        Ok(self
            .select::<HomeworkRow>("homework", &Self::owned(owner, id))
            .await?
            .into_iter()
            .next()
            .map(HomeworkRow::into_entry))
    }

    async fn update_homework(&self, owner: &str, id: RecordId, patch: &HomeworkPatch) -> Result<bool> {
        let mut fields = Map::new();
        if let Some(subject) = &patch.subject {
            fields.insert("subject".into(), json!(subject));
        }
        if let Some(task) = &patch.task {
            fields.insert("hw".into(), json!(task));
        }
        if let Some(deadline) = patch.deadline {
            fields.insert("deadline".into(), date_json(deadline));
        }
        self.patch_owned("homework", owner, id, fields).await
    }

    async fn complete_homework(&self, owner: &str, id: RecordId) -> Result<bool> {
        let removed = self.delete_owned("homework", owner, id).await?;
        if removed {
            debug!("Homework {} completed by deletion for {}", id, owner);
        }
        Ok(removed)
    }

    async fn delete_homework(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.delete_owned("homework", owner, id).await
    }

    async fn homework_stats(&self, owner: &str) -> Result<HomeworkStats> {
        let rows = self.list_homework(owner, &HomeworkFilter::everything()).await?;
        Ok(HomeworkStats {
            total: rows.len(),
            completed: 0,
        })
    }

    async fn add_note(&self, owner: &str, note: &NewNote) -> Result<RecordId> {
        let body = json!({
            "user_id": owner,
            "title": note.title,
            "content": note.content,
        });
        let rows: Vec<NoteRow> = self.insert("notes", &body, None).await?;
        Ok(Self::first(rows, "notes")?.id)
    }

    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>> {
        let query: Query = vec![
            ("user_id", eq(owner)),
            ("order", "updated_at.desc,id.desc".into()),
        ];
        Ok(self
            .select::<NoteRow>("notes", &query)
            .await?
            .into_iter()
            .map(NoteRow::into_note)
            .collect())
    }

    async fn get_note(&self, owner: &str, id: RecordId) -> Result<Option<Note>> {
        Ok(self
            .select::<NoteRow>("notes", &Self::owned(owner, id))
            .await?
            .into_iter()
            .next()
            .map(NoteRow::into_note))
    }

    async fn update_note(&self, owner: &str, id: RecordId, patch: &NotePatch) -> Result<bool> {
        let mut fields = Map::new();
        if let Some(title) = &patch.title {
            fields.insert("title".into(), json!(title));
        }
        if let Some(content) = &patch.content {
            fields.insert("content".into(), json!(content));
        }
        if fields.is_empty() {
            return Ok(false);
        }
        fields.insert("updated_at".into(), json!(Local::now().to_rfc3339()));
        self.patch_owned("notes", owner, id, fields).await
    }

    async fn delete_note(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.delete_owned("notes", owner, id).await
    }

    async fn search_notes(&self, owner: &str, query: &str) -> Result<Vec<Note>> {
        let needle = query.to_lowercase();
        Ok(self
            .list_notes(owner)
            .await?
            .into_iter()
            .filter(|note| note.matches(&needle))
            .collect())
    }

    async fn unlock_achievement(&self, owner: &str, kind: AchievementKind, detail: &str) -> Result<bool> {
        let body = json!({
            "user_id": owner,
            "achievement_type": kind.tag(),
            "description": detail,
        });
        let rows: Vec<AchievementRow> = self
            .insert("achievements", &body, Some("user_id,achievement_type"))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn list_achievements(&self, owner: &str) -> Result<Vec<Achievement>> {
        let query: Query = vec![
            ("user_id", eq(owner)),
            ("order", "unlocked_at.asc,id.asc".into()),
        ];
        self.select::<AchievementRow>("achievements", &query)
            .await?
            .into_iter()
            .map(AchievementRow::into_achievement)
            .collect()
    }

    async fn get_or_create_settings(&self, owner: &str, default_reminder_time: NaiveTime) -> Result<UserSettings> {
        let body = json!({
            "user_id": owner,
            "language": DEFAULT_LANGUAGE,
            "theme": DEFAULT_THEME,
            "reminder_time": time_json(default_reminder_time),
        });
        let _: Vec<SettingsRow> = self.insert("user_settings", &body, Some("user_id")).await?;
        let rows: Vec<SettingsRow> = self
            .select("user_settings", &vec![("user_id", eq(owner))])
            .await?;
        Self::first(rows, "user_settings")?.into_settings(default_reminder_time)
    }

    async fn update_settings(&self, owner: &str, patch: &SettingsPatch) -> Result<bool> {
        let mut fields = Map::new();
        if let Some(language) = &patch.language {
            fields.insert("language".into(), json!(language));
        }
        if let Some(theme) = &patch.theme {
            fields.insert("theme".into(), json!(theme));
        }
        if let Some(time) = patch.reminder_time {
            fields.insert("reminder_time".into(), time_json(time));
        }
        if fields.is_empty() {
            return Ok(false);
        }
        let touched = self
            .modify(
                Method::PATCH,
                "user_settings",
                &vec![("user_id", eq(owner))],
                Some(Value::Object(fields)),
            )
            .await?;
        Ok(touched > 0)
    }

    async fn list_settings(&self) -> Result<Vec<UserSettings>> {
        let rows: Vec<SettingsRow> = self
            .select("user_settings", &vec![("order", "user_id.asc".to_string())])
            .await?;
        let fallback = fallback_reminder_time()?;
        let mut settings = Vec::with_capacity(rows.len());
        for row in rows {
            let owner = row.user_id.clone();
            match row.into_settings(fallback) {
                Ok(s) => settings.push(s),
                Err(e) => warn!("Skipping unreadable settings for {}: {}", owner, e),
            }
        }
        Ok(settings)
    }

    async fn clear_user_data(&self, owner: &str) -> Result<()> {
        let query: Query = vec![("user_id", eq(owner))];
        for table in ["schedule", "homework", "notes"] {
            self.modify(Method::DELETE, table, &query, None).await?;
        }
        info!("Cleared schedule, homework and notes for {}", owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_date_for_weekday() {
        // 2030-01-09 is a Wednesday
        let wednesday = date(2030, 1, 9);
        assert_eq!(next_date_for(Weekday::Wed, wednesday), wednesday);
        assert_eq!(next_date_for(Weekday::Thu, wednesday), date(2030, 1, 10));
        assert_eq!(next_date_for(Weekday::Mon, wednesday), date(2030, 1, 14));
        assert_eq!(next_date_for(Weekday::Tue, wednesday), date(2030, 1, 15));
    }

    #[test]
    fn test_homework_row_maps_hw_to_task() {
        let row: HomeworkRow = serde_json::from_value(json!({
            "id": 7,
            "user_id": "42",
            "subject": "Math",
            "hw": "Exercises 1-5",
            "deadline": "2030-01-10",
            "created_at": "2030-01-01T10:00:00.123456+00:00"
        }))
        .unwrap();
        let entry = row.into_entry();
        assert_eq!(entry.task, "Exercises 1-5");
        assert_eq!(entry.deadline, Some(date(2030, 1, 10)));
        assert!(!entry.completed);
    }

    #[test]
    fn test_homework_row_without_deadline_or_timestamp() {
        let row: HomeworkRow = serde_json::from_value(json!({
            "id": 1,
            "user_id": "42",
            "subject": "Art",
            "hw": "Sketch",
            "deadline": null,
            "created_at": null
        }))
        .unwrap();
        assert_eq!(row.into_entry().deadline, None);
    }

    #[test]
    fn test_schedule_row_accepts_seconds() {
        let row: ScheduleRow = serde_json::from_value(json!({
            "id": 3,
            "user_id": "42",
            "date": "2030-01-07",
            "subject": "Physics",
            "time": "09:30:00",
            "room": null,
            "created_at": "2030-01-01T10:00:00+03:00"
        }))
        .unwrap();
        let entry = row.into_entry().unwrap();
        assert_eq!(entry.slot, ScheduleSlot::Dated(date(2030, 1, 7)));
        assert_eq!(entry.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn test_settings_row_defaults() {
        let row: SettingsRow = serde_json::from_value(json!({
            "user_id": "42",
            "language": null,
            "theme": "dark",
            "reminder_time": null,
            "created_at": null
        }))
        .unwrap();
        let settings = row.into_settings(NaiveTime::from_hms_opt(7, 0, 0).unwrap()).unwrap();
        assert_eq!(settings.language, DEFAULT_LANGUAGE);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.reminder_time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
    }

    #[test]
    fn test_rest_url_normalised() {
        let store = SupabaseStore::new("https://demo.supabase.co/", "key").unwrap();
        assert_eq!(store.rest_url, "https://demo.supabase.co/rest/v1");
    }
}
