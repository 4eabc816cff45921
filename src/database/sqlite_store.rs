//! Local sqlite backend
//!
//! A single connection behind an async mutex. Statements never live across
//! an `.await`; every query runs inside a synchronous closure while the
//! lock is held.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use sqlite::{Connection, State, Statement, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::models::{
    parse_stored_time, Achievement, AchievementKind, HomeworkEntry, HomeworkFilter,
    HomeworkPatch, HomeworkStats, NewHomework, NewNote, NewScheduleEntry, Note, NotePatch,
    RecordId, ScheduleEntry, ScheduleFilter, SchedulePatch, ScheduleSlot, SettingsPatch,
    UserSettings, DATE_FORMAT, DEFAULT_LANGUAGE, DEFAULT_THEME, TIMESTAMP_FORMAT, TIME_FORMAT,
};
use super::DomainStore;
use crate::features::validation::{weekday_from_index, weekday_index};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS schedule (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        day_of_week INTEGER NOT NULL,
        date TEXT,
        subject TEXT NOT NULL,
        time TEXT NOT NULL,
        room TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_schedule_user ON schedule(user_id, day_of_week);

    CREATE TABLE IF NOT EXISTS homework (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        subject TEXT NOT NULL,
        task TEXT NOT NULL,
        deadline TEXT,
        is_completed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_homework_user ON homework(user_id, deadline);

    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);

    CREATE TABLE IF NOT EXISTS achievements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        achievement_type TEXT NOT NULL,
        description TEXT NOT NULL,
        unlocked_at TEXT NOT NULL,
        UNIQUE(user_id, achievement_type)
    );

    CREATE TABLE IF NOT EXISTS user_settings (
        user_id TEXT PRIMARY KEY,
        language TEXT NOT NULL,
        theme TEXT NOT NULL,
        reminder_time TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
";

const SCHEDULE_COLUMNS: &str = "id, user_id, day_of_week, date, subject, time, room, created_at";
const HOMEWORK_COLUMNS: &str = "id, user_id, subject, task, deadline, is_completed, created_at";
const NOTE_COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";
const SETTINGS_COLUMNS: &str = "user_id, language, theme, reminder_time, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = sqlite::open(path).with_context(|| format!("Failed to open {path}"))?;
        Self::from_connection(conn)
    }

    /// Private database that disappears with the store
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(sqlite::open(":memory:")?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA).context("Failed to create schema")?;
        info!("Database schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send,
    {
        let guard = self.conn.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Database connection is closed"))?;
        f(conn)
    }
}

fn now_stamp() -> String {
    Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}

fn text(value: &str) -> Value {
    Value::String(value.to_string())
}

fn opt_text(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn date_value(date: Option<NaiveDate>) -> Value {
    opt_text(date.map(|d| d.format(DATE_FORMAT).to_string()))
}

fn bind_all(st: &mut Statement<'_>, params: Vec<Value>) -> Result<()> {
    for (index, value) in params.into_iter().enumerate() {
        st.bind((index + 1, value))?;
    }
    Ok(())
}

fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
    read: fn(&Statement<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut st = conn.prepare(sql)?;
    bind_all(&mut st, params)?;
    let mut rows = Vec::new();
    while let State::Row = st.next()? {
        rows.push(read(&st)?);
    }
    Ok(rows)
}

fn query_one<T>(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
    read: fn(&Statement<'_>) -> Result<T>,
) -> Result<Option<T>> {
    Ok(query_rows(conn, sql, params, read)?.into_iter().next())
}

fn scalar(conn: &Connection, sql: &str) -> Result<i64> {
    let mut st = conn.prepare(sql)?;
    match st.next()? {
        State::Row => Ok(st.read::<i64, _>(0)?),
        State::Done => Err(anyhow!("No row returned for `{}`", sql)),
    }
}

/// Run a write statement and return the number of affected rows
fn execute(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<i64> {
    let mut st = conn.prepare(sql)?;
    bind_all(&mut st, params)?;
    while st.next()? != State::Done {}
    drop(st);
    scalar(conn, "SELECT changes()")
}

fn insert(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<RecordId> {
    execute(conn, sql, params)?;
    scalar(conn, "SELECT last_insert_rowid()")
}

/// Build `UPDATE table SET a = ?, b = ? WHERE id = ? AND user_id = ?`
fn update_where_owned(
    conn: &Connection,
    table: &str,
    sets: Vec<(&str, Value)>,
    owner: &str,
    id: RecordId,
) -> Result<bool> {
    if sets.is_empty() {
        return Ok(false);
    }
    let clause = sets
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params: Vec<Value> = sets.into_iter().map(|(_, value)| value).collect();
    params.push(Value::Integer(id));
    params.push(text(owner));

    let sql = format!("UPDATE {table} SET {clause} WHERE id = ? AND user_id = ?");
    Ok(execute(conn, &sql, params)? > 0)
}

fn read_timestamp(st: &Statement<'_>, column: &str) -> Result<NaiveDateTime> {
    let raw = st.read::<String, _>(column)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid timestamp in {column}: {raw}"))
}

fn read_date(st: &Statement<'_>, column: &str) -> Result<Option<NaiveDate>> {
    st.read::<Option<String>, _>(column)?
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .with_context(|| format!("Invalid date in {column}: {raw}"))
        })
        .transpose()
}

fn read_schedule(st: &Statement<'_>) -> Result<ScheduleEntry> {
    let day = st.read::<i64, _>("day_of_week")?;
    let slot = match read_date(st, "date")? {
        Some(date) => ScheduleSlot::Dated(date),
        None => ScheduleSlot::Weekly(
            u8::try_from(day)
                .ok()
                .and_then(weekday_from_index)
                .ok_or_else(|| anyhow!("Invalid day_of_week {}", day))?,
        ),
    };
    Ok(ScheduleEntry {
        id: st.read::<i64, _>("id")?,
        owner: st.read::<String, _>("user_id")?,
        slot,
        subject: st.read::<String, _>("subject")?,
        time: parse_stored_time(&st.read::<String, _>("time")?)?,
        room: st.read::<Option<String>, _>("room")?,
        created_at: read_timestamp(st, "created_at")?,
    })
}

fn read_homework(st: &Statement<'_>) -> Result<HomeworkEntry> {
    Ok(HomeworkEntry {
        id: st.read::<i64, _>("id")?,
        owner: st.read::<String, _>("user_id")?,
        subject: st.read::<String, _>("subject")?,
        task: st.read::<String, _>("task")?,
        deadline: read_date(st, "deadline")?,
        completed: st.read::<i64, _>("is_completed")? != 0,
        created_at: read_timestamp(st, "created_at")?,
    })
}

fn read_note(st: &Statement<'_>) -> Result<Note> {
    Ok(Note {
        id: st.read::<i64, _>("id")?,
        owner: st.read::<String, _>("user_id")?,
        title: st.read::<String, _>("title")?,
        content: st.read::<String, _>("content")?,
        created_at: read_timestamp(st, "created_at")?,
        updated_at: read_timestamp(st, "updated_at")?,
    })
}

fn read_achievement(st: &Statement<'_>) -> Result<Achievement> {
    Ok(Achievement {
        id: st.read::<i64, _>("id")?,
        owner: st.read::<String, _>("user_id")?,
        kind: st.read::<String, _>("achievement_type")?.parse()?,
        detail: st.read::<String, _>("description")?,
        unlocked_at: read_timestamp(st, "unlocked_at")?,
    })
}

fn read_settings(st: &Statement<'_>) -> Result<UserSettings> {
    Ok(UserSettings {
        owner: st.read::<String, _>("user_id")?,
        language: st.read::<String, _>("language")?,
        theme: st.read::<String, _>("theme")?,
        reminder_time: parse_stored_time(&st.read::<String, _>("reminder_time")?)?,
        created_at: read_timestamp(st, "created_at")?,
    })
}

fn time_value(time: NaiveTime) -> Value {
    Value::String(time.format(TIME_FORMAT).to_string())
}

#[async_trait]
impl DomainStore for SqliteStore {
    async fn add_schedule(&self, owner: &str, entry: &NewScheduleEntry) -> Result<RecordId> {
        let id = self
            .with_conn(|conn| {
                let date = match entry.slot {
                    ScheduleSlot::Dated(date) => Some(date),
                    ScheduleSlot::Weekly(_) => None,
                };
                insert(
                    conn,
                    "INSERT INTO schedule (user_id, day_of_week, date, subject, time, room, created_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        text(owner),
                        Value::Integer(weekday_index(entry.slot.weekday()) as i64),
                        date_value(date),
                        text(&entry.subject),
                        time_value(entry.time),
                        opt_text(entry.room.clone()),
                        text(&now_stamp()),
                    ],
                )
            })
            .await?;
        debug!("Added schedule entry {} for {}", id, owner);
        Ok(id)
    }

    async fn list_schedule(
        &self,
        owner: &str,
        filter: ScheduleFilter,
    ) -> Result<Vec<ScheduleEntry>> {
        self.with_conn(|conn| match filter {
            ScheduleFilter::All => query_rows(
                conn,
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedule WHERE user_id = ?
                     ORDER BY day_of_week, time, id"
                ),
                vec![text(owner)],
                read_schedule,
            ),
            ScheduleFilter::On(date) => query_rows(
                conn,
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedule WHERE user_id = ?
                     AND ((date IS NULL AND day_of_week = ?) OR date = ?)
                     ORDER BY time, id"
                ),
                vec![
                    text(owner),
                    Value::Integer(crate::features::validation::date_weekday_index(date) as i64),
                    date_value(Some(date)),
                ],
                read_schedule,
            ),
        })
        .await
    }

    async fn get_schedule(&self, owner: &str, id: RecordId) -> Result<Option<ScheduleEntry>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {SCHEDULE_COLUMNS} FROM schedule WHERE id = ? AND user_id = ?"),
                vec![Value::Integer(id), text(owner)],
                read_schedule,
            )
        })
        .await
    }

    async fn update_schedule(
        &self,
        owner: &str,
        id: RecordId,
        patch: &SchedulePatch,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            if let Some(subject) = &patch.subject {
                sets.push(("subject", text(subject)));
            }
            if let Some(time) = patch.time {
                sets.push(("time", time_value(time)));
            }
            if let Some(room) = &patch.room {
                sets.push(("room", opt_text(room.clone())));
            }
            update_where_owned(conn, "schedule", sets, owner, id)
        })
        .await
    }

    async fn delete_schedule(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(execute(
                conn,
                "DELETE FROM schedule WHERE id = ? AND user_id = ?",
                vec![Value::Integer(id), text(owner)],
            )? > 0)
        })
        .await
    }

    async fn add_homework(&self, owner: &str, entry: &NewHomework) -> Result<RecordId> {
        let id = self
            .with_conn(|conn| {
                insert(
                    conn,
                    "INSERT INTO homework (user_id, subject, task, deadline, is_completed, created_at)
                     VALUES (?, ?, ?, ?, 0, ?)",
                    vec![
                        text(owner),
                        text(&entry.subject),
                        text(&entry.task),
                        date_value(entry.deadline),
                        text(&now_stamp()),
                    ],
                )
            })
            .await?;
        debug!("Added homework {} for {}", id, owner);
        Ok(id)
    }

    async fn list_homework(
        &self,
        owner: &str,
        filter: &HomeworkFilter,
    ) -> Result<Vec<HomeworkEntry>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {HOMEWORK_COLUMNS} FROM homework WHERE user_id = ?");
            let mut params = vec![text(owner)];
            if !filter.include_completed {
                sql.push_str(" AND is_completed = 0");
            }
            if let Some(deadline) = filter.deadline {
                sql.push_str(" AND deadline = ?");
                params.push(date_value(Some(deadline)));
            }
            if let Some(subject) = &filter.subject {
                sql.push_str(" AND subject = ? COLLATE NOCASE");
                params.push(text(subject));
            }
            sql.push_str(" ORDER BY deadline IS NULL, deadline, id");
            query_rows(conn, &sql, params, read_homework)
        })
        .await
    }

    async fn get_homework(&self, owner: &str, id: RecordId) -> Result<Option<HomeworkEntry>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {HOMEWORK_COLUMNS} FROM homework WHERE id = ? AND user_id = ?"),
                vec![Value::Integer(id), text(owner)],
                read_homework,
            )
        })
        .await
    }

    async fn update_homework(
        &self,
        owner: &str,
        id: RecordId,
        patch: &HomeworkPatch,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            if let Some(subject) = &patch.subject {
                sets.push(("subject", text(subject)));
            }
            if let Some(task) = &patch.task {
                sets.push(("task", text(task)));
            }
            if let Some(deadline) = patch.deadline {
                sets.push(("deadline", date_value(deadline)));
            }
            update_where_owned(conn, "homework", sets, owner, id)
        })
        .await
    }

    async fn complete_homework(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(execute(
                conn,
                "UPDATE homework SET is_completed = 1
                 WHERE id = ? AND user_id = ? AND is_completed = 0",
                vec![Value::Integer(id), text(owner)],
            )? > 0)
        })
        .await
    }

    async fn delete_homework(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(execute(
                conn,
                "DELETE FROM homework WHERE id = ? AND user_id = ?",
                vec![Value::Integer(id), text(owner)],
            )? > 0)
        })
        .await
    }

    async fn homework_stats(&self, owner: &str) -> Result<HomeworkStats> {
        self.with_conn(|conn| {
            let mut st = conn.prepare(
                "SELECT COUNT(*) AS total, COALESCE(SUM(is_completed), 0) AS done
                 FROM homework WHERE user_id = ?",
            )?;
            st.bind((1, owner))?;
            match st.next()? {
                State::Row => Ok(HomeworkStats {
                    total: st.read::<i64, _>("total")?.max(0) as usize,
                    completed: st.read::<i64, _>("done")?.max(0) as usize,
                }),
                State::Done => Ok(HomeworkStats::default()),
            }
        })
        .await
    }

    async fn add_note(&self, owner: &str, note: &NewNote) -> Result<RecordId> {
        let id = self
            .with_conn(|conn| {
                let now = now_stamp();
                insert(
                    conn,
                    "INSERT INTO notes (user_id, title, content, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                    vec![
                        text(owner),
                        text(&note.title),
                        text(&note.content),
                        text(&now),
                        text(&now),
                    ],
                )
            })
            .await?;
        debug!("Added note {} for {}", id, owner);
        Ok(id)
    }

    async fn list_notes(&self, owner: &str) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            query_rows(
                conn,
                &format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ?
                     ORDER BY updated_at DESC, id DESC"
                ),
                vec![text(owner)],
                read_note,
            )
        })
        .await
    }

    async fn get_note(&self, owner: &str, id: RecordId) -> Result<Option<Note>> {
        self.with_conn(|conn| {
            query_one(
                conn,
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND user_id = ?"),
                vec![Value::Integer(id), text(owner)],
                read_note,
            )
        })
        .await
    }

    async fn update_note(&self, owner: &str, id: RecordId, patch: &NotePatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            if let Some(title) = &patch.title {
                sets.push(("title", text(title)));
            }
            if let Some(content) = &patch.content {
                sets.push(("content", text(content)));
            }
            sets.push(("updated_at", text(&now_stamp())));
            update_where_owned(conn, "notes", sets, owner, id)
        })
        .await
    }

    async fn delete_note(&self, owner: &str, id: RecordId) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(execute(
                conn,
                "DELETE FROM notes WHERE id = ? AND user_id = ?",
                vec![Value::Integer(id), text(owner)],
            )? > 0)
        })
        .await
    }

    async fn search_notes(&self, owner: &str, query: &str) -> Result<Vec<Note>> {
        // sqlite's LIKE folds ASCII only, so matching happens here
        let needle = query.to_lowercase();
        let notes = self.list_notes(owner).await?;
        Ok(notes.into_iter().filter(|note| note.matches(&needle)).collect())
    }

    async fn unlock_achievement(
        &self,
        owner: &str,
        kind: AchievementKind,
        detail: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(execute(
                conn,
                "INSERT OR IGNORE INTO achievements (user_id, achievement_type, description, unlocked_at)
                 VALUES (?, ?, ?, ?)",
                vec![text(owner), text(kind.tag()), text(detail), text(&now_stamp())],
            )? > 0)
        })
        .await
    }

    async fn list_achievements(&self, owner: &str) -> Result<Vec<Achievement>> {
        self.with_conn(|conn| {
            query_rows(
                conn,
                "SELECT id, user_id, achievement_type, description, unlocked_at
                 FROM achievements WHERE user_id = ? ORDER BY unlocked_at, id",
                vec![text(owner)],
                read_achievement,
            )
        })
        .await
    }

    async fn get_or_create_settings(
        &self,
        owner: &str,
        default_reminder_time: NaiveTime,
    ) -> Result<UserSettings> {
        self.with_conn(|conn| {
            execute(
                conn,
                "INSERT OR IGNORE INTO user_settings (user_id, language, theme, reminder_time, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                vec![
                    text(owner),
                    text(DEFAULT_LANGUAGE),
                    text(DEFAULT_THEME),
                    time_value(default_reminder_time),
                    text(&now_stamp()),
                ],
            )?;
            query_one(
                conn,
                &format!("SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE user_id = ?"),
                vec![text(owner)],
                read_settings,
            )?
            .ok_or_else(|| anyhow!("Settings for {} vanished after insert", owner))
        })
        .await
    }

    async fn update_settings(&self, owner: &str, patch: &SettingsPatch) -> Result<bool> {
        self.with_conn(|conn| {
            let mut params = Vec::new();
            let mut clauses = Vec::new();
            if let Some(language) = &patch.language {
                clauses.push("language = ?");
                params.push(text(language));
            }
            if let Some(theme) = &patch.theme {
                clauses.push("theme = ?");
                params.push(text(theme));
            }
            if let Some(time) = patch.reminder_time {
                clauses.push("reminder_time = ?");
                params.push(time_value(time));
            }
            if clauses.is_empty() {
                return Ok(false);
            }
            params.push(text(owner));
            let sql = format!(
                "UPDATE user_settings SET {} WHERE user_id = ?",
                clauses.join(", ")
            );
            Ok(execute(conn, &sql, params)? > 0)
        })
        .await
    }

    async fn list_settings(&self) -> Result<Vec<UserSettings>> {
        self.with_conn(|conn| {
            query_rows(
                conn,
                &format!("SELECT {SETTINGS_COLUMNS} FROM user_settings ORDER BY user_id"),
                Vec::new(),
                read_settings,
            )
        })
        .await
    }

    async fn clear_user_data(&self, owner: &str) -> Result<()> {
        self.with_conn(|conn| {
            for table in ["schedule", "homework", "notes"] {
                execute(
                    conn,
                    &format!("DELETE FROM {table} WHERE user_id = ?"),
                    vec![text(owner)],
                )?;
            }
            Ok(())
        })
        .await?;
        info!("Cleared schedule, homework and notes for {}", owner);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.conn.lock().await.take().is_some() {
            info!("Database connection closed");
        }
        Ok(())
    }
}
