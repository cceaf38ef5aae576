use crate::model::{student_key, LogEntry, StudentRecord, DEFAULT_LOG_RETENTION, LOGS_KEY, SETTINGS_KEY, STUDENT_KEY_PREFIX};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DB_FILE: &str = "frontdesk.sqlite3";

/// The store is a single key-value table holding JSON text, mirroring the
/// storage layout of the original front end: `student_<ID>` per record,
/// `attendanceLogs` for the global list, `settings` for configuration.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
        .optional()
        .with_context(|| format!("failed to read key {}", key))
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )
    .with_context(|| format!("failed to write key {}", key))?;
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, text: &str) -> anyhow::Result<T> {
    serde_json::from_str(text).with_context(|| format!("corrupt JSON under key {}", key))
}

pub fn get_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<StudentRecord>> {
    let key = student_key(student_id);
    match kv_get(conn, &key)? {
        Some(text) => Ok(Some(decode(&key, &text)?)),
        None => Ok(None),
    }
}

pub fn upsert_student(conn: &Connection, record: &StudentRecord) -> anyhow::Result<()> {
    let text = serde_json::to_string(record).context("failed to encode student record")?;
    kv_set(conn, &record.storage_key(), &text)
}

/// Every `student_*` record in the store, unordered. Callers sort/filter.
pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<StudentRecord>> {
    let pattern = format!("{}%", STUDENT_KEY_PREFIX.replace('_', "\\_"));
    let mut stmt = conn
        .prepare("SELECT key, value FROM kv WHERE key LIKE ? ESCAPE '\\'")
        .context("failed to prepare student scan")?;
    let rows = stmt
        .query_map([&pattern], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .context("failed to scan student records")?;

    let mut out = Vec::new();
    for row in rows {
        let (key, text) = row.context("failed to read student row")?;
        out.push(decode::<StudentRecord>(&key, &text)?);
    }
    Ok(out)
}

/// The global log list, newest first. A missing key reads as empty.
pub fn read_logs(conn: &Connection) -> anyhow::Result<Vec<LogEntry>> {
    match kv_get(conn, LOGS_KEY)? {
        Some(text) => decode(LOGS_KEY, &text),
        None => Ok(Vec::new()),
    }
}

pub fn write_logs(conn: &Connection, logs: &[LogEntry]) -> anyhow::Result<()> {
    let text = serde_json::to_string(logs).context("failed to encode attendance logs")?;
    kv_set(conn, LOGS_KEY, &text)
}

/// Prepend one entry and trim the list to `retention`, dropping the oldest.
pub fn append_log(conn: &Connection, entry: LogEntry, retention: usize) -> anyhow::Result<()> {
    let mut logs = read_logs(conn)?;
    logs.insert(0, entry);
    logs.truncate(retention.max(1));
    write_logs(conn, &logs)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            log_retention: DEFAULT_LOG_RETENTION,
        }
    }
}

fn default_log_retention() -> usize {
    DEFAULT_LOG_RETENTION
}

pub fn get_settings(conn: &Connection) -> anyhow::Result<Settings> {
    match kv_get(conn, SETTINGS_KEY)? {
        Some(text) => decode(SETTINGS_KEY, &text),
        None => Ok(Settings::default()),
    }
}

pub fn set_settings(conn: &Connection, settings: &Settings) -> anyhow::Result<()> {
    let text = serde_json::to_string(settings).context("failed to encode settings")?;
    kv_set(conn, SETTINGS_KEY, &text)
}
