use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Deserialize;
use serde_json::Value;

use super::Store;
use super::rows::{HistoryRow, ScenarioRow, TrackerInsert, TrackerRow, tracker_patch_columns};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const TRACKER_COLUMNS: &str = "tracker_id, user_id, name, description, interval, time, parameters,
     actions, is_active, created_at, scenario_id, workflow_id";

const HISTORY_COLUMNS: &str = "history_id, timestamp, output, summeries, tracker_id, user_id";

const DOCUMENT_COLUMNS: &[&str] = &["parameters", "actions"];

const SCENARIO_COLUMNS: &str = "scenario_id, name, description, parameters, outputs, workflow_id";

/// A catalog entry to load into the local store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub workflow_id: Option<String>,
}

/// A run record to append for a tracker.
#[derive(Debug, Clone)]
pub struct NewHistory {
    pub tracker_id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub output: Option<String>,
    pub summary: Option<String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    pub fn insert_scenario(&self, scenario: &NewScenario) -> Result<Scenario> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scenarios (name, description, parameters, outputs, workflow_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                scenario.name,
                scenario.description,
                serde_json::to_string(&scenario.parameters)?,
                scenario.outputs.as_ref().map(serde_json::to_string).transpose()?,
                scenario.workflow_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        select_scenario(&conn, id)?.ok_or(Error::NotFound)
    }

    pub fn insert_history(&self, history: &NewHistory) -> Result<History> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO histories (timestamp, output, summeries, tracker_id, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format_datetime(&history.timestamp),
                history.output,
                history.summary,
                history.tracker_id,
                history.user_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {HISTORY_COLUMNS} FROM histories WHERE history_id = ?1"),
            params![id],
            history_from_row,
        )
        .map_err(Error::from)
    }
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's datetime('now') format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
}

/// Stored timestamps use millisecond precision, the same as the schema's
/// `strftime('%f')` defaults, so text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_datetime(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn required_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    datetime_column(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        Type::Null,
    ))
}

/// Reads a free-form JSON column. Text written by another tool that is not
/// JSON is kept as a string so the row still loads.
fn document_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.map(|s| serde_json::from_str::<Value>(&s).unwrap_or(Value::String(s))))
}

fn to_json_text<T: serde::Serialize + ?Sized>(value: Option<&T>) -> Result<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

fn sql_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Binds one patched column. Document columns are stored as JSON text, the
/// same as on insert.
fn column_value(column: &str, value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        value if DOCUMENT_COLUMNS.contains(&column) => SqlValue::Text(value.to_string()),
        value => sql_value(value),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        created_at: required_datetime(row, 3)?,
    })
}

fn tracker_from_row(row: &Row<'_>) -> rusqlite::Result<Tracker> {
    Ok(TrackerRow {
        tracker_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        interval: row.get(4)?,
        time: row.get(5)?,
        parameters: document_column(row, 6)?,
        actions: document_column(row, 7)?,
        is_active: row.get(8)?,
        created_at: datetime_column(row, 9)?,
        scenario_id: row.get(10)?,
        workflow_id: row.get(11)?,
    }
    .into())
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    Ok(ScenarioRow {
        scenario_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        parameters: document_column(row, 3)?,
        outputs: document_column(row, 4)?,
        workflow_id: row.get(5)?,
    }
    .into())
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<History> {
    Ok(HistoryRow {
        history_id: row.get(0)?,
        timestamp: required_datetime(row, 1)?,
        output: row.get(2)?,
        summeries: row.get(3)?,
        tracker_id: row.get(4)?,
        user_id: row.get(5)?,
    }
    .into())
}

fn select_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, user_id, email, created_at FROM users WHERE id = ?1",
        params![id],
        user_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn select_tracker(conn: &Connection, id: i64, user_id: i64) -> Result<Option<Tracker>> {
    conn.query_row(
        &format!("SELECT {TRACKER_COLUMNS} FROM trackers WHERE tracker_id = ?1 AND user_id = ?2"),
        params![id, user_id],
        tracker_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn select_scenario(conn: &Connection, id: i64) -> Result<Option<Scenario>> {
    conn.query_row(
        &format!("SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE scenario_id = ?1"),
        params![id],
        scenario_from_row,
    )
    .optional()
    .map_err(Error::from)
}

#[async_trait]
impl Store for SqliteStore {
    // User operations

    async fn create_user(&self, external_id: &str, email: Option<&str>) -> Result<User> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (user_id, email, created_at) VALUES (?1, ?2, ?3)",
            params![external_id, email, format_datetime(&Utc::now())],
        )?;
        let id = conn.last_insert_rowid();
        select_user_by_id(&conn, id)?.ok_or(Error::NotFound)
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, email, created_at FROM users WHERE user_id = ?1",
            params![external_id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Tracker operations

    async fn list_trackers(&self, user_id: i64) -> Result<Vec<Tracker>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACKER_COLUMNS} FROM trackers WHERE user_id = ?1 ORDER BY tracker_id DESC"
        ))?;

        let rows = stmt.query_map(params![user_id], tracker_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn get_tracker(&self, id: i64, user_id: i64) -> Result<Option<Tracker>> {
        select_tracker(&self.conn(), id, user_id)
    }

    async fn create_tracker(
        &self,
        user_id: i64,
        tracker: &NewTracker,
        created_at: DateTime<Utc>,
    ) -> Result<Tracker> {
        let insert = TrackerInsert::new(user_id, tracker, created_at);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO trackers (user_id, name, description, interval, time, parameters,
                                   actions, is_active, created_at, scenario_id, workflow_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                insert.user_id,
                insert.name,
                insert.description,
                insert.interval,
                insert.time,
                to_json_text(insert.parameters)?,
                to_json_text(insert.actions)?,
                insert.is_active,
                format_datetime(&insert.created_at),
                insert.scenario_id,
                insert.workflow_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        select_tracker(&conn, id, user_id)?.ok_or(Error::NotFound)
    }

    async fn update_tracker(
        &self,
        id: i64,
        user_id: i64,
        patch: &TrackerPatch,
    ) -> Result<Option<Tracker>> {
        let columns = tracker_patch_columns(patch)?;
        let conn = self.conn();
        if columns.is_empty() {
            return select_tracker(&conn, id, user_id);
        }

        let assignments: Vec<String> = columns
            .keys()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect();
        let n = columns.len();
        let sql = format!(
            "UPDATE trackers SET {} WHERE tracker_id = ?{} AND user_id = ?{}",
            assignments.join(", "),
            n + 1,
            n + 2
        );

        let mut values: Vec<SqlValue> = columns
            .into_iter()
            .map(|(column, value)| column_value(&column, value))
            .collect();
        values.push(SqlValue::Integer(id));
        values.push(SqlValue::Integer(user_id));

        let rows = conn.execute(&sql, params_from_iter(values))?;
        if rows == 0 {
            return Ok(None);
        }
        select_tracker(&conn, id, user_id)
    }

    async fn delete_tracker(&self, id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM trackers WHERE tracker_id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    async fn delete_user_trackers(&self, user_id: i64) -> Result<u64> {
        let rows = self
            .conn()
            .execute("DELETE FROM trackers WHERE user_id = ?1", params![user_id])?;
        Ok(rows as u64)
    }

    // History operations

    async fn list_tracker_histories(&self, tracker_id: i64) -> Result<Vec<History>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            &format!(
                "SELECT {HISTORY_COLUMNS} FROM histories
                 WHERE tracker_id = ?1 ORDER BY timestamp DESC, history_id DESC"
            ),
        )?;

        let rows = stmt.query_map(params![tracker_id], history_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn delete_tracker_histories(&self, tracker_id: i64) -> Result<u64> {
        let rows = self.conn().execute(
            "DELETE FROM histories WHERE tracker_id = ?1",
            params![tracker_id],
        )?;
        Ok(rows as u64)
    }

    async fn delete_user_histories(&self, user_id: i64) -> Result<u64> {
        let rows = self
            .conn()
            .execute("DELETE FROM histories WHERE user_id = ?1", params![user_id])?;
        Ok(rows as u64)
    }

    // Scenario operations

    async fn list_scenarios(&self) -> Result<Vec<Scenario>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM scenarios ORDER BY scenario_id DESC"
        ))?;

        let rows = stmt.query_map([], scenario_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>> {
        select_scenario(&self.conn(), id)
    }
}
