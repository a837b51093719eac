//! Row shapes as the database stores them, and their translation to API models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{History, NewTracker, Parameter, Scenario, Tracker, TrackerPatch};

pub const USERS: &str = "users";
pub const TRACKERS: &str = "trackers";
pub const SCENARIOS: &str = "scenarios";
pub const HISTORIES: &str = "histories";

/// Decodes a stored `parameters` document.
///
/// The column is free-form JSON that other writers also fill, so a document
/// that is not a parameter list reads as empty instead of failing the row.
pub fn parameters_or_empty(document: Option<Value>, table: &str, id: i64) -> Vec<Parameter> {
    let Some(document) = document.filter(|v| !v.is_null()) else {
        return Vec::new();
    };

    serde_json::from_value(document).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed parameters on {table} row {id}: {e}");
        Vec::new()
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerRow {
    pub tracker_id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub interval: Option<i64>,
    pub time: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    pub actions: Option<Value>,
    pub is_active: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub scenario_id: Option<i64>,
    pub workflow_id: Option<String>,
}

impl From<TrackerRow> for Tracker {
    fn from(row: TrackerRow) -> Self {
        Tracker {
            id: row.tracker_id,
            name: row.name,
            description: row.description,
            interval: row.interval,
            time: row.time,
            parameters: parameters_or_empty(row.parameters, TRACKERS, row.tracker_id),
            actions: row.actions,
            is_active: row.is_active,
            created_at: row.created_at,
            scenario_id: row.scenario_id,
            workflow_id: row.workflow_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerInsert<'a> {
    pub user_id: i64,
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub interval: Option<i64>,
    pub time: Option<&'a str>,
    pub parameters: Option<&'a [Parameter]>,
    pub actions: Option<&'a Value>,
    pub is_active: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub scenario_id: Option<i64>,
    pub workflow_id: Option<&'a str>,
}

impl<'a> TrackerInsert<'a> {
    #[must_use]
    pub fn new(user_id: i64, tracker: &'a NewTracker, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            name: tracker.name.as_deref(),
            description: tracker.description.as_deref(),
            interval: tracker.interval,
            time: tracker.time.as_deref(),
            parameters: tracker.parameters.as_deref(),
            actions: tracker.actions.as_ref(),
            is_active: tracker.is_active,
            created_at,
            scenario_id: tracker.scenario_id,
            workflow_id: tracker.workflow_id.as_deref(),
        }
    }
}

/// Storage-column view of a patch: only the fields that were sent.
pub fn tracker_patch_columns(patch: &TrackerPatch) -> serde_json::Result<Map<String, Value>> {
    fn put<T: Serialize>(
        map: &mut Map<String, Value>,
        column: &str,
        field: &Option<Option<T>>,
    ) -> serde_json::Result<()> {
        if let Some(value) = field {
            map.insert(column.to_string(), serde_json::to_value(value)?);
        }
        Ok(())
    }

    let mut map = Map::new();
    put(&mut map, "name", &patch.name)?;
    put(&mut map, "description", &patch.description)?;
    put(&mut map, "interval", &patch.interval)?;
    put(&mut map, "time", &patch.time)?;
    put(&mut map, "parameters", &patch.parameters)?;
    put(&mut map, "actions", &patch.actions)?;
    put(&mut map, "is_active", &patch.is_active)?;
    put(&mut map, "scenario_id", &patch.scenario_id)?;
    put(&mut map, "workflow_id", &patch.workflow_id)?;
    Ok(map)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub scenario_id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub outputs: Option<Value>,
    pub workflow_id: Option<String>,
}

impl From<ScenarioRow> for Scenario {
    fn from(row: ScenarioRow) -> Self {
        Scenario {
            id: row.scenario_id,
            name: row.name,
            description: row.description,
            parameters: parameters_or_empty(row.parameters, SCENARIOS, row.scenario_id),
            outputs: row.outputs,
            workflow_id: row.workflow_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRow {
    pub history_id: i64,
    pub timestamp: DateTime<Utc>,
    pub output: Option<String>,
    pub summeries: Option<String>,
    pub tracker_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl From<HistoryRow> for History {
    fn from(row: HistoryRow) -> Self {
        History {
            id: row.history_id,
            timestamp: row.timestamp,
            output: row.output,
            summary: row.summeries,
        }
    }
}
