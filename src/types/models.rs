use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A provisioned account, linked to an identity-provider user by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Text,
    Dropdown,
    Number,
    Boolean,
    Date,
    Email,
    Url,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

/// One typed input of a scenario template, or its filled-in counterpart on a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ParameterOption>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub outputs: Option<Value>,
    pub workflow_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub interval: Option<i64>,
    pub time: Option<String>,
    pub parameters: Vec<Parameter>,
    pub actions: Option<Value>,
    #[serde(rename = "isActive")]
    pub is_active: Option<bool>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "scenarioId")]
    pub scenario_id: Option<i64>,
    pub workflow_id: Option<String>,
}

/// A single recorded run of a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub output: Option<String>,
    pub summary: Option<String>,
}

/// Body of a tracker creation request. Anything left out is stored as null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewTracker {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(default)]
    pub actions: Option<Value>,
    #[serde(default, rename = "isActive", alias = "is_active")]
    pub is_active: Option<bool>,
    #[serde(default, rename = "scenarioId", alias = "scenario_id")]
    pub scenario_id: Option<i64>,
    #[serde(default, alias = "workflowId")]
    pub workflow_id: Option<String>,
}

/// Partial tracker update.
///
/// The outer `Option` records whether the field was sent at all; the inner one
/// carries an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrackerPatch {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub interval: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub time: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub parameters: Option<Option<Vec<Parameter>>>,
    #[serde(default, deserialize_with = "present")]
    pub actions: Option<Option<Value>>,
    #[serde(
        default,
        rename = "isActive",
        alias = "is_active",
        deserialize_with = "present"
    )]
    pub is_active: Option<Option<bool>>,
    #[serde(
        default,
        rename = "scenarioId",
        alias = "scenario_id",
        deserialize_with = "present"
    )]
    pub scenario_id: Option<Option<i64>>,
    #[serde(default, alias = "workflowId", deserialize_with = "present")]
    pub workflow_id: Option<Option<String>>,
}

impl TrackerPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.interval.is_none()
            && self.time.is_none()
            && self.parameters.is_none()
            && self.actions.is_none()
            && self.is_active.is_none()
            && self.scenario_id.is_none()
            && self.workflow_id.is_none()
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
