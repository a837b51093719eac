use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::Store;
use super::rows::{
    HISTORIES, HistoryRow, SCENARIOS, ScenarioRow, TRACKERS, TrackerInsert, TrackerRow, USERS,
    tracker_patch_columns,
};
use crate::config::SupabaseConfig;
use crate::error::{Error, Result};
use crate::types::*;

/// Row store backed by a hosted Postgres REST gateway (`/rest/v1`).
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Error body returned by the gateway on non-2xx responses.
#[derive(Debug, Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Query string for one table request: select, equality filters, ordering.
#[derive(Debug, Default)]
struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    fn select() -> Self {
        Self::default().param("select", "*")
    }

    fn filter() -> Self {
        Self::default()
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    fn eq(self, column: &str, value: impl ToString) -> Self {
        self.param(column, format!("eq.{}", value.to_string()))
    }

    /// Descending order on each column in turn; later columns break ties.
    fn order_desc(self, columns: &[&str]) -> Self {
        let order = columns
            .iter()
            .map(|c| format!("{c}.desc"))
            .collect::<Vec<_>>()
            .join(",");
        self.param("order", order)
    }

    fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl PostgrestStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    #[must_use]
    pub fn with_client(client: Client, config: &SupabaseConfig) -> Self {
        Self {
            client,
            base_url: format!("{}/rest/v1", config.base_url()),
            api_key: config.data_key().to_string(),
        }
    }

    fn url(&self, table: &str, query: &Query) -> String {
        let qs = query.to_query_string();
        if qs.is_empty() {
            format!("{}/{}", self.base_url, table)
        } else {
            format!("{}/{}?{}", self.base_url, table, qs)
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>> {
        let resp = self
            .authorized(self.client.get(self.url(table, query)))
            .send()
            .await?;
        decode(resp).await
    }

    async fn first<T: DeserializeOwned>(&self, table: &str, query: Query) -> Result<Option<T>> {
        let query = query.param("limit", "1");
        Ok(self.rows(table, &query).await?.into_iter().next())
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        let resp = self
            .authorized(self.client.post(self.url(table, &Query::select())))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = decode(resp).await?;
        rows.into_iter().next().ok_or_else(|| Error::Upstream {
            status: 200,
            message: format!("insert into {table} returned no row"),
        })
    }

    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        body: &impl serde::Serialize,
    ) -> Result<Vec<T>> {
        let resp = self
            .authorized(self.client.patch(self.url(table, query)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    /// Deletes matching rows and returns how many were removed.
    async fn delete(&self, table: &str, query: &Query) -> Result<u64> {
        let resp = self
            .authorized(self.client.delete(self.url(table, query)))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = decode(resp).await?;
        Ok(rows.len() as u64)
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        let bytes = resp.bytes().await?;
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<GatewayError>(&text) {
        Ok(err) => {
            let mut message = err.message.unwrap_or_else(|| "request failed".to_string());
            if let Some(code) = err.code {
                message = format!("{code}: {message}");
            }
            if let Some(details) = err.details {
                message = format!("{message} ({details})");
            }
            message
        }
        Err(_) => text,
    };

    Err(Error::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Store for PostgrestStore {
    // User operations

    async fn create_user(&self, external_id: &str, email: Option<&str>) -> Result<User> {
        self.insert(USERS, &json!({ "user_id": external_id, "email": email }))
            .await
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        self.first(USERS, Query::select().eq("user_id", external_id))
            .await
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let removed = self.delete(USERS, &Query::filter().eq("id", id)).await?;
        Ok(removed > 0)
    }

    // Tracker operations

    async fn list_trackers(&self, user_id: i64) -> Result<Vec<Tracker>> {
        let query = Query::select()
            .eq("user_id", user_id)
            .order_desc(&["tracker_id"]);
        let rows: Vec<TrackerRow> = self.rows(TRACKERS, &query).await?;
        Ok(rows.into_iter().map(Tracker::from).collect())
    }

    async fn get_tracker(&self, id: i64, user_id: i64) -> Result<Option<Tracker>> {
        let query = Query::select().eq("tracker_id", id).eq("user_id", user_id);
        let row: Option<TrackerRow> = self.first(TRACKERS, query).await?;
        Ok(row.map(Tracker::from))
    }

    async fn create_tracker(
        &self,
        user_id: i64,
        tracker: &NewTracker,
        created_at: DateTime<Utc>,
    ) -> Result<Tracker> {
        let row: TrackerRow = self
            .insert(TRACKERS, &TrackerInsert::new(user_id, tracker, created_at))
            .await?;
        Ok(row.into())
    }

    async fn update_tracker(
        &self,
        id: i64,
        user_id: i64,
        patch: &TrackerPatch,
    ) -> Result<Option<Tracker>> {
        let columns = tracker_patch_columns(patch)?;
        if columns.is_empty() {
            return self.get_tracker(id, user_id).await;
        }

        let query = Query::select().eq("tracker_id", id).eq("user_id", user_id);
        let rows: Vec<TrackerRow> = self.update(TRACKERS, &query, &columns).await?;
        Ok(rows.into_iter().next().map(Tracker::from))
    }

    async fn delete_tracker(&self, id: i64, user_id: i64) -> Result<bool> {
        let query = Query::filter().eq("tracker_id", id).eq("user_id", user_id);
        Ok(self.delete(TRACKERS, &query).await? > 0)
    }

    async fn delete_user_trackers(&self, user_id: i64) -> Result<u64> {
        self.delete(TRACKERS, &Query::filter().eq("user_id", user_id))
            .await
    }

    // History operations

    async fn list_tracker_histories(&self, tracker_id: i64) -> Result<Vec<History>> {
        let query = Query::default()
            .param(
                "select",
                "history_id,timestamp,tracker_id,user_id,output,summeries",
            )
            .eq("tracker_id", tracker_id)
            .order_desc(&["timestamp", "history_id"]);
        let rows: Vec<HistoryRow> = self.rows(HISTORIES, &query).await?;
        Ok(rows.into_iter().map(History::from).collect())
    }

    async fn delete_tracker_histories(&self, tracker_id: i64) -> Result<u64> {
        self.delete(HISTORIES, &Query::filter().eq("tracker_id", tracker_id))
            .await
    }

    async fn delete_user_histories(&self, user_id: i64) -> Result<u64> {
        self.delete(HISTORIES, &Query::filter().eq("user_id", user_id))
            .await
    }

    // Scenario operations

    async fn list_scenarios(&self) -> Result<Vec<Scenario>> {
        let query = Query::select().order_desc(&["scenario_id"]);
        let rows: Vec<ScenarioRow> = self.rows(SCENARIOS, &query).await?;
        Ok(rows.into_iter().map(Scenario::from).collect())
    }

    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>> {
        let row: Option<ScenarioRow> = self
            .first(SCENARIOS, Query::select().eq("scenario_id", id))
            .await?;
        Ok(row.map(Scenario::from))
    }
}
