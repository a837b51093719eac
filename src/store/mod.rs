mod postgrest;
pub mod rows;
mod schema;
mod sqlite;

pub use postgrest::PostgrestStore;
pub use sqlite::{NewHistory, NewScenario, SqliteStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the row-store interface.
///
/// Every tracker operation takes the owning user id alongside the tracker id;
/// a row owned by someone else behaves exactly like a missing one.
#[async_trait]
pub trait Store: Send + Sync {
    // User operations
    async fn create_user(&self, external_id: &str, email: Option<&str>) -> Result<User>;
    async fn get_user_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
    async fn delete_user(&self, id: i64) -> Result<bool>;

    // Tracker operations
    async fn list_trackers(&self, user_id: i64) -> Result<Vec<Tracker>>;
    async fn get_tracker(&self, id: i64, user_id: i64) -> Result<Option<Tracker>>;
    async fn create_tracker(
        &self,
        user_id: i64,
        tracker: &NewTracker,
        created_at: DateTime<Utc>,
    ) -> Result<Tracker>;
    /// Returns `None` when no tracker with that id belongs to the user.
    async fn update_tracker(
        &self,
        id: i64,
        user_id: i64,
        patch: &TrackerPatch,
    ) -> Result<Option<Tracker>>;
    async fn delete_tracker(&self, id: i64, user_id: i64) -> Result<bool>;
    async fn delete_user_trackers(&self, user_id: i64) -> Result<u64>;

    // History operations
    async fn list_tracker_histories(&self, tracker_id: i64) -> Result<Vec<History>>;
    async fn delete_tracker_histories(&self, tracker_id: i64) -> Result<u64>;
    async fn delete_user_histories(&self, user_id: i64) -> Result<u64>;

    // Scenario operations
    async fn list_scenarios(&self) -> Result<Vec<Scenario>>;
    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>>;
}
