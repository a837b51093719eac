//! # Tracker API
//!
//! HTTP backend for user-owned trackers, the shared scenario catalog and
//! tracker run history. Rows live in hosted Postgres (reached through its REST
//! gateway) or a local SQLite file; authentication is delegated to the hosted
//! identity provider.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracker_api::config::SupabaseConfig;
//! use tracker_api::identity::SupabaseAuth;
//! use tracker_api::server::{AppState, create_router};
//! use tracker_api::store::PostgrestStore;
//!
//! let supabase = SupabaseConfig {
//!     url: "https://project.supabase.co".into(),
//!     anon_key: "anon".into(),
//!     service_role_key: None,
//! };
//! let state = Arc::new(AppState::new(
//!     Arc::new(PostgrestStore::new(&supabase)?),
//!     Arc::new(SupabaseAuth::new(&supabase)?),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `tracker-api` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod server;
pub mod store;
pub mod types;
