use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tracker_api::error::{Error, Result};
use tracker_api::identity::{Identity, IdentityProvider};
use tracker_api::server::{AppState, create_router};
use tracker_api::store::SqliteStore;

pub const ALICE: &str = "alice-token";
pub const BOB: &str = "bob-token";

/// Identity provider that knows a fixed set of tokens and records deletions.
pub struct FakeIdentityProvider {
    tokens: HashMap<String, Identity>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_deletes: bool,
}

impl FakeIdentityProvider {
    pub fn new(fail_deletes: bool) -> Self {
        let tokens = [(ALICE, "auth-alice", "alice@example.com"), (BOB, "auth-bob", "bob@example.com")]
            .into_iter()
            .map(|(token, id, email)| {
                (
                    token.to_string(),
                    Identity {
                        id: id.to_string(),
                        email: Some(email.to_string()),
                    },
                )
            })
            .collect();

        Self {
            tokens,
            deleted: Mutex::new(Vec::new()),
            fail_deletes,
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<Option<Identity>> {
        Ok(self.tokens.get(token).cloned())
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(Error::Upstream {
                status: 500,
                message: "provider unavailable".into(),
            });
        }
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub identity: Arc<FakeIdentityProvider>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_identity(FakeIdentityProvider::new(false))
    }

    pub fn with_identity(identity: FakeIdentityProvider) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("test.db")).expect("open db"));
        store.initialize().expect("initialize schema");
        let identity = Arc::new(identity);

        let state = Arc::new(AppState::new(store.clone(), identity.clone()));

        Self {
            router: create_router(state),
            store,
            identity,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::GET, uri, Some(token), None).await
    }

    /// Provisions the account behind `token` and returns its internal id.
    pub async fn provision(&self, token: &str) -> i64 {
        let resp = self.call(Method::POST, "/user", Some(token), None).await;
        assert!(resp.status.is_success(), "provision failed: {}", resp.status);
        resp.body["id"].as_i64().expect("user id")
    }

    pub async fn create_tracker(&self, token: &str, body: Value) -> Value {
        let resp = self.call(Method::POST, "/trackers", Some(token), Some(body)).await;
        assert_eq!(resp.status, StatusCode::CREATED);
        resp.body
    }
}
