use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Which row store the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Hosted Postgres reached through its REST gateway.
    #[default]
    Postgrest,
    /// Local SQLite file.
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" => Ok(Self::Postgrest),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("unknown store backend '{other}'"))),
        }
    }
}

/// Connection settings for the hosted database and auth service.
#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    /// Needed for account deletion; also preferred for row access when present.
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Key used for REST gateway calls.
    #[must_use]
    pub fn data_key(&self) -> &str {
        self.service_role_key.as_deref().unwrap_or(&self.anon_key)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origin allowed to call the API with credentials.
    pub app_origin: Option<String>,
    pub store: StoreBackend,
    pub db_path: PathBuf,
    pub supabase: SupabaseConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.supabase.url.trim().is_empty() {
            return Err(Error::Config("SUPABASE_URL is required".into()));
        }
        if !self.supabase.url.starts_with("http://") && !self.supabase.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "SUPABASE_URL must be an http(s) URL, got '{}'",
                self.supabase.url
            )));
        }
        if self.supabase.anon_key.trim().is_empty() {
            return Err(Error::Config("SUPABASE_ANON_KEY is required".into()));
        }
        if let Some(origin) = &self.app_origin {
            if origin.parse::<axum::http::HeaderValue>().is_err() {
                return Err(Error::Config(format!("invalid APP_ORIGIN '{origin}'")));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            app_origin: None,
            store: StoreBackend::default(),
            db_path: PathBuf::from("./data/trackers.db"),
            supabase: SupabaseConfig::default(),
        }
    }
}
