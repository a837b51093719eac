use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{Identity, IdentityProvider};
use crate::config::SupabaseConfig;
use crate::error::{Error, Result};

/// Hosted auth API client (`/auth/v1`).
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: Option<String>,
}

impl SupabaseAuth {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    #[must_use]
    pub fn with_client(client: Client, config: &SupabaseConfig) -> Self {
        Self {
            client,
            base_url: format!("{}/auth/v1", config.base_url()),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn verify_token(&self, token: &str) -> Result<Option<Identity>> {
        let resp = self
            .client
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp.json::<Identity>().await?));
        }
        if status.is_client_error() {
            tracing::debug!("Identity provider rejected token: {}", status);
            return Ok(None);
        }

        Err(Error::Upstream {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        })
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let key = self.service_role_key.as_deref().ok_or_else(|| {
            Error::Config("SUPABASE_SERVICE_ROLE_KEY is required to delete accounts".into())
        })?;

        let resp = self
            .client
            .delete(format!(
                "{}/admin/users/{}",
                self.base_url,
                urlencoding::encode(id)
            ))
            .header("apikey", key)
            .bearer_auth(key)
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            status => Err(Error::Upstream {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}
