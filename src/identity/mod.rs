//! External identity provider: token verification and account removal.

mod supabase;

pub use supabase::SupabaseAuth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A caller as the identity provider knows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves an access token to its identity. `Ok(None)` means the provider
    /// rejected the token; `Err` means the provider could not be asked.
    async fn verify_token(&self, token: &str) -> Result<Option<Identity>>;

    /// Removes the provider-side account.
    async fn delete_account(&self, id: &str) -> Result<()>;
}
