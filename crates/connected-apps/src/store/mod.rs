//! Persistence seam for connected apps and token cache rows.

mod memory;

pub use memory::MemoryRepository;

use crate::error::RepositoryResult;
use crate::models::{AppId, ConnectedApp, TokenCache, TokenKey};

/// Storage for connected apps and their token cache rows.
///
/// `save_token` is versioned: a row is written only if its `version` matches
/// the stored one (0 for a new row). On success the stored copy gets the next
/// version and a fresh `modified` stamp, and that copy is returned.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    async fn load_app(&self, id: &AppId) -> RepositoryResult<Option<ConnectedApp>>;

    async fn save_app(&self, app: ConnectedApp) -> RepositoryResult<ConnectedApp>;

    async fn list_apps(&self) -> RepositoryResult<Vec<ConnectedApp>>;

    async fn load_token(&self, key: &TokenKey) -> RepositoryResult<Option<TokenCache>>;

    async fn save_token(&self, token: TokenCache) -> RepositoryResult<TokenCache>;

    async fn token_exists(&self, key: &TokenKey) -> RepositoryResult<bool> {
        Ok(self.load_token(key).await?.is_some())
    }

    /// All rows for one app, any subject.
    async fn list_tokens(&self, app: &AppId) -> RepositoryResult<Vec<TokenCache>>;
}
