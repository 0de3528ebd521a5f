//! In-memory repository.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::Repository;
use crate::clock::{Clock, SystemClock};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{AppId, ConnectedApp, TokenCache, TokenKey};

/// Repository backed by in-process maps.
#[derive(Clone)]
pub struct MemoryRepository {
    apps: Arc<RwLock<HashMap<AppId, ConnectedApp>>>,
    tokens: Arc<RwLock<HashMap<TokenKey, TokenCache>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamp `modified` from the given clock instead of the wall clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            apps: Arc::new(RwLock::new(HashMap::new())),
            tokens: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn load_app(&self, id: &AppId) -> RepositoryResult<Option<ConnectedApp>> {
        Ok(self.apps.read().await.get(id).cloned())
    }

    async fn save_app(&self, app: ConnectedApp) -> RepositoryResult<ConnectedApp> {
        self.apps.write().await.insert(app.name.clone(), app.clone());
        Ok(app)
    }

    async fn list_apps(&self) -> RepositoryResult<Vec<ConnectedApp>> {
        let mut apps: Vec<_> = self.apps.read().await.values().cloned().collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    async fn load_token(&self, key: &TokenKey) -> RepositoryResult<Option<TokenCache>> {
        Ok(self.tokens.read().await.get(key).cloned())
    }

    async fn save_token(&self, mut token: TokenCache) -> RepositoryResult<TokenCache> {
        let key = token.key();
        let mut tokens = self.tokens.write().await;

        let found = tokens.get(&key).map_or(0, |existing| existing.version);
        if found != token.version {
            return Err(RepositoryError::Conflict {
                name: key.name(),
                expected: token.version,
                found,
            });
        }

        token.version += 1;
        token.modified = self.clock.now();
        tokens.insert(key, token.clone());
        Ok(token)
    }

    async fn token_exists(&self, key: &TokenKey) -> RepositoryResult<bool> {
        Ok(self.tokens.read().await.contains_key(key))
    }

    async fn list_tokens(&self, app: &AppId) -> RepositoryResult<Vec<TokenCache>> {
        let tokens = self.tokens.read().await;
        let mut rows: Vec<_> = tokens.values().filter(|t| &t.connected_app == app).cloned().collect();
        rows.sort_by_key(TokenCache::name);
        Ok(rows)
    }
}
