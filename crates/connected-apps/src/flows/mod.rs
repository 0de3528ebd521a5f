//! OAuth2 flow orchestration.
//!
//! [`TokenManager`] ties connected apps, the token cache and the provider
//! client together:
//! - web application flow (authorization code, per user)
//! - backend application flow (client credentials, per app)
//! - validity checks with refresh on expiry
//! - the authorization callback (see [`callback`])

pub mod callback;

pub use callback::{RequestContext, parse_callback_path, verify_state};

use std::sync::Arc;

use crate::client::{OAuthSession, ProviderClient};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{AuthFlowError, FlowResult};
use crate::models::{AppId, ConnectedApp, ConnectedAppSettings, Subject, TokenCache, TokenKey};
use crate::store::Repository;

/// Outcome of [`TokenManager::get_user_token`].
#[derive(Debug, Clone)]
pub enum UserToken {
    /// A usable token.
    Token(TokenCache),
    /// The user has to authorize at this provider URL first.
    Redirect(String),
}

/// Orchestrates token acquisition and renewal for connected apps.
#[derive(Clone)]
pub struct TokenManager {
    repo: Arc<dyn Repository>,
    provider: ProviderClient,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, provider: ProviderClient, config: Config) -> Self {
        Self::with_clock(repo, provider, config, Arc::new(SystemClock))
    }

    /// Evaluate expiry against `clock`. Pass the same clock to the repository.
    #[must_use]
    pub fn with_clock(
        repo: Arc<dyn Repository>,
        provider: ProviderClient,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, provider, config: Arc::new(config), clock }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[must_use]
    pub fn repository(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    /// Validate and store a connected app. An app with the same derived id is
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the settings do not validate.
    pub async fn register_app(&self, settings: ConnectedAppSettings) -> FlowResult<ConnectedApp> {
        let app =
            ConnectedApp::from_settings(settings, self.config.host(), self.config.allow_insecure_transport)?;
        let app = self.repo.save_app(app).await?;
        tracing::info!(app = %app.name, redirect_uri = %app.redirect_uri, "Connected app saved");
        Ok(app)
    }

    /// Look up a connected app.
    ///
    /// # Errors
    ///
    /// Returns `UnknownApp` if no app has this id.
    pub async fn app(&self, id: &AppId) -> FlowResult<ConnectedApp> {
        self.repo
            .load_app(id)
            .await?
            .ok_or_else(|| AuthFlowError::UnknownApp(id.to_string()))
    }

    pub async fn list_apps(&self) -> FlowResult<Vec<ConnectedApp>> {
        Ok(self.repo.list_apps().await?)
    }

    /// Start the authorization-code flow for a user.
    ///
    /// Stores a fresh state nonce and the post-login target on the user's
    /// row and returns the provider URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameters` for the application subject, or a
    /// repository error if the row cannot be saved.
    pub async fn initiate_web_application_flow(
        &self,
        app: &ConnectedApp,
        subject: &Subject,
        success_uri: Option<&str>,
    ) -> FlowResult<String> {
        if subject.is_application() {
            return Err(AuthFlowError::invalid_parameters(
                "the web application flow needs a user subject",
            ));
        }

        let redirect_uri = app.redirect_uri_for(self.config.host());
        let session = OAuthSession::build_authorization_session(&app.client_id, &redirect_uri, app.get_scopes());
        let (authorization_url, state) = session.authorization_url(&app.authorization_endpoint)?;

        let mut token = self.load_or_new(&app.name, subject).await?;
        token.state = Some(state);
        token.success_uri = Some(
            success_uri
                .filter(|uri| !uri.is_empty())
                .unwrap_or(self.config.default_success_uri.as_str())
                .to_string(),
        );
        self.repo.save_token(token).await?;

        tracing::info!(app = %app.name, subject = %subject, "Authorization requested");
        Ok(authorization_url)
    }

    /// Run the client-credentials grant and store the result on the app's row.
    ///
    /// # Errors
    ///
    /// Returns `ProviderExchange` if the provider refuses the credentials.
    pub async fn initiate_backend_application_flow(&self, app: &ConnectedApp) -> FlowResult<TokenCache> {
        let response = self.provider.client_credentials(app).await?;

        let mut token = self.load_or_new(&app.name, &Subject::Application).await?;
        token.update_data(response);
        let token = self.repo.save_token(token).await?;

        tracing::info!(app = %app.name, expires_in = ?token.expires_in, "Application token obtained");
        Ok(token)
    }

    /// Token for a user, or the URL to authorize at when there is none usable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownApp` for an unknown app, or a repository error.
    pub async fn get_user_token(
        &self,
        app_id: &AppId,
        subject: &Subject,
        success_uri: Option<&str>,
    ) -> FlowResult<UserToken> {
        let app = self.app(app_id).await?;
        let key = TokenKey::new(app.name.clone(), subject.clone());

        if let Some(token) = self.repo.load_token(&key).await? {
            match self.check_validity(&app, token).await {
                Ok(token) => return Ok(UserToken::Token(token)),
                Err(err @ AuthFlowError::Repository(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!(app = %app.name, subject = %subject, error = %err, "Cached token unusable");
                }
            }
        }

        let url = self.initiate_web_application_flow(&app, subject, success_uri).await?;
        Ok(UserToken::Redirect(url))
    }

    /// Token for the app itself, obtained via client credentials when missing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownApp`, `ProviderExchange` or a repository error.
    pub async fn get_client_token(&self, app_id: &AppId) -> FlowResult<TokenCache> {
        let app = self.app(app_id).await?;
        let key = TokenKey::new(app.name.clone(), Subject::Application);

        match self.repo.load_token(&key).await? {
            Some(token) if token.has_access_token() => self.check_validity(&app, token).await,
            _ => {
                tracing::debug!(app = %app.name, "No application token cached");
                self.initiate_backend_application_flow(&app).await
            }
        }
    }

    /// Return `token` if it is still valid, renewing it when possible.
    ///
    /// An expired token is refreshed with its refresh token. An expired
    /// application token without a refresh token, or whose refresh token the
    /// provider rejects, is replaced through the client-credentials grant.
    ///
    /// # Errors
    ///
    /// Returns `TokenNotFound` when there is no access token, `TokenExpired`
    /// when an expired user token cannot be refreshed, or `ProviderExchange`
    /// when the refresh grant fails otherwise (including transport errors).
    pub async fn check_validity(&self, app: &ConnectedApp, mut token: TokenCache) -> FlowResult<TokenCache> {
        if !token.has_access_token() {
            return Err(AuthFlowError::TokenNotFound(token.name()));
        }

        if !token.is_expired_at(self.clock.now()) {
            return Ok(token);
        }

        if let Some(refresh_token) = token.refresh_token.clone() {
            tracing::debug!(app = %app.name, subject = %token.subject, "Refreshing expired token");
            match self.provider.refresh(app, &refresh_token).await {
                Ok(response) => {
                    token.update_data(response);
                    // Providers may omit the refresh token when it does not rotate.
                    if token.refresh_token.is_none() {
                        token.refresh_token = Some(refresh_token);
                    }
                    let token = self.repo.save_token(token).await?;
                    tracing::info!(app = %app.name, subject = %token.subject, "Token refreshed");
                    return Ok(token);
                }
                Err(err) if err.is_rejection() && token.subject.is_application() => {
                    tracing::warn!(app = %app.name, error = %err, "Refresh rejected, requesting new application token");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if token.subject.is_application() {
            return self.initiate_backend_application_flow(app).await;
        }

        Err(AuthFlowError::TokenExpired(token.name()))
    }

    async fn load_or_new(&self, app: &AppId, subject: &Subject) -> FlowResult<TokenCache> {
        let key = TokenKey::new(app.clone(), subject.clone());
        Ok(self
            .repo
            .load_token(&key)
            .await?
            .unwrap_or_else(|| TokenCache::new(app.clone(), subject.clone())))
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
