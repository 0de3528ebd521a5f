//! Authorization callback: the provider redirects the user back here with
//! `code` and `state`.

use subtle::ConstantTimeEq;

use super::TokenManager;
use crate::config::defaults;
use crate::error::{AuthFlowError, FlowResult};
use crate::models::{AppId, Subject, TokenKey};

/// Per-request identity and path, passed explicitly into the flows.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// User reported by the session layer. `None` or `Guest` is anonymous.
    pub user: Option<String>,
    /// Request path, e.g. `/api/method/connected_app.callback/github`.
    pub path: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(user: Option<String>, path: impl Into<String>) -> Self {
        Self { user, path: path.into() }
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn authenticated_user(&self) -> Option<&str> {
        self.user
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty() && *user != defaults::GUEST_USER)
    }
}

/// App id from `/api/method/connected_app.callback/<app>`.
///
/// # Errors
///
/// Returns `InvalidParameters` unless the path has exactly four segments and
/// a non-empty last one.
pub fn parse_callback_path(path: &str) -> FlowResult<AppId> {
    let segments: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();

    match segments.as_slice() {
        [_, _, _, app] if !app.is_empty() => Ok(AppId::new(*app)),
        _ => Err(AuthFlowError::invalid_parameters(format!("unexpected callback path {path}"))),
    }
}

/// Constant-time state comparison. A missing value on either side never matches.
#[must_use]
pub fn verify_state(stored: Option<&str>, received: Option<&str>) -> bool {
    match (stored, received) {
        (Some(stored), Some(received)) if !stored.is_empty() => {
            stored.as_bytes().ct_eq(received.as_bytes()).into()
        }
        _ => false,
    }
}

impl TokenManager {
    /// Complete the authorization-code flow and return where to send the user.
    ///
    /// Nothing is written unless the state matches and the provider accepts
    /// the code.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `InvalidParameters`, `StateNotFound`,
    /// `InvalidState`, `UnknownApp` or `ProviderExchange`, checked in that
    /// order.
    pub async fn handle_callback(
        &self,
        ctx: &RequestContext,
        code: Option<&str>,
        state: Option<&str>,
    ) -> FlowResult<String> {
        let user = ctx.authenticated_user().ok_or(AuthFlowError::NotAuthenticated)?;
        let app_id = parse_callback_path(&ctx.path)?;
        let subject = Subject::user(user);

        let key = TokenKey::new(app_id.clone(), subject.clone());
        let mut token = self.repo.load_token(&key).await?.ok_or(AuthFlowError::StateNotFound)?;

        if !verify_state(token.state.as_deref(), state) {
            tracing::warn!(app = %app_id, subject = %subject, "Callback state mismatch");
            return Err(AuthFlowError::InvalidState);
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthFlowError::invalid_parameters("missing code"))?;

        let app = self.app(&app_id).await?;
        let redirect_uri = app.redirect_uri_for(self.config.host());
        let response = self.provider.exchange_code(&app, &redirect_uri, code).await?;

        let success_uri = token.success_uri.take();
        token.update_data(response);
        self.repo.save_token(token).await?;

        tracing::info!(app = %app_id, subject = %subject, "Authorization completed");

        Ok(success_uri
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| self.config.default_success_uri.clone()))
    }
}
