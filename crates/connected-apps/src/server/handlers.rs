//! Endpoint handlers.
//!
//! The authenticated user comes from [`RequestContext`]; every endpoint but
//! the health check refuses guests. Administration and application tokens
//! are limited to `Config::admin_users`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::transport::HttpState;
use crate::error::AuthFlowError;
use crate::flows::{RequestContext, UserToken};
use crate::models::{AppId, ConnectedAppSettings, Subject};

fn require_user(ctx: &RequestContext) -> Result<Subject, AuthFlowError> {
    ctx.authenticated_user().map(Subject::user).ok_or(AuthFlowError::NotAuthenticated)
}

fn require_admin(state: &HttpState, ctx: &RequestContext) -> Result<(), AuthFlowError> {
    let user = ctx.authenticated_user().ok_or(AuthFlowError::NotAuthenticated)?;
    if state.manager.config().is_admin(user) {
        Ok(())
    } else {
        tracing::warn!(user = %user, path = %ctx.path, "Admin endpoint refused");
        Err(AuthFlowError::PermissionDenied)
    }
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [("Location", location)]).into_response()
}

// ─── Callback ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /api/method/connected_app.callback/{app}`
///
/// Finishes the authorization-code flow and redirects to the stored success URI.
pub async fn handle_callback(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match state
        .manager
        .handle_callback(&ctx, query.code.as_deref(), query.state.as_deref())
        .await
    {
        Ok(target) => redirect(&target),
        Err(err) => err.into_response(),
    }
}

/// Any method but GET on the callback route.
pub async fn handle_invalid_method() -> Response {
    AuthFlowError::InvalidMethod.into_response()
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserTokenQuery {
    pub success_uri: Option<String>,
}

/// `GET /api/connected-apps/{app}/token`
///
/// The caller's token as JSON, or a redirect to the provider when the caller
/// has to authorize first.
pub async fn handle_user_token(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
    Path(app): Path<String>,
    Query(query): Query<UserTokenQuery>,
) -> Result<Response, AuthFlowError> {
    let subject = require_user(&ctx)?;
    let app = AppId::new(app);

    let outcome = state
        .manager
        .get_user_token(&app, &subject, query.success_uri.as_deref())
        .await?;

    Ok(match outcome {
        UserToken::Token(token) => Json(token.get_json_at(state.manager.clock().now())).into_response(),
        UserToken::Redirect(url) => redirect(&url),
    })
}

/// `GET /api/connected-apps/{app}/client-token`
///
/// Admins only: the application token is not scoped to the caller.
pub async fn handle_client_token(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
    Path(app): Path<String>,
) -> Result<Response, AuthFlowError> {
    require_admin(&state, &ctx)?;

    let token = state.manager.get_client_token(&AppId::new(app)).await?;
    Ok(Json(token.get_json_at(state.manager.clock().now())).into_response())
}

// ─── Administration ──────────────────────────────────────────────────────────

/// `POST /api/connected-apps`
///
/// Create or replace a connected app. The response never contains the secret.
pub async fn handle_save_app(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
    Json(settings): Json<ConnectedAppSettings>,
) -> Result<Response, AuthFlowError> {
    require_admin(&state, &ctx)?;

    let app = state.manager.register_app(settings).await?;
    Ok(Json(app).into_response())
}

/// `GET /api/connected-apps`
pub async fn handle_list_apps(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
) -> Result<Response, AuthFlowError> {
    require_admin(&state, &ctx)?;

    let apps = state.manager.list_apps().await?;
    Ok(Json(apps).into_response())
}

/// `GET /api/connected-apps/{app}`
pub async fn handle_get_app(
    State(state): State<Arc<HttpState>>,
    ctx: RequestContext,
    Path(app): Path<String>,
) -> Result<Response, AuthFlowError> {
    require_admin(&state, &ctx)?;

    let app = state.manager.app(&AppId::new(app)).await?;
    Ok(Json(app).into_response())
}
