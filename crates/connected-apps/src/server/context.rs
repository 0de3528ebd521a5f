//! Request context extraction.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::transport::HttpState;
use crate::flows::RequestContext;

/// Reads the user from the trusted front-proxy header. Never rejects: a
/// missing header yields an anonymous context and the flows decide.
impl FromRequestParts<Arc<HttpState>> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<HttpState>) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(state.manager.config().user_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(Self::new(user, parts.uri.path()))
    }
}
