//! Records and identifiers for connected apps and their cached tokens.

mod connected_app;
mod ids;
mod token_cache;
mod token_response;

pub use connected_app::{ConnectedApp, ConnectedAppSettings, compute_redirect_uri, derive_callback_slug};
pub use ids::{APPLICATION_SUBJECT, AppId, Subject, TokenKey};
pub use token_cache::{TokenCache, TokenJson};
pub use token_response::{ScopeField, TokenResponse, normalize_scopes};
