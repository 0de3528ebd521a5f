//! OAuth2 provider configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ids::AppId;
use super::token_response::normalize_scopes;
use crate::config::defaults;
use crate::error::{AuthFlowError, FlowResult};

/// Normalize a provider name into a URL-safe identifier.
///
/// ASCII letters and digits are kept (lowercased); every run of anything else
/// becomes a single `_`, and separators at either end are dropped.
#[must_use]
pub fn derive_callback_slug(provider_name: &str) -> String {
    let mut slug = String::with_capacity(provider_name.len());
    let mut pending_separator = false;

    for ch in provider_name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Redirect URI registered with the provider: `<host>/<callback path>/<slug>`.
#[must_use]
pub fn compute_redirect_uri(host: &str, callback_slug: &str) -> String {
    format!("{}/{}/{}", host.trim_end_matches('/'), defaults::CALLBACK_PATH, callback_slug)
}

/// Provider settings as submitted by an administrator.
#[derive(Clone, Deserialize)]
pub struct ConnectedAppSettings {
    pub provider_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl fmt::Debug for ConnectedAppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedAppSettings")
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// A validated OAuth2 provider configuration.
///
/// `name` and `callback` are derived from `provider_name`; `redirect_uri` is
/// derived from the host and the callback. None of them are accepted from
/// callers.
#[derive(Clone, Serialize)]
pub struct ConnectedApp {
    pub name: AppId,
    pub provider_name: String,
    pub callback: String,
    pub client_id: String,
    #[serde(skip)]
    client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl ConnectedApp {
    /// Build and validate an app from submitted settings.
    pub fn from_settings(
        settings: ConnectedAppSettings,
        host: &str,
        allow_insecure_transport: bool,
    ) -> FlowResult<Self> {
        let mut app = Self {
            name: AppId::new(String::new()),
            provider_name: settings.provider_name,
            callback: String::new(),
            client_id: settings.client_id,
            client_secret: settings.client_secret,
            authorization_endpoint: settings.authorization_endpoint,
            token_endpoint: settings.token_endpoint,
            redirect_uri: String::new(),
            scopes: normalize_scopes(settings.scopes),
        };
        app.validate(host, allow_insecure_transport)?;
        Ok(app)
    }

    /// Re-derive the callback slug and redirect URI and check the endpoints.
    ///
    /// Runs on every save so a changed host never leaves a stale redirect URI.
    pub fn validate(&mut self, host: &str, allow_insecure_transport: bool) -> FlowResult<()> {
        let slug = derive_callback_slug(&self.provider_name);
        if slug.is_empty() {
            return Err(AuthFlowError::invalid_config(
                "provider_name must contain at least one letter or digit",
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthFlowError::invalid_config("client_id is required"));
        }

        check_endpoint("authorization_endpoint", &self.authorization_endpoint, allow_insecure_transport)?;
        check_endpoint("token_endpoint", &self.token_endpoint, allow_insecure_transport)?;

        self.redirect_uri = compute_redirect_uri(host, &slug);
        self.name = AppId::new(slug.clone());
        self.callback = slug;
        Ok(())
    }

    /// Redirect URI for the given host, computed fresh.
    #[must_use]
    pub fn redirect_uri_for(&self, host: &str) -> String {
        compute_redirect_uri(host, &self.callback)
    }

    #[must_use]
    pub fn get_scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ConnectedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedApp")
            .field("name", &self.name)
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

fn check_endpoint(field: &str, value: &str, allow_insecure_transport: bool) -> FlowResult<()> {
    let url = Url::parse(value)
        .map_err(|e| AuthFlowError::invalid_config(format!("{field} is not a valid URL: {e}")))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_insecure_transport => Ok(()),
        "http" => Err(AuthFlowError::invalid_config(format!(
            "{field} must use https (insecure transport is disabled)"
        ))),
        other => Err(AuthFlowError::invalid_config(format!("{field} has unsupported scheme {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider_name: &str) -> ConnectedAppSettings {
        ConnectedAppSettings {
            provider_name: provider_name.to_string(),
            client_id: "client-123".to_string(),
            client_secret: "s3cr3t".to_string(),
            authorization_endpoint: "https://accounts.example.com/o/oauth2/auth".to_string(),
            token_endpoint: "https://oauth2.example.com/token".to_string(),
            scopes: vec!["openid".into(), "email".into(), "openid".into()],
        }
    }

    #[test]
    fn test_derive_callback_slug() {
        assert_eq!(derive_callback_slug("Google Drive"), "google_drive");
        assert_eq!(derive_callback_slug("  My-App (v2)  "), "my_app_v2");
        assert_eq!(derive_callback_slug("github"), "github");
        assert_eq!(derive_callback_slug("already_slugged"), "already_slugged");
        assert_eq!(derive_callback_slug("!!!"), "");
    }

    #[test]
    fn test_compute_redirect_uri() {
        assert_eq!(
            compute_redirect_uri("https://erp.example.com/", "google_drive"),
            "https://erp.example.com/api/method/connected_app.callback/google_drive"
        );
    }

    #[test]
    fn test_from_settings_derives_identity() {
        let app = ConnectedApp::from_settings(settings("Google Drive"), "https://erp.example.com", false).unwrap();
        assert_eq!(app.name.as_str(), "google_drive");
        assert_eq!(app.callback, "google_drive");
        assert_eq!(app.redirect_uri, "https://erp.example.com/api/method/connected_app.callback/google_drive");
        assert_eq!(app.get_scopes(), ["openid", "email"]);
    }

    #[test]
    fn test_revalidate_follows_host_change() {
        let mut app = ConnectedApp::from_settings(settings("Google Drive"), "https://old.example.com", false).unwrap();
        app.validate("https://new.example.com", false).unwrap();
        assert!(app.redirect_uri.starts_with("https://new.example.com/"));
        assert_eq!(app.redirect_uri_for("https://other.example.com"), "https://other.example.com/api/method/connected_app.callback/google_drive");
    }

    #[test]
    fn test_insecure_endpoint_rejected_unless_allowed() {
        let mut s = settings("Local");
        s.token_endpoint = "http://localhost:9000/token".to_string();

        let err = ConnectedApp::from_settings(s.clone(), "http://localhost", false).unwrap_err();
        assert!(matches!(err, AuthFlowError::InvalidConfig(_)));

        assert!(ConnectedApp::from_settings(s, "http://localhost", true).is_ok());
    }

    #[test]
    fn test_empty_slug_rejected() {
        let err = ConnectedApp::from_settings(settings("???"), "https://erp.example.com", false).unwrap_err();
        assert!(err.to_string().contains("provider_name"));
    }

    #[test]
    fn test_secret_never_rendered() {
        let app = ConnectedApp::from_settings(settings("Google Drive"), "https://erp.example.com", false).unwrap();
        assert!(!format!("{app:?}").contains("s3cr3t"));
        assert!(!serde_json::to_string(&app).unwrap().contains("s3cr3t"));
        assert_eq!(app.client_secret(), "s3cr3t");
        assert!(!format!("{:?}", settings("x")).contains("s3cr3t"));
    }
}
