//! OAuth2 provider client.
//!
//! Talks to a connected app's token endpoint:
//! - authorization-code exchange
//! - client-credentials grant
//! - refresh-token grant
//!
//! Token requests are not idempotent (codes are single use, refresh tokens
//! may rotate), so nothing here retries.

mod session;

pub use session::{OAuthSession, generate_state};

use std::fmt;

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::{Config, defaults};
use crate::error::{ClientError, ClientResult};
use crate::models::{ConnectedApp, TokenResponse};

/// Error body defined by RFC 6749 section 5.2.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP client for provider token endpoints.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(defaults::MAX_KEEPALIVE)
            .pool_idle_timeout(defaults::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        Ok(Self { client })
    }

    /// Exchange an authorization code for a token.
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the code or cannot be reached.
    pub async fn exchange_code(
        &self,
        app: &ConnectedApp,
        redirect_uri: &str,
        code: &str,
    ) -> ClientResult<TokenResponse> {
        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("client_id", app.client_id.clone()),
            ("client_secret", app.client_secret().to_string()),
        ];

        self.request_token(&app.token_endpoint, &form).await
    }

    /// Obtain a token for the app itself.
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the credentials or cannot be reached.
    pub async fn client_credentials(&self, app: &ConnectedApp) -> ClientResult<TokenResponse> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", app.client_id.clone()),
            ("client_secret", app.client_secret().to_string()),
        ];
        if !app.get_scopes().is_empty() {
            form.push(("scope", app.get_scopes().join(" ")));
        }

        self.request_token(&app.token_endpoint, &form).await
    }

    /// Trade a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the refresh token or cannot be reached.
    pub async fn refresh(&self, app: &ConnectedApp, refresh_token: &str) -> ClientResult<TokenResponse> {
        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", app.client_id.clone()),
            ("client_secret", app.client_secret().to_string()),
        ];

        self.request_token(&app.token_endpoint, &form).await
    }

    /// POST a form to a token endpoint and parse the response.
    async fn request_token(
        &self,
        endpoint: &str,
        form: &[(&str, String)],
    ) -> ClientResult<TokenResponse> {
        let url = url::Url::parse(endpoint)?;
        let response = self.client.post(url).form(form).send().await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(err) => ClientError::rejected(status.as_u16(), err.error, err.error_description),
                Err(_) => ClientError::rejected(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("error"),
                    None,
                ),
            });
        }

        // Some providers answer 200 with an error body.
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        if value.get("access_token").is_none() {
            if let Ok(err) = serde_json::from_value::<ErrorBody>(value.clone()) {
                return Err(ClientError::rejected(status.as_u16(), err.error, err.error_description));
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::ConnectedAppSettings;

    fn app(server: &MockServer) -> ConnectedApp {
        let settings = ConnectedAppSettings {
            provider_name: "Mock Provider".into(),
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            authorization_endpoint: format!("{}/authorize", server.uri()),
            token_endpoint: format!("{}/token", server.uri()),
            scopes: vec!["read".into(), "write".into()],
        };
        ConnectedApp::from_settings(settings, "http://localhost:8000", true).unwrap()
    }

    fn client() -> ProviderClient {
        ProviderClient::new(&Config::for_testing("http://localhost:8000")).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = app(&server);
        let token = client().exchange_code(&app, &app.redirect_uri, "abc").await.unwrap();
        assert_eq!(token.access_token, "at-1");
        assert_eq!(token.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn test_client_credentials_sends_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=read+write"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "app-token"
            })))
            .mount(&server)
            .await;

        let token = client().client_credentials(&app(&server)).await.unwrap();
        assert_eq!(token.access_token, "app-token");
    }

    #[tokio::test]
    async fn test_rejection_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Code was already redeemed."
            })))
            .mount(&server)
            .await;

        let err = client().refresh(&app(&server), "old").await.unwrap_err();
        match err {
            ClientError::Rejected { status, error, description } => {
                assert_eq!(status, 400);
                assert_eq!(error, "invalid_grant");
                assert_eq!(description.as_deref(), Some("Code was already redeemed."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_body_with_ok_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code"
            })))
            .mount(&server)
            .await;

        let app = app(&server);
        let err = client().exchange_code(&app, &app.redirect_uri, "x").await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_non_json_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client().client_credentials(&app(&server)).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 503, .. }));
    }
}
