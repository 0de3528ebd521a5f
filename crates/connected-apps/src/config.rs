//! Configuration for the connected apps service.

use std::time::Duration;

use anyhow::Context;

/// Default values and fixed paths.
pub mod defaults {
    use std::time::Duration;

    /// Public address the service is reachable at (used for redirect URIs).
    pub const HOST_URL: &str = "http://localhost:8000";

    /// HTTP listen port.
    pub const PORT: u16 = 8000;

    /// Where users land after a completed authorization when the flow
    /// did not ask for anything else.
    pub const SUCCESS_URI: &str = "/app";

    /// Header carrying the authenticated user, set by the front proxy.
    pub const USER_HEADER: &str = "x-authenticated-user";

    /// User name the session layer reports for anonymous visitors.
    pub const GUEST_USER: &str = "Guest";

    /// Callback route, relative to the host. The app id follows it.
    pub const CALLBACK_PATH: &str = "api/method/connected_app.callback";

    /// Token endpoint request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Keepalive expiry for pooled provider connections.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);

    /// Maximum idle connections kept per provider host.
    pub const MAX_KEEPALIVE: usize = 10;
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this service, e.g. `https://erp.example.com`.
    pub host_url: String,

    /// Fallback post-login redirect target.
    pub default_success_uri: String,

    /// Name of the header that identifies the authenticated user.
    pub user_header: String,

    /// Allow plain `http` provider endpoints (developer mode only).
    pub allow_insecure_transport: bool,

    /// Users allowed to manage connected apps and read application tokens.
    pub admin_users: Vec<String>,

    /// Token endpoint request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Create a configuration for the given public host.
    #[must_use]
    pub fn new(host_url: impl Into<String>) -> Self {
        Self {
            host_url: host_url.into(),
            default_success_uri: defaults::SUCCESS_URI.to_string(),
            user_header: defaults::USER_HEADER.to_string(),
            allow_insecure_transport: false,
            admin_users: Vec::new(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
        }
    }

    /// Create a test configuration that accepts mock (plain http) providers.
    #[must_use]
    pub fn for_testing(host_url: &str) -> Self {
        Self {
            host_url: host_url.to_string(),
            default_success_uri: defaults::SUCCESS_URI.to_string(),
            user_header: defaults::USER_HEADER.to_string(),
            allow_insecure_transport: true,
            admin_users: Vec::new(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a boolean variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let host_url = std::env::var("CONNECTED_APPS_HOST_URL")
            .unwrap_or_else(|_| defaults::HOST_URL.to_string());
        let mut config = Self::new(host_url);

        if let Ok(header) = std::env::var("CONNECTED_APPS_USER_HEADER") {
            config.user_header = header;
        }
        if let Ok(uri) = std::env::var("CONNECTED_APPS_SUCCESS_URI") {
            config.default_success_uri = uri;
        }
        if let Ok(flag) = std::env::var("CONNECTED_APPS_ALLOW_INSECURE") {
            config.allow_insecure_transport = flag
                .parse()
                .with_context(|| format!("CONNECTED_APPS_ALLOW_INSECURE must be true or false, got {flag:?}"))?;
        }

        if let Ok(admins) = std::env::var("CONNECTED_APPS_ADMINS") {
            config.admin_users = parse_user_list(&admins);
        }

        Ok(config)
    }

    /// Whether `user` may administer connected apps.
    #[must_use]
    pub fn is_admin(&self, user: &str) -> bool {
        self.admin_users.iter().any(|admin| admin == user)
    }

    /// Host URL without a trailing slash.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host_url.trim_end_matches('/')
    }
}

/// Split a comma separated user list, dropping blanks.
#[must_use]
pub fn parse_user_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|u| !u.is_empty()).map(str::to_owned).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self::new(defaults::HOST_URL)
    }
}
