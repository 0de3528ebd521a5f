//! Error types for the connected apps service.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

/// Errors from the provider (token endpoint) client.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the request (invalid code, bad credentials, ...)
    #[error("Provider rejected the request ({status}): {error}{}", suffix(.description))]
    Rejected {
        /// HTTP status code
        status: u16,
        /// OAuth2 error code (`invalid_grant`, `invalid_client`, ...)
        error: String,
        /// Human readable description from the provider
        description: Option<String>,
    },

    /// Token response could not be parsed
    #[error("Failed to parse token response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL is not usable
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn suffix(description: &Option<String>) -> String {
    description.as_deref().map(|d| format!(" - {d}")).unwrap_or_default()
}

impl ClientError {
    /// Create a rejected error from a provider error response.
    #[must_use]
    pub fn rejected(status: u16, error: impl Into<String>, description: Option<String>) -> Self {
        Self::Rejected { status, error: error.into(), description }
    }

    /// Returns true if the provider refused the grant itself, as opposed to a
    /// transport or parsing failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Errors from the persistence layer.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    /// Another writer saved the record first
    #[error("Record {name} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        /// Record name
        name: String,
        /// Version the writer started from
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Backend unavailable or failed
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the OAuth2 flows. Each one terminates the current
/// request with a descriptive message.
#[derive(thiserror::Error, Debug)]
pub enum AuthFlowError {
    /// Guest or anonymous subject
    #[error("Log in to access this page.")]
    NotAuthenticated,

    /// Logged in, but not allowed to perform this operation
    #[error("Not permitted")]
    PermissionDenied,

    /// Malformed callback path or missing request parameters
    #[error("Invalid Parameter(s): {0}")]
    InvalidParameters(String),

    /// No token cache row waiting for this callback
    #[error("State Not Found")]
    StateNotFound,

    /// Inbound state nonce does not match the stored one
    #[error("Invalid State")]
    InvalidState,

    /// No connected app with this id
    #[error("Invalid App: {0}")]
    UnknownApp(String),

    /// No access token stored
    #[error("No access token stored for {0}")]
    TokenNotFound(String),

    /// Token expired and could not be renewed without user interaction
    #[error("Token for {0} has expired")]
    TokenExpired(String),

    /// Stored access token cannot be used as a header value
    #[error("Stored access token for {0} is not a valid header value")]
    MalformedToken(String),

    /// Token endpoint rejected the exchange or could not be reached
    #[error("Token exchange failed: {0}")]
    ProviderExchange(#[from] ClientError),

    /// Connected app settings are invalid
    #[error("Invalid connected app configuration: {0}")]
    InvalidConfig(String),

    /// Callback called with anything but GET
    #[error("Invalid Method")]
    InvalidMethod,

    /// Persistence failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuthFlowError {
    /// Create an invalid parameters error.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Short machine readable code used in API error bodies.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidParameters(_) => "invalid_parameters",
            Self::StateNotFound => "state_not_found",
            Self::InvalidState => "invalid_state",
            Self::UnknownApp(_) => "unknown_app",
            Self::TokenNotFound(_) => "token_not_found",
            Self::TokenExpired(_) => "token_expired",
            Self::MalformedToken(_) => "malformed_token",
            Self::ProviderExchange(_) => "provider_exchange_failed",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidMethod => "invalid_method",
            Self::Repository(RepositoryError::Conflict { .. }) => "conflict",
            Self::Repository(RepositoryError::Unavailable(_)) => "repository_unavailable",
        }
    }
}

/// Result type alias for provider client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for flow operations.
pub type FlowResult<T> = Result<T, AuthFlowError>;
