//! HTTP mapping for flow errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{AuthFlowError, RepositoryError};

impl AuthFlowError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidParameters(_) | Self::StateNotFound | Self::InvalidState => StatusCode::BAD_REQUEST,
            Self::UnknownApp(_) | Self::TokenNotFound(_) => StatusCode::NOT_FOUND,
            Self::TokenExpired(_) => StatusCode::UNAUTHORIZED,
            Self::ProviderExchange(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidMethod => StatusCode::METHOD_NOT_ALLOWED,
            Self::Repository(RepositoryError::Conflict { .. }) => StatusCode::CONFLICT,
            Self::Repository(RepositoryError::Unavailable(_)) | Self::MalformedToken(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "message": self.to_string()
            })),
        )
            .into_response()
    }
}
