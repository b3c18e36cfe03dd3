//! JSON envelopes and error responses.
//!
//! Every response body has the shape `{ "success": bool, "message": string,
//! "data": ... }`, with `data` omitted when there is nothing to return.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use carrot_auth::AuthError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::MalformedCredential { .. }) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::InvalidCredential { .. }) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::Configuration { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Auth(err) if err.is_client_error() => err.to_string(),
            // Configuration details stay in the logs.
            Self::Auth(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), %message, "Request rejected");
        }

        let mut headers = HeaderMap::new();
        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }

        let body = ApiResponse::<()> {
            success: false,
            message,
            data: None,
        };

        (status, headers, Json(body)).into_response()
    }
}
