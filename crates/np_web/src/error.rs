use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use np_core::Error;
use serde_json::json;
use tracing::{error, warn};

/// Wraps a core error so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(Error::Validation(message.into()))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError(Error::NotFound(what.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadySubscribed(_) => StatusCode::CONFLICT,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            Error::Validation(msg) | Error::InvalidUrl(msg) => msg.clone(),
            Error::NotFound(what) => format!("{} not found", what),
            Error::AlreadySubscribed(_) => "This email is already on our mailing list".to_string(),
            Error::Unauthorized => "Unauthorized".to_string(),
            _ => "Internal server error".to_string(),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status, self.0);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
