use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;

/// `Json` body extractor whose rejection is an `ApiError`, so a malformed or
/// mistyped body gets a 400 with a JSON `{"error": ...}` body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> ApiError {
    debug!("Rejected request body ({}): {}", rejection.status(), rejection.body_text());
    ApiError::bad_request("Invalid request body")
}
