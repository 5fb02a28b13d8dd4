use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;

/// JSON request body whose failures render as [`AppError`].
///
/// The Content-Type header is not checked. An empty body is read as
/// `T::default()` so that missing fields surface as validation errors.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "request body unreadable");
            AppError::BadRequest("Unreadable request body".into())
        })?;
        parse(&bytes).map(JsonBody)
    }
}

fn parse<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(error = %e, "malformed json body");
        AppError::BadRequest("Malformed JSON body".into())
    })
}
