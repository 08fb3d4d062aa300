//! RPC API module.
//!
//! Every operation is a unary call: `POST /{service}/{Method}` with the request
//! message as a JSON body, answered with the response message or an error
//! envelope.

mod groups;
mod members;
mod reflection;

pub use groups::*;
pub use members::*;
pub use reflection::*;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// Fully qualified name of the RPC service.
pub const SERVICE_NAME: &str = "groupservice.v1.GroupService";

/// Request body extractor that reports undecodable bodies as `INVALID_ARGUMENT`.
///
/// An empty body decodes as the default message, so field-less calls such as
/// `ListGroups` need no payload. A non-empty body must be JSON.
pub struct RpcRequest<T>(pub T);

impl<S, T> FromRequest<S> for RpcRequest<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json_content = has_json_content_type(req.headers());
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;

        if body.is_empty() {
            return Ok(RpcRequest(T::default()));
        }
        if !json_content {
            return Err(AppError::InvalidArgument(
                "Expected request with `Content-Type: application/json`".to_string(),
            ));
        }

        let Json(message) = Json::<T>::from_bytes(&body)?;
        Ok(RpcRequest(message))
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

/// Response type of every RPC handler: the response message XOR a classified error.
pub type RpcResult<T> = Result<Json<T>, AppError>;
