//! Caller identity, as asserted by the upstream auth middleware.
//!
//! The gateway in front of the daemon authenticates the user and forwards
//! `x-caller-id` and `x-caller-role`. Anything missing or malformed is
//! rejected with 401 before a handler runs.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use qdk_schemas::{Caller, Role};

use crate::api_types::ErrorResponse;

pub const HEADER_CALLER_ID: &str = "x-caller-id";
pub const HEADER_CALLER_ROLE: &str = "x-caller-role";

/// Parse the identity headers. `None` when either is absent or invalid.
pub fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    let id = headers.get(HEADER_CALLER_ID)?.to_str().ok()?;
    let id = Uuid::parse_str(id.trim()).ok()?;
    let role = match headers.get(HEADER_CALLER_ROLE)?.to_str().ok()?.trim() {
        "admin" => Role::Admin,
        "client" => Role::Client,
        _ => return None,
    };
    Some(Caller { id, role })
}

/// Extractor wrapping [`Caller`].
#[derive(Debug, Clone, Copy)]
pub struct AuthCaller(pub Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthCaller {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
            .map(AuthCaller)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        success: false,
                        error: "unauthenticated".to_string(),
                    }),
                )
                    .into_response()
            })
    }
}
