//! Axum router and all HTTP handlers for qdk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers translate between HTTP and `QuoteDesk`; no
//! quote logic lives here.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::{error, info};

use qdk_core::{document_url, ErrorKind, QuoteError};
use qdk_schemas::{CreateQuoteInput, QuoteSummary};

use crate::{
    api_types::{
        ByRequestQuery, ByRequestResponse, CreateQuoteResponse, ErrorResponse, HealthResponse,
        PreviewResponse, QuoteRef, UnconvertedQuery, UnconvertedResponse,
    },
    caller::AuthCaller,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/quotes/from-requests", post(create_from_requests))
        .route("/v1/quotes/requests/unconverted", get(unconverted))
        .route("/v1/quotes/next-number/preview", get(preview_next_number))
        .route("/v1/quotes/admin/by-request/:id", get(admin_by_request))
        .route("/v1/quotes/client/by-request/:id", get(client_by_request))
        .route("/v1/quotes/:numero/document", get(document))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// `QuoteError` as an HTTP response. Unauthorized maps to 404 so that
/// non-admins cannot probe for admin routes or foreign records.
pub struct ApiError(pub QuoteError);

impl From<QuoteError> for ApiError {
    fn from(e: QuoteError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound | ErrorKind::Unauthorized => StatusCode::NOT_FOUND,
        ErrorKind::ValidationFailed | ErrorKind::OwnerMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::CounterUnavailable | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.0.public_message(),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/from-requests
// ---------------------------------------------------------------------------

pub(crate) async fn create_from_requests(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Json(input): Json<CreateQuoteInput>,
) -> Result<Json<CreateQuoteResponse>, ApiError> {
    let created = st.desk.engine.create(&caller, input, Utc::now()).await?;
    // Delivery runs detached.
    drop(created.delivery);

    let quote = created.quote;
    info!(quote_numero = %quote.numero, caller = %caller.id, "quotes/from-requests");
    Ok(Json(CreateQuoteResponse {
        success: true,
        pdf: document_url(st.desk.lookup.public_origin(), &quote.numero),
        quote: QuoteRef {
            id: quote.id,
            numero: quote.numero,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/requests/unconverted
// ---------------------------------------------------------------------------

pub(crate) async fn unconverted(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Query(q): Query<UnconvertedQuery>,
) -> Result<Json<UnconvertedResponse>, ApiError> {
    if !caller.is_admin() {
        return Err(QuoteError::Unauthorized.into());
    }
    let data = st.desk.conversion.unconverted(q.q.as_deref(), q.limit).await?;
    Ok(Json(UnconvertedResponse {
        success: true,
        data,
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/next-number/preview
// ---------------------------------------------------------------------------

pub(crate) async fn preview_next_number(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
) -> Result<Json<PreviewResponse>, ApiError> {
    if !caller.is_admin() {
        return Err(QuoteError::Unauthorized.into());
    }
    let numero = st
        .desk
        .sequences
        .preview_next_quote_number(Utc::now())
        .await?;
    Ok(Json(PreviewResponse {
        success: true,
        numero,
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/{admin,client}/by-request/:id
// ---------------------------------------------------------------------------

fn by_request(found: Result<Option<QuoteSummary>, QuoteError>) -> Result<Json<ByRequestResponse>, ApiError> {
    match found {
        Ok(quote) => Ok(Json(ByRequestResponse {
            success: true,
            exists: quote.is_some(),
            quote,
        })),
        Err(QuoteError::Unauthorized) => Ok(Json(ByRequestResponse {
            success: true,
            exists: false,
            quote: None,
        })),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn admin_by_request(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
    Query(q): Query<ByRequestQuery>,
) -> Result<Json<ByRequestResponse>, ApiError> {
    by_request(
        st.desk
            .lookup
            .find_by_request_admin(&caller, &id, q.numero.as_deref())
            .await,
    )
}

pub(crate) async fn client_by_request(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<String>,
    Query(q): Query<ByRequestQuery>,
) -> Result<Json<ByRequestResponse>, ApiError> {
    by_request(
        st.desk
            .lookup
            .find_by_request_for_caller(&caller, &id, q.numero.as_deref())
            .await,
    )
}

// ---------------------------------------------------------------------------
// GET /v1/quotes/:numero/document
// ---------------------------------------------------------------------------

pub(crate) async fn document(
    State(st): State<Arc<AppState>>,
    AuthCaller(caller): AuthCaller,
    Path(numero): Path<String>,
) -> Result<Response, ApiError> {
    let doc = st.desk.lookup.document(&caller, &numero).await?;
    Ok(([(header::CONTENT_TYPE, doc.content_type)], doc.bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_expected_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::ValidationFailed), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::OwnerMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::CounterUnavailable),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
