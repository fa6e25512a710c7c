//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::dispatch::DispatchError;
use crate::domain::RequestId;
use crate::store::StoreError;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/blacklist", post(blacklist))
        .route("/whitelist", post(whitelist))
        .route("/booking", post(book))
        .route("/booking/:request_id", delete(cancel_booking))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Parse a JSON body by hand so the body can be logged on failure.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, body = %String::from_utf8_lossy(body), "rejected request body");
        AppError::BadRequest {
            message: format!("Invalid JSON: {e}"),
            field: None,
        }
    })
}

/// Which boarding points are worth asking the whitelist about.
async fn blacklist(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request = parse_body::<BlacklistRequestDto>(&body)?.parse()?;
    let response = state.dispatch.blacklist(request).await?;
    Ok(Json(BlacklistResponseDto::from(response)).into_response())
}

/// Which vehicles could serve a trip at each candidate time.
async fn whitelist(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request = parse_body::<WhitelistRequestDto>(&body)?.parse()?;
    let response = state.dispatch.whitelist(request).await?;
    Ok(Json(WhitelistResponseDto::from(&response)).into_response())
}

/// Book a ride confirmed from an earlier whitelist answer, together with
/// its last mile if there is one.
async fn book(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let legs = parse_body::<BookingRequestDto>(&body)?.parse()?;
    let response = state
        .dispatch
        .book_trip(&legs)
        .await?
        .and_then(|outcomes| BookingResponseDto::from_trip(&outcomes))
        .ok_or_else(|| AppError::NotFound {
            message: "No vehicle can serve this ride any more".to_string(),
        })?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Cancel both stops of a booked request.
async fn cancel_booking(
    State(state): State<AppState>,
    Path(request_id): Path<u64>,
) -> Result<StatusCode, AppError> {
    state
        .dispatch
        .store()
        .cancel_request(RequestId(request_id))
        .await
        .map_err(DispatchError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest {
        message: String,
        field: Option<String>,
    },
    NotFound {
        message: String,
    },
    /// The vehicle changed while the request was evaluated; the client may retry.
    Conflict {
        message: String,
    },
    Unavailable {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::BadRequest {
            message: e.message,
            field: Some(e.field),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        let message = e.to_string();
        match e {
            DispatchError::InvalidRequest { field, message } => AppError::BadRequest {
                message,
                field: Some(field),
            },
            DispatchError::Store(StoreError::NotFound { .. }) => AppError::NotFound { message },
            DispatchError::Store(StoreError::Conflict { .. } | StoreError::Stale { .. }) => {
                AppError::Conflict { message }
            }
            DispatchError::Routing(ref r) if r.is_transient() => AppError::Unavailable { message },
            _ => AppError::Internal { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, field) = match self {
            AppError::BadRequest { message, field } => (StatusCode::BAD_REQUEST, message, field),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message, None),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message, None),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message, None),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message, None),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, field = field.as_deref(), "request rejected");
        }

        let body = Json(ErrorResponse {
            error: message,
            field,
        });
        (status, body).into_response()
    }
}
