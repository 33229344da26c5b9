use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use lendlock_core::types::{Outcome, MAX_DUE_AT};
use lendlock_core::CoordinatorError;

// ─── Validation Helpers ─────────────────────────────────────────────────────

fn required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(())
    }
}

fn due_at_in_range(due_at: u64) -> Result<(), String> {
    if due_at == 0 {
        return Err("due_at must be greater than 0".to_string());
    }
    if due_at > MAX_DUE_AT {
        return Err(format!("due_at must not exceed {}", MAX_DUE_AT));
    }
    Ok(())
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub title: String,
    pub author: String,
}

impl AddItemRequest {
    pub fn validate(&self) -> Result<(), String> {
        required("title", &self.title)?;
        required("author", &self.author)
    }
}

#[derive(Deserialize)]
pub struct ItemsQuery {
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterHolderRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ReserveRequest {
    pub holder: String,
    pub item_id: String,
    pub item_title: String,
    /// Unix ms; the configured loan period applies when absent.
    pub due_at: Option<u64>,
}

impl ReserveRequest {
    pub fn validate(&self) -> Result<(), String> {
        required("holder", &self.holder)?;
        required("item_id", &self.item_id)?;
        required("item_title", &self.item_title)?;
        self.due_at.map_or(Ok(()), due_at_in_range)
    }
}

#[derive(Deserialize)]
pub struct ReleaseQuery {
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct ProlongRequest {
    pub due_at: u64,
}

impl ProlongRequest {
    pub fn validate(&self) -> Result<(), String> {
        due_at_in_range(self.due_at)
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub max_quota: u32,
}

#[derive(Serialize)]
pub struct HolderResponse {
    pub name: String,
    pub created: bool,
}

/// Body of every reserve/release/prolong answer. `outcome` carries the
/// tagged `status` field; `message` is a human-readable summary.
#[derive(Serialize)]
pub struct OutcomeResponse {
    pub outcome: Outcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

// ─── Status Mapping ─────────────────────────────────────────────────────────

/// Committed answers with `committed`, rejections with 409 and unknown
/// outcomes with 503 so clients know to re-read before retrying.
pub fn outcome_response(
    outcome: Outcome,
    committed: StatusCode,
) -> (StatusCode, Json<ApiResponse<OutcomeResponse>>) {
    let (status, message, retryable) = match &outcome {
        Outcome::Committed => (committed, "committed".to_string(), None),
        Outcome::Rejected { reason } => (
            StatusCode::CONFLICT,
            reason.describe().to_string(),
            Some(reason.is_retryable()),
        ),
        Outcome::Indeterminate { stage, detail } => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("outcome unknown at {}: {}", stage, detail),
            Some(true),
        ),
    };
    let body = OutcomeResponse {
        outcome,
        message,
        retryable,
    };
    let success = status.is_success();
    (
        status,
        Json(ApiResponse {
            success,
            data: Some(body),
            error: None,
        }),
    )
}

// ─── Errors ─────────────────────────────────────────────────────────────────

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        let status = match &err {
            CoordinatorError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::Contended { .. } => StatusCode::CONFLICT,
            CoordinatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::InvariantViolation { .. } => {
                tracing::error!(error = %err, "invariant violation surfaced to client");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve_request(due_at: Option<u64>) -> ReserveRequest {
        ReserveRequest {
            holder: "alice".to_string(),
            item_id: "abc".to_string(),
            item_title: "Dune".to_string(),
            due_at,
        }
    }

    #[test]
    fn reserve_due_at_must_fit_a_stored_row() {
        assert!(reserve_request(None).validate().is_ok());
        assert!(reserve_request(Some(1_700_000_000_000)).validate().is_ok());
        assert!(reserve_request(Some(MAX_DUE_AT)).validate().is_ok());

        assert!(reserve_request(Some(0)).validate().is_err());
        let err = reserve_request(Some(MAX_DUE_AT + 1)).validate().unwrap_err();
        assert!(err.contains("must not exceed"));
        assert!(reserve_request(Some(u64::MAX)).validate().is_err());
    }

    #[test]
    fn prolong_due_at_must_fit_a_stored_row() {
        assert!(ProlongRequest { due_at: MAX_DUE_AT }.validate().is_ok());
        assert!(ProlongRequest { due_at: 0 }.validate().is_err());
        assert!(ProlongRequest { due_at: u64::MAX }.validate().is_err());
    }

    #[test]
    fn missing_fields_are_named() {
        let mut req = reserve_request(None);
        req.item_title = "  ".to_string();
        assert_eq!(req.validate().unwrap_err(), "item_title is required");
    }

    #[test]
    fn refused_request_maps_to_bad_request() {
        let err = ApiError::from(CoordinatorError::InvalidRequest("due_at".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
