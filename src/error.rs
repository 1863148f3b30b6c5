use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::{model::leave_request::LeaveStatus, store::StoreError};

/// Outcome kinds of the service layer.
///
/// Clients are expected to resubmit on `Conflict`, fix the request on
/// `InvalidTransition`/`Validation` and give up on `NotFound`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("leave request is {from} and cannot become {to}")]
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::InvalidTransition { .. } => "invalid_transition",
            ServiceError::Validation(_) => "validation",
            ServiceError::Storage(_) => "storage",
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InvalidTransition { .. } | ServiceError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        assert_eq!(
            ServiceError::NotFound("leave request").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Conflict("stale").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InvalidTransition {
                from: LeaveStatus::Approved,
                to: LeaveStatus::Rejected
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Storage(StoreError::TxFinished).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = ServiceError::InvalidTransition {
            from: LeaveStatus::Approved,
            to: LeaveStatus::Rejected,
        };
        assert_eq!(
            err.to_string(),
            "leave request is APPROVED and cannot become REJECTED"
        );
    }

    #[actix_web::test]
    async fn storage_details_are_not_leaked() {
        let err = ServiceError::Storage(StoreError::Decode("users.role = \"X\"".into()));
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "storage");
        assert_eq!(json["message"], "Internal Server Error");
    }
}
