//! HTTP handlers for the freight API.
//!
//! Every handler returns `Result<_, ApiError>`; domain errors map onto status
//! codes in one place here.

pub mod orders;
pub mod transitions;
pub mod views;

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use freight_core::{StoreError, TimelineError, TrackingError, TransitionError};
use freight_types::DenyReason;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	BadRequest(String),
	/// The record changed underneath the caller; reload and retry.
	#[error("{0}")]
	Conflict(String),
	/// A create targeted an id that is already taken.
	#[error("{0}")]
	AlreadyExists(String),
	#[error("{0}")]
	Forbidden(String),
	#[error("{0}")]
	Unprocessable(String),
	#[error("{0}")]
	Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: &'static str,
	pub message: String,
}

impl ApiError {
	fn parts(&self) -> (StatusCode, &'static str) {
		match self {
			ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
			ApiError::Conflict(_) => (StatusCode::CONFLICT, "STALE_STATE"),
			ApiError::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
			ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ROLE_NOT_PERMITTED"),
			ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "TRANSITION_DENIED"),
			ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, error) = self.parts();
		if status.is_server_error() {
			tracing::error!(error = %self, "Request failed");
		} else {
			tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
		}
		let body = ErrorResponse {
			error,
			message: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}

impl From<DenyReason> for ApiError {
	fn from(reason: DenyReason) -> Self {
		match reason {
			DenyReason::StaleState => ApiError::Conflict(reason.to_string()),
			DenyReason::RoleNotPermitted => ApiError::Forbidden(reason.to_string()),
			DenyReason::NonMonotonic | DenyReason::InsufficientState => {
				ApiError::Unprocessable(reason.to_string())
			},
		}
	}
}

impl From<TransitionError> for ApiError {
	fn from(e: TransitionError) -> Self {
		match e {
			TransitionError::NotFound { .. } => ApiError::NotFound(e.to_string()),
			TransitionError::Denied(reason) => reason.into(),
			TransitionError::StaleWrite { .. } => ApiError::Conflict(e.to_string()),
			TransitionError::Storage(_) => ApiError::Internal(e.to_string()),
		}
	}
}

impl From<TrackingError> for ApiError {
	fn from(e: TrackingError) -> Self {
		match e {
			TrackingError::NotFound(_) => ApiError::NotFound(e.to_string()),
			TrackingError::Storage(_) => ApiError::Internal(e.to_string()),
		}
	}
}

impl From<TimelineError> for ApiError {
	fn from(e: TimelineError) -> Self {
		match e {
			TimelineError::NotFound(_) => ApiError::NotFound(e.to_string()),
			TimelineError::Storage(_) => ApiError::Internal(e.to_string()),
		}
	}
}

impl From<StoreError> for ApiError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
			StoreError::AlreadyExists { .. } => ApiError::AlreadyExists(e.to_string()),
			StoreError::Invalid(_) => ApiError::Unprocessable(e.to_string()),
			StoreError::Storage(_) => ApiError::Internal(e.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deny_reasons_map_to_distinct_statuses() {
		let status = |reason| ApiError::from(reason).parts().0;
		assert_eq!(status(DenyReason::StaleState), StatusCode::CONFLICT);
		assert_eq!(status(DenyReason::RoleNotPermitted), StatusCode::FORBIDDEN);
		assert_eq!(status(DenyReason::NonMonotonic), StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(status(DenyReason::InsufficientState), StatusCode::UNPROCESSABLE_ENTITY);
	}

	#[test]
	fn test_create_failures_keep_distinct_codes() {
		let taken = ApiError::from(StoreError::AlreadyExists {
			table: freight_types::Table::Orders,
			id: "1".into(),
		});
		assert_eq!(taken.parts(), (StatusCode::CONFLICT, "ALREADY_EXISTS"));

		let invalid = ApiError::from(StoreError::Invalid("early link".into()));
		assert_eq!(invalid.parts().0, StatusCode::UNPROCESSABLE_ENTITY);
	}

	#[test]
	fn test_stale_write_is_conflict() {
		let e = ApiError::from(TransitionError::StaleWrite {
			expected: 4,
			current: 3,
		});
		assert_eq!(e.parts().0, StatusCode::CONFLICT);
	}
}
