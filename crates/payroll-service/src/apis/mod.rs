//! HTTP handlers for the payroll API.
//!
//! Each submodule owns the handlers for one resource and maps the core
//! errors onto `APIError` responses.

pub mod employee;
pub mod links;
pub mod order;
pub mod root;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path};
use payroll_types::APIError;

/// Unwraps a path id, turning a malformed id into a 400.
pub(crate) fn path_id(path: Result<Path<u64>, PathRejection>) -> Result<u64, APIError> {
	path.map(|Path(id)| id).map_err(|rejection| APIError::BadRequest {
		message: rejection.body_text(),
		details: None,
	})
}

/// Unwraps a JSON body, turning a malformed body into a 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	body.map(|Json(value)| value).map_err(|rejection| {
		tracing::debug!("Rejected request body: {}", rejection.body_text());
		APIError::BadRequest {
			message: "Malformed request body".to_string(),
			details: Some(serde_json::Value::String(rejection.body_text())),
		}
	})
}
