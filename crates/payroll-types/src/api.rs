//! API types for the payroll HTTP API.
//!
//! This module defines the JSON error body returned by every failing
//! endpoint and the structured error type that maps onto HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Requested record does not exist (404)
	NotFound { message: String },
	/// Action is not permitted in the record's current state (405)
	MethodNotAllowed { message: String },
	/// Internal server error (500)
	InternalServerError { message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Get the machine-readable error code for this error.
	pub fn error_code(&self) -> &'static str {
		match self {
			APIError::BadRequest { .. } => "BAD_REQUEST",
			APIError::NotFound { .. } => "NOT_FOUND",
			APIError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
			APIError::InternalServerError { .. } => "INTERNAL_ERROR",
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (message, details) = match self {
			APIError::BadRequest { message, details } => (message, details.clone()),
			APIError::NotFound { message }
			| APIError::MethodNotAllowed { message }
			| APIError::InternalServerError { message } => (message, None),
		};

		ErrorResponse {
			error: self.error_code().to_string(),
			message: message.clone(),
			details,
			retry_after: None,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message } => write!(f, "Not Found: {}", message),
			APIError::MethodNotAllowed { message } => write!(f, "Method Not Allowed: {}", message),
			APIError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		(status, Json(self.to_error_response())).into_response()
	}
}
