//! Employee endpoints.

use crate::apis::links::{Collection, Resource};
use crate::apis::{json_body, path_id};
use crate::server::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use payroll_core::EmployeeError;
use payroll_types::{APIError, Employee, EmployeeRequest};

type Created = (StatusCode, [(header::HeaderName, String); 1], Json<Resource<Employee>>);

fn to_api_error(err: EmployeeError) -> APIError {
	match err {
		EmployeeError::NotFound(_) => {
			tracing::warn!("{}", err);
			APIError::NotFound {
				message: err.to_string(),
			}
		},
		EmployeeError::Storage(_) => {
			tracing::error!(error = %err, "Employee request failed");
			APIError::InternalServerError {
				message: "Internal server error".to_string(),
			}
		},
	}
}

fn created(state: &AppState, employee: Employee) -> Created {
	let resource = state.links.employee(employee);
	let location = resource
		.self_link()
		.map(|link| link.href.clone())
		.unwrap_or_default();
	(StatusCode::CREATED, [(header::LOCATION, location)], Json(resource))
}

/// Handles GET /employees requests.
pub async fn list_employees(
	State(state): State<AppState>,
) -> Result<Json<Collection<Resource<Employee>>>, APIError> {
	let employees = state.engine.employees().list().await.map_err(to_api_error)?;
	Ok(Json(state.links.employees(employees)))
}

/// Handles GET /employees/{id} requests.
pub async fn get_employee(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Resource<Employee>>, APIError> {
	let id = path_id(id)?;
	let employee = state.engine.employees().get(id).await.map_err(to_api_error)?;
	Ok(Json(state.links.employee(employee)))
}

/// Handles POST /employees requests.
pub async fn create_employee(
	State(state): State<AppState>,
	body: Result<Json<EmployeeRequest>, JsonRejection>,
) -> Result<Created, APIError> {
	let request = json_body(body)?;
	let employee = state
		.engine
		.employees()
		.create(request)
		.await
		.map_err(to_api_error)?;
	Ok(created(&state, employee))
}

/// Handles PUT /employees/{id} requests.
///
/// Replaces the employee, or creates it under the given id if absent.
pub async fn replace_employee(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
	body: Result<Json<EmployeeRequest>, JsonRejection>,
) -> Result<Created, APIError> {
	let id = path_id(id)?;
	let request = json_body(body)?;
	let employee = state
		.engine
		.employees()
		.replace(id, request)
		.await
		.map_err(to_api_error)?;
	Ok(created(&state, employee))
}

/// Handles DELETE /employees/{id} requests.
pub async fn delete_employee(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, APIError> {
	let id = path_id(id)?;
	state.engine.employees().delete(id).await.map_err(to_api_error)?;
	Ok(StatusCode::NO_CONTENT)
}
