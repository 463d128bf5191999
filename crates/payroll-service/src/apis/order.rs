//! Order endpoints.
//!
//! Orders are created `IN_PROGRESS` and can then be completed or cancelled
//! once. A lifecycle action on an order that is no longer in progress is
//! answered with 405.

use crate::apis::links::{Collection, Resource};
use crate::apis::{json_body, path_id};
use crate::server::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use payroll_core::OrderStateError;
use payroll_types::{APIError, Order, OrderRequest};

type OrderResponse = Result<Json<Resource<Order>>, APIError>;

/// Maps an order state error onto the matching API error.
pub(crate) fn to_api_error(err: OrderStateError) -> APIError {
	match err {
		OrderStateError::OrderNotFound(_) => {
			tracing::warn!("{}", err);
			APIError::NotFound {
				message: err.to_string(),
			}
		},
		OrderStateError::InvalidTransition { .. } => {
			tracing::warn!("{}", err);
			APIError::MethodNotAllowed {
				message: err.to_string(),
			}
		},
		OrderStateError::Storage(_) => {
			tracing::error!(error = %err, "Order request failed");
			APIError::InternalServerError {
				message: "Internal server error".to_string(),
			}
		},
	}
}

/// Handles GET /orders requests.
pub async fn list_orders(
	State(state): State<AppState>,
) -> Result<Json<Collection<Resource<Order>>>, APIError> {
	let orders = state
		.engine
		.orders()
		.list_orders()
		.await
		.map_err(to_api_error)?;
	Ok(Json(state.links.orders(orders)))
}

/// Handles GET /orders/{id} requests.
pub async fn get_order(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
) -> OrderResponse {
	let id = path_id(id)?;
	let order = state.engine.orders().get_order(id).await.map_err(to_api_error)?;
	Ok(Json(state.links.order(order)))
}

/// Handles POST /orders requests.
///
/// Responds 201 with a `Location` header pointing at the new order.
pub async fn create_order(
	State(state): State<AppState>,
	body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<Resource<Order>>), APIError> {
	let request = json_body(body)?;
	let order = state
		.engine
		.orders()
		.create_order(&request.description)
		.await
		.map_err(to_api_error)?;

	let resource = state.links.order(order);
	let location = resource
		.self_link()
		.map(|link| link.href.clone())
		.unwrap_or_default();
	Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(resource)))
}

/// Handles DELETE /orders/{id}/cancel requests.
pub async fn cancel_order(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
) -> OrderResponse {
	let id = path_id(id)?;
	let order = state.engine.orders().cancel(id).await.map_err(to_api_error)?;
	Ok(Json(state.links.order(order)))
}

/// Handles PUT /orders/{id}/complete requests.
pub async fn complete_order(
	State(state): State<AppState>,
	id: Result<Path<u64>, PathRejection>,
) -> OrderResponse {
	let id = path_id(id)?;
	let order = state.engine.orders().complete(id).await.map_err(to_api_error)?;
	Ok(Json(state.links.order(order)))
}
