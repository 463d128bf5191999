//! HTTP server for the payroll API.
//!
//! Builds the route table, attaches the middleware stack and serves it on the
//! configured address until interrupted.

use crate::apis::{employee, links::LinkBuilder, order, root};
use axum::{
	extract::{DefaultBodyLimit, Request},
	http::{HeaderName, HeaderValue, Method},
	routing::{delete, get, put},
	Router,
};
use payroll_config::{ApiConfig, CorsConfig};
use payroll_core::PayrollEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::{
	cors::{Any, CorsLayer},
	normalize_path::{NormalizePath, NormalizePathLayer},
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the payroll engine for processing requests.
	pub engine: Arc<PayrollEngine>,
	/// Hypermedia link assembly.
	pub links: Arc<LinkBuilder>,
}

/// Builds the route table.
pub fn build_router(state: AppState) -> Router {
	Router::new()
		.route("/", get(root::index))
		.route("/orders", get(order::list_orders).post(order::create_order))
		.route("/orders/{id}", get(order::get_order))
		.route("/orders/{id}/cancel", delete(order::cancel_order))
		.route("/orders/{id}/complete", put(order::complete_order))
		.route(
			"/employees",
			get(employee::list_employees).post(employee::create_employee),
		)
		.route(
			"/employees/{id}",
			get(employee::get_employee)
				.put(employee::replace_employee)
				.delete(employee::delete_employee),
		)
		.with_state(state)
}

/// Builds the complete application: routes, middleware and trailing slash
/// normalization.
pub fn build_app(api_config: &ApiConfig, engine: Arc<PayrollEngine>) -> NormalizePath<Router> {
	let state = AppState {
		engine,
		links: Arc::new(LinkBuilder::new(api_config.public_url.as_deref())),
	};

	let router = build_router(state).layer(
		ServiceBuilder::new()
			.layer(TraceLayer::new_for_http())
			.layer(cors_layer(api_config.cors.as_ref()))
			.layer(DefaultBodyLimit::max(api_config.max_request_size)),
	);

	// Must wrap the router so it runs before routing
	NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// Creates the CORS layer from configuration; permissive when unset.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let mut layer = CorsLayer::new();

	layer = if cors.allowed_origins.iter().any(|o| o == "*") {
		layer.allow_origin(Any)
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|origin| match HeaderValue::from_str(origin) {
				Ok(value) => Some(value),
				Err(_) => {
					tracing::warn!("Ignoring invalid CORS origin: {}", origin);
					None
				},
			})
			.collect();
		layer.allow_origin(origins)
	};

	layer = if cors.allowed_headers.iter().any(|h| h == "*") {
		layer.allow_headers(Any)
	} else {
		let headers: Vec<HeaderName> = cors
			.allowed_headers
			.iter()
			.filter_map(|header| HeaderName::from_bytes(header.as_bytes()).ok())
			.collect();
		layer.allow_headers(headers)
	};

	let methods: Vec<Method> = cors
		.allowed_methods
		.iter()
		.filter_map(|method| Method::from_bytes(method.to_uppercase().as_bytes()).ok())
		.collect();
	layer.allow_methods(methods)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<PayrollEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_app(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Payroll API server starting on {}", bind_address);

	axum::serve(
		listener,
		axum::ServiceExt::<Request>::into_make_service(app),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{header, Request as HttpRequest, StatusCode};
	use http_body_util::BodyExt;
	use payroll_config::builders::config::ConfigBuilder;
	use payroll_storage::{implementations::memory::MemoryStorage, StorageService};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn make_app(seed: bool) -> (NormalizePath<Router>, Arc<PayrollEngine>) {
		let api = ApiConfig {
			public_url: Some("http://localhost:8080".to_string()),
			..ApiConfig::default()
		};
		let config = ConfigBuilder::new().api(Some(api.clone())).seed(seed).build();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = Arc::new(PayrollEngine::new(config, storage));
		(build_app(&api, engine.clone()), engine)
	}

	async fn seeded_app() -> NormalizePath<Router> {
		let (app, engine) = make_app(true);
		engine.initialize().await.unwrap();
		app
	}

	async fn call(
		app: NormalizePath<Router>,
		method: &str,
		uri: &str,
		body: Option<Value>,
	) -> (StatusCode, axum::http::HeaderMap, Value) {
		let mut builder = HttpRequest::builder().method(method).uri(uri);
		let body = match body {
			Some(json) => {
				builder = builder.header(header::CONTENT_TYPE, "application/json");
				Body::from(json.to_string())
			},
			None => Body::empty(),
		};

		let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, headers, value)
	}

	#[tokio::test]
	async fn test_root_index_links() {
		let (app, _) = make_app(false);
		let (status, _, body) = call(app, "GET", "/", None).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(
			body,
			json!({
				"_links": {
					"employees": { "href": "http://localhost:8080/employees" },
					"orders": { "href": "http://localhost:8080/orders" }
				}
			})
		);
	}

	#[tokio::test]
	async fn test_create_order_forces_in_progress() {
		let (app, _) = make_app(false);
		let (status, headers, body) = call(
			app,
			"POST",
			"/orders",
			Some(json!({ "description": "iPad", "status": "COMPLETED" })),
		)
		.await;

		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(headers[header::LOCATION], "http://localhost:8080/orders/1");
		assert_eq!(body["status"], "IN_PROGRESS");
		assert_eq!(
			body["_links"]["complete"]["href"],
			"http://localhost:8080/orders/1/complete"
		);
	}

	#[tokio::test]
	async fn test_complete_then_cancel_returns_405() {
		let app = seeded_app().await;

		// Seeded order 1 is the completed MacBook Pro
		let (status, _, body) = call(app, "DELETE", "/orders/1/cancel", None).await;
		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(body["error"], "METHOD_NOT_ALLOWED");
		assert_eq!(
			body["message"],
			"You can't cancel an order that is in the COMPLETED status"
		);
	}

	#[tokio::test]
	async fn test_cancel_then_complete_returns_405() {
		let (app, engine) = make_app(false);
		let order = engine.orders().create_order("iPhone").await.unwrap();

		let (status, _, body) = call(
			app.clone(),
			"DELETE",
			&format!("/orders/{}/cancel", order.id),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "CANCELLED");
		assert!(body["_links"].get("cancel").is_none());

		let (status, _, body) = call(
			app,
			"PUT",
			&format!("/orders/{}/complete", order.id),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
		assert!(body["message"].as_str().unwrap().contains("CANCELLED"));
	}

	#[tokio::test]
	async fn test_unknown_order_returns_404() {
		let (app, _) = make_app(false);

		for (method, uri) in [
			("GET", "/orders/99"),
			("DELETE", "/orders/99/cancel"),
			("PUT", "/orders/99/complete"),
		] {
			let (status, _, body) = call(app.clone(), method, uri, None).await;
			assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
			assert_eq!(body["error"], "NOT_FOUND");
			assert_eq!(body["message"], "Could not find order 99");
		}
	}

	#[tokio::test]
	async fn test_list_orders_with_trailing_slash() {
		let app = seeded_app().await;
		let (status, _, body) = call(app, "GET", "/orders/", None).await;

		assert_eq!(status, StatusCode::OK);
		let orders = body["_embedded"]["orderList"].as_array().unwrap();
		assert_eq!(orders.len(), 2);
		assert_eq!(orders[0]["description"], "MacBook Pro");
		assert_eq!(orders[1]["status"], "IN_PROGRESS");
		assert_eq!(body["_links"]["self"]["href"], "http://localhost:8080/orders");
	}

	#[tokio::test]
	async fn test_empty_collection_has_no_embedded() {
		let (app, _) = make_app(false);
		let (status, _, body) = call(app, "GET", "/employees", None).await;

		assert_eq!(status, StatusCode::OK);
		assert!(body.get("_embedded").is_none());
	}

	#[tokio::test]
	async fn test_employee_crud() {
		let (app, _) = make_app(false);

		let (status, headers, body) = call(
			app.clone(),
			"POST",
			"/employees",
			Some(json!({ "name": "Samwise Gamgee", "role": "gardener" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(headers[header::LOCATION], "http://localhost:8080/employees/1");
		assert_eq!(body["firstName"], "Samwise");
		assert_eq!(body["lastName"], "Gamgee");

		let (status, _, body) = call(
			app.clone(),
			"PUT",
			"/employees/1",
			Some(json!({ "firstName": "Sam", "lastName": "Gamgee", "role": "ring bearer" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["name"], "Sam Gamgee");
		assert_eq!(body["role"], "ring bearer");

		let (status, _, body) = call(app.clone(), "GET", "/employees/1", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["_links"]["self"]["href"], "http://localhost:8080/employees/1");

		let (status, _, _) = call(app.clone(), "DELETE", "/employees/1", None).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, _, body) = call(app, "GET", "/employees/1", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["message"], "Could not find employee 1");
	}

	#[tokio::test]
	async fn test_replace_absent_employee_creates_it() {
		let (app, _) = make_app(false);

		let (status, headers, body) = call(
			app.clone(),
			"PUT",
			"/employees/7",
			Some(json!({ "name": "Gandalf Grey", "role": "wizard" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(headers[header::LOCATION], "http://localhost:8080/employees/7");
		assert_eq!(body["id"], 7);

		let (_, _, body) = call(
			app,
			"POST",
			"/employees",
			Some(json!({ "name": "Frodo Baggins", "role": "thief" })),
		)
		.await;
		assert_eq!(body["id"], 8);
	}

	#[tokio::test]
	async fn test_malformed_body_returns_400() {
		let (app, _) = make_app(false);

		let request = HttpRequest::builder()
			.method("POST")
			.uri("/orders")
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from("{ not json"))
			.unwrap();
		let response = app.clone().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);

		let (status, _, body) = call(app, "GET", "/orders/abc", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");
	}

	#[tokio::test]
	async fn test_unrouted_method_is_rejected() {
		let (app, _) = make_app(false);
		let (status, _, _) = call(app, "GET", "/orders/1/cancel", None).await;
		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
	}

	async fn preflight(app: NormalizePath<Router>, origin: &str) -> axum::http::HeaderMap {
		let request = HttpRequest::builder()
			.method("OPTIONS")
			.uri("/orders")
			.header(header::ORIGIN, origin)
			.header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
			.body(Body::empty())
			.unwrap();

		app.oneshot(request).await.unwrap().headers().clone()
	}

	#[tokio::test]
	async fn test_cors_preflight_honours_configured_origins() {
		let api = ApiConfig {
			cors: Some(CorsConfig {
				allowed_origins: vec!["http://localhost:3000".into(), "not a header\n".into()],
				allowed_headers: vec!["content-type".into()],
				allowed_methods: vec!["get".into(), "POST".into()],
			}),
			..ApiConfig::default()
		};
		let config = ConfigBuilder::new().api(Some(api.clone())).build();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = Arc::new(PayrollEngine::new(config, storage));

		// The malformed origin is skipped and the valid one still applies
		let headers = preflight(build_app(&api, engine.clone()), "http://localhost:3000").await;
		assert_eq!(
			headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
			"http://localhost:3000"
		);
		let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
		assert!(methods.contains("GET"));
		assert!(methods.contains("POST"));

		let headers = preflight(build_app(&api, engine), "http://elsewhere.test").await;
		assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
	}

	#[tokio::test]
	async fn test_cors_defaults_to_any_origin() {
		let (app, _) = make_app(false);
		let headers = preflight(app, "http://elsewhere.test").await;
		assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
	}
}
