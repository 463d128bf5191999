//! API root index.

use crate::apis::links::Links;
use crate::server::AppState;
use axum::extract::{Json, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootIndex {
	#[serde(rename = "_links")]
	pub links: Links,
}

/// Handles GET / requests.
pub async fn index(State(state): State<AppState>) -> Json<RootIndex> {
	Json(RootIndex {
		links: state.links.root(),
	})
}
