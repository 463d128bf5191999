//! Order types for the payroll service.
//!
//! This module defines the order record, its lifecycle status and the
//! actions that move an order between statuses.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// Each status maps to the statuses it may move to
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::InProgress,
		HashSet::from([OrderStatus::Completed, OrderStatus::Cancelled]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

/// A customer order tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier assigned by the store on creation.
	pub id: u64,
	/// Free-text description of what was ordered.
	pub description: String,
	/// Current status of the order.
	pub status: OrderStatus,
}

impl Order {
	/// Creates an order record with the given id, description and status.
	pub fn new(id: u64, description: impl Into<String>, status: OrderStatus) -> Self {
		Self {
			id,
			description: description.into(),
			status,
		}
	}

	/// Returns the actions that may currently be applied to this order.
	///
	/// The presentation layer turns these into action links.
	pub fn available_actions(&self) -> Vec<OrderAction> {
		OrderAction::all()
			.filter(|action| action.is_allowed_from(self.status))
			.collect()
	}
}

/// Request body for creating an order.
///
/// Only the description is read; a caller-supplied `id` or `status` is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
	pub description: String,
}

/// Status of an order.
///
/// `InProgress` is the only non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Order has been placed and can still be completed or cancelled.
	InProgress,
	/// Order has been fulfilled.
	Completed,
	/// Order has been cancelled.
	Cancelled,
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::InProgress => "IN_PROGRESS",
			OrderStatus::Completed => "COMPLETED",
			OrderStatus::Cancelled => "CANCELLED",
		}
	}

	/// Returns true if an order in this status may move to `to`.
	pub fn can_transition_to(&self, to: OrderStatus) -> bool {
		TRANSITIONS
			.get(self)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Returns true if no further transitions are permitted from this status.
	pub fn is_terminal(&self) -> bool {
		TRANSITIONS.get(self).is_none_or(HashSet::is_empty)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A guarded lifecycle action on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderAction {
	/// Moves an in-progress order to `Cancelled`.
	Cancel,
	/// Moves an in-progress order to `Completed`.
	Complete,
}

impl OrderAction {
	/// Returns the relation name used for this action in links and messages.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderAction::Cancel => "cancel",
			OrderAction::Complete => "complete",
		}
	}

	/// Returns the status an order ends up in after this action.
	pub fn target_status(&self) -> OrderStatus {
		match self {
			OrderAction::Cancel => OrderStatus::Cancelled,
			OrderAction::Complete => OrderStatus::Completed,
		}
	}

	/// Returns true if this action may be applied to an order in `status`.
	pub fn is_allowed_from(&self, status: OrderStatus) -> bool {
		status.can_transition_to(self.target_status())
	}

	/// Returns an iterator over all actions.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Cancel, Self::Complete].into_iter()
	}
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
