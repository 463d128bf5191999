//! Order state machine implementation.
//!
//! Orders are created `IN_PROGRESS` and move to exactly one of the terminal
//! statuses `COMPLETED` or `CANCELLED`. Each transition re-reads the stored
//! record and writes it back with a compare-and-set, retrying on a lost race,
//! so at most one of several concurrent transitions on an order succeeds.

use payroll_storage::{StorageError, StorageService, Versioned};
use payroll_types::{Order, OrderAction, OrderStatus, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("You can't {action} an order that is in the {from} status")]
	InvalidTransition {
		action: OrderAction,
		from: OrderStatus,
	},
	#[error("Could not find order {0}")]
	OrderNotFound(u64),
}

impl OrderStateError {
	fn from_storage(order_id: u64, err: StorageError) -> Self {
		match err {
			StorageError::NotFound => OrderStateError::OrderNotFound(order_id),
			other => OrderStateError::Storage(other.to_string()),
		}
	}
}

/// Manages order creation, lookup and guarded status transitions.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Creates a new order. The status is always `IN_PROGRESS`.
	pub async fn create_order(&self, description: &str) -> Result<Order, OrderStateError> {
		let order = self.insert(description, OrderStatus::InProgress).await?;
		tracing::info!(order_id = order.id, "Created order");
		Ok(order)
	}

	/// Stores an order with an explicit status, bypassing the lifecycle.
	///
	/// Only used to preload sample data.
	pub async fn seed_order(
		&self,
		description: &str,
		status: OrderStatus,
	) -> Result<Order, OrderStateError> {
		self.insert(description, status).await
	}

	async fn insert(&self, description: &str, status: OrderStatus) -> Result<Order, OrderStateError> {
		loop {
			let id = self
				.storage
				.next_id(StorageKey::Orders.as_str())
				.await
				.map_err(|e| OrderStateError::Storage(e.to_string()))?;

			let order = Order::new(id, description, status);
			let inserted = self
				.storage
				.insert(StorageKey::Orders.as_str(), &id.to_string(), &order)
				.await
				.map_err(|e| OrderStateError::Storage(e.to_string()))?;

			if inserted {
				return Ok(order);
			}
			tracing::debug!(order_id = id, "Id already taken, allocating another");
		}
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: u64) -> Result<Order, OrderStateError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &order_id.to_string())
			.await
			.map_err(|e| OrderStateError::from_storage(order_id, e))
	}

	/// Lists every order in ascending id order.
	pub async fn list_orders(&self) -> Result<Vec<Order>, OrderStateError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(|e| OrderStateError::Storage(e.to_string()))?;
		orders.sort_by_key(|order| order.id);
		Ok(orders)
	}

	/// Cancels an in-progress order.
	pub async fn cancel(&self, order_id: u64) -> Result<Order, OrderStateError> {
		self.apply(order_id, OrderAction::Cancel).await
	}

	/// Completes an in-progress order.
	pub async fn complete(&self, order_id: u64) -> Result<Order, OrderStateError> {
		self.apply(order_id, OrderAction::Complete).await
	}

	/// Applies a lifecycle action, retrying until the compare-and-set either
	/// lands or the re-read record no longer permits the action.
	pub async fn apply(
		&self,
		order_id: u64,
		action: OrderAction,
	) -> Result<Order, OrderStateError> {
		let key = order_id.to_string();
		let target = action.target_status();

		loop {
			let current: Versioned<Order> = self
				.storage
				.retrieve_versioned(StorageKey::Orders.as_str(), &key)
				.await
				.map_err(|e| OrderStateError::from_storage(order_id, e))?;

			let from = current.value.status;
			if !from.can_transition_to(target) {
				tracing::debug!(order_id, status = %from, action = %action, "Rejected transition");
				return Err(OrderStateError::InvalidTransition { action, from });
			}

			let mut updated = current.value.clone();
			updated.status = target;

			let swapped = self
				.storage
				.replace_if_unchanged(StorageKey::Orders.as_str(), &key, &current, &updated)
				.await
				.map_err(|e| OrderStateError::Storage(e.to_string()))?;

			if swapped {
				tracing::info!(order_id, from = %from, status = %target, "Order transitioned");
				return Ok(updated);
			}

			tracing::debug!(order_id, action = %action, "Order changed concurrently, retrying");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use mockall::mock;
	use payroll_storage::{implementations::memory::MemoryStorage, StorageInterface};
	use payroll_types::ConfigSchema;

	mock! {
		Backend {}

		#[async_trait]
		impl StorageInterface for Backend {
			async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;
			async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
			async fn delete(&self, key: &str) -> Result<(), StorageError>;
			async fn exists(&self, key: &str) -> Result<bool, StorageError>;
			async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;
			async fn compare_and_swap(
				&self,
				key: &str,
				expected: Option<Vec<u8>>,
				value: Vec<u8>,
			) -> Result<bool, StorageError>;
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
		}
	}

	fn state_machine() -> OrderStateMachine {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		OrderStateMachine::new(Arc::new(storage))
	}

	fn encoded(status: OrderStatus) -> Vec<u8> {
		serde_json::to_vec(&Order::new(7, "Laptop", status)).unwrap()
	}

	#[tokio::test]
	async fn test_create_assigns_ids_and_starts_in_progress() {
		let orders = state_machine();

		let first = orders.create_order("MacBook Pro").await.unwrap();
		let second = orders.create_order("iPhone").await.unwrap();

		assert_eq!(first.id, 1);
		assert_eq!(second.id, 2);
		assert_eq!(first.status, OrderStatus::InProgress);
		assert_eq!(orders.get_order(2).await.unwrap(), second);
	}

	#[tokio::test]
	async fn test_complete_then_cancel_is_rejected() {
		let orders = state_machine();
		let order = orders.create_order("MacBook Pro").await.unwrap();

		let completed = orders.complete(order.id).await.unwrap();
		assert_eq!(completed.status, OrderStatus::Completed);

		let err = orders.cancel(order.id).await.unwrap_err();
		assert_eq!(
			err.to_string(),
			"You can't cancel an order that is in the COMPLETED status"
		);
		assert_eq!(
			orders.get_order(order.id).await.unwrap().status,
			OrderStatus::Completed
		);
	}

	#[tokio::test]
	async fn test_cancel_then_complete_is_rejected() {
		let orders = state_machine();
		let order = orders.create_order("iPhone").await.unwrap();

		orders.cancel(order.id).await.unwrap();
		let err = orders.complete(order.id).await.unwrap_err();
		assert!(matches!(
			err,
			OrderStateError::InvalidTransition {
				action: OrderAction::Complete,
				from: OrderStatus::Cancelled,
			}
		));
		assert!(err.to_string().contains("CANCELLED"));
	}

	#[tokio::test]
	async fn test_repeated_cancel_fails_every_time() {
		let orders = state_machine();
		let order = orders.create_order("iPad").await.unwrap();
		orders.cancel(order.id).await.unwrap();

		for _ in 0..3 {
			assert!(matches!(
				orders.cancel(order.id).await,
				Err(OrderStateError::InvalidTransition { .. })
			));
		}
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let orders = state_machine();

		assert!(matches!(
			orders.get_order(99).await,
			Err(OrderStateError::OrderNotFound(99))
		));
		assert!(matches!(
			orders.cancel(99).await,
			Err(OrderStateError::OrderNotFound(99))
		));
		let err = orders.complete(99).await.unwrap_err();
		assert_eq!(err.to_string(), "Could not find order 99");
	}

	#[tokio::test]
	async fn test_list_orders_sorted_by_id() {
		let orders = state_machine();
		for description in ["a", "b", "c", "d", "e"] {
			orders.create_order(description).await.unwrap();
		}

		let ids: Vec<u64> = orders
			.list_orders()
			.await
			.unwrap()
			.iter()
			.map(|o| o.id)
			.collect();
		assert_eq!(ids, vec![1, 2, 3, 4, 5]);
	}

	#[tokio::test]
	async fn test_seed_order_keeps_status() {
		let orders = state_machine();
		let order = orders
			.seed_order("MacBook Pro", OrderStatus::Completed)
			.await
			.unwrap();

		assert_eq!(
			orders.get_order(order.id).await.unwrap().status,
			OrderStatus::Completed
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_transitions_exactly_one_wins() {
		let orders = Arc::new(state_machine());
		let order = orders.create_order("contended").await.unwrap();

		let mut handles = Vec::new();
		for i in 0..16 {
			let orders = Arc::clone(&orders);
			let action = if i % 2 == 0 {
				OrderAction::Cancel
			} else {
				OrderAction::Complete
			};
			handles.push(tokio::spawn(async move {
				orders.apply(order.id, action).await
			}));
		}

		let mut winners = Vec::new();
		for handle in handles {
			match handle.await.unwrap() {
				Ok(order) => winners.push(order.status),
				Err(OrderStateError::InvalidTransition { .. }) => {},
				Err(e) => panic!("unexpected error: {}", e),
			}
		}

		assert_eq!(winners.len(), 1);
		assert_eq!(orders.get_order(order.id).await.unwrap().status, winners[0]);
	}

	#[tokio::test]
	async fn test_lost_race_is_revalidated() {
		let mut backend = MockBackend::new();
		let mut reads = 0;
		backend.expect_get_bytes().returning(move |_| {
			reads += 1;
			if reads == 1 {
				Ok(encoded(OrderStatus::InProgress))
			} else {
				Ok(encoded(OrderStatus::Completed))
			}
		});
		backend
			.expect_compare_and_swap()
			.times(1)
			.returning(|_, _, _| Ok(false));

		let orders = OrderStateMachine::new(Arc::new(StorageService::new(Box::new(backend))));
		let err = orders.cancel(7).await.unwrap_err();
		assert!(matches!(
			err,
			OrderStateError::InvalidTransition {
				from: OrderStatus::Completed,
				..
			}
		));
	}

	#[tokio::test]
	async fn test_backend_failure_is_storage_error() {
		let mut backend = MockBackend::new();
		backend
			.expect_get_bytes()
			.returning(|_| Ok(encoded(OrderStatus::InProgress)));
		backend
			.expect_compare_and_swap()
			.returning(|_, _, _| Err(StorageError::Backend("disk unavailable".into())));
		backend
			.expect_list_keys()
			.returning(|_| Err(StorageError::Backend("disk unavailable".into())));

		let orders = OrderStateMachine::new(Arc::new(StorageService::new(Box::new(backend))));

		let err = orders.complete(7).await.unwrap_err();
		assert!(matches!(err, OrderStateError::Storage(msg) if msg.contains("disk unavailable")));
		assert!(matches!(
			orders.list_orders().await,
			Err(OrderStateError::Storage(_))
		));
	}

	#[tokio::test]
	async fn test_create_skips_taken_id() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let orders = OrderStateMachine::new(Arc::clone(&storage));

		let stray = Order::new(1, "stray", OrderStatus::Cancelled);
		storage
			.store(StorageKey::Orders.as_str(), "1", &stray)
			.await
			.unwrap();

		let order = orders.create_order("iPhone").await.unwrap();
		assert_eq!(order.id, 2);
		assert_eq!(orders.get_order(1).await.unwrap(), stray);
	}
}
