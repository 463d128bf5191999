//! Payroll engine that ties configuration, storage and the record services
//! together.
//!
//! The engine is cheap to clone; every service it owns sits behind an `Arc`
//! and is shared with the HTTP layer.

pub mod lifecycle;

use crate::state::{EmployeeService, OrderStateMachine};
use payroll_config::Config;
use payroll_storage::StorageService;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// Main payroll engine.
#[derive(Clone)]
pub struct PayrollEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Storage service for persisting records.
	pub(crate) storage: Arc<StorageService>,
	/// Order state machine
	pub(crate) orders: Arc<OrderStateMachine>,
	/// Employee records
	pub(crate) employees: Arc<EmployeeService>,
}

impl PayrollEngine {
	/// Creates a new engine on top of the given storage service.
	pub fn new(config: Config, storage: Arc<StorageService>) -> Self {
		let orders = Arc::new(OrderStateMachine::new(storage.clone()));
		let employees = Arc::new(EmployeeService::new(storage.clone()));

		Self {
			config,
			storage,
			orders,
			employees,
		}
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the order state machine.
	pub fn orders(&self) -> &Arc<OrderStateMachine> {
		&self.orders
	}

	/// Returns the employee service.
	pub fn employees(&self) -> &Arc<EmployeeService> {
		&self.employees
	}
}
