//! Employee record management.
//!
//! Employees have no lifecycle; this is a thin typed layer over the store
//! that owns id assignment.

use payroll_storage::{StorageError, StorageService};
use payroll_types::{Employee, EmployeeRequest, StorageKey};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmployeeError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Could not find employee {0}")]
	NotFound(u64),
}

impl From<StorageError> for EmployeeError {
	fn from(err: StorageError) -> Self {
		EmployeeError::Storage(err.to_string())
	}
}

/// CRUD operations on employee records.
pub struct EmployeeService {
	storage: Arc<StorageService>,
}

impl EmployeeService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Creates an employee under a freshly assigned id.
	///
	/// An id already taken by a concurrent replace is skipped, never
	/// overwritten.
	pub async fn create(&self, request: EmployeeRequest) -> Result<Employee, EmployeeError> {
		loop {
			let id = self.storage.next_id(StorageKey::Employees.as_str()).await?;
			let employee = request.clone().into_employee(id);

			if self
				.storage
				.insert(StorageKey::Employees.as_str(), &id.to_string(), &employee)
				.await?
			{
				tracing::info!(employee_id = id, "Created employee");
				return Ok(employee);
			}
			tracing::debug!(employee_id = id, "Id already taken, allocating another");
		}
	}

	/// Lists every employee in ascending id order.
	pub async fn list(&self) -> Result<Vec<Employee>, EmployeeError> {
		let mut employees: Vec<Employee> = self
			.storage
			.retrieve_all(StorageKey::Employees.as_str())
			.await?;
		employees.sort_by_key(|employee| employee.id);
		Ok(employees)
	}

	pub async fn get(&self, employee_id: u64) -> Result<Employee, EmployeeError> {
		self.storage
			.retrieve(StorageKey::Employees.as_str(), &employee_id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => EmployeeError::NotFound(employee_id),
				other => other.into(),
			})
	}

	/// Overwrites the employee stored under `employee_id`, creating it with
	/// that id if absent.
	pub async fn replace(
		&self,
		employee_id: u64,
		request: EmployeeRequest,
	) -> Result<Employee, EmployeeError> {
		let existed = self
			.storage
			.exists(StorageKey::Employees.as_str(), &employee_id.to_string())
			.await?;
		let employee = request.into_employee(employee_id);

		// Reserve the id before writing so creates never hand it out
		self.storage
			.advance_sequence(StorageKey::Employees.as_str(), employee_id)
			.await?;
		self.storage
			.store(StorageKey::Employees.as_str(), &employee_id.to_string(), &employee)
			.await?;

		tracing::info!(employee_id, replaced = existed, "Stored employee");
		Ok(employee)
	}

	/// Deletes an employee. Deleting a missing employee succeeds.
	pub async fn delete(&self, employee_id: u64) -> Result<(), EmployeeError> {
		self.storage
			.remove(StorageKey::Employees.as_str(), &employee_id.to_string())
			.await?;
		tracing::info!(employee_id, "Deleted employee");
		Ok(())
	}
}
