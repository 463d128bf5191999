//! Record management for the payroll service.
//!
//! Orders go through a guarded state machine; employees are plain CRUD
//! records. Both share the injected storage service.

pub mod employee;
pub mod order;

pub use employee::{EmployeeError, EmployeeService};
pub use order::{OrderStateError, OrderStateMachine};
