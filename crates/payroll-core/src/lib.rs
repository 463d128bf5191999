//! Core engine for the payroll service.
//!
//! Holds the order lifecycle state machine, the employee record service and
//! the builder that assembles them over a configured storage backend.

pub mod builder;
pub mod engine;
pub mod state;

pub use builder::{BuilderError, PayrollBuilder, PayrollFactories};
pub use engine::{EngineError, PayrollEngine};
pub use state::{EmployeeError, EmployeeService, OrderStateError, OrderStateMachine};
