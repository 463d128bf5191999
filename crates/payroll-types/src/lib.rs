//! Common types module for the payroll service.
//!
//! This module defines the records, status enums, storage keys, API error
//! types and configuration validation primitives shared by every crate in the
//! workspace.

/// API types for HTTP endpoints and error responses.
pub mod api;
/// Employee records.
pub mod employee;
/// Order records and the order status enum.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use employee::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
