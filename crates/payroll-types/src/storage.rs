//! Storage-related types for the payroll service.

/// Storage keys for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Key for storing order records
	Orders,
	/// Key for storing employee records
	Employees,
	/// Key for the per-collection id sequences
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Employees => "employees",
			StorageKey::Sequences => "sequences",
		}
	}
}
