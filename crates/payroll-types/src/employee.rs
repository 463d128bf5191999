//! Employee types for the payroll service.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// An employee record.
///
/// Serializes with a derived `name` property alongside the individual name
/// parts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
	/// Unique identifier.
	pub id: u64,
	pub first_name: String,
	pub last_name: String,
	pub role: String,
}

impl Employee {
	pub fn new(
		id: u64,
		first_name: impl Into<String>,
		last_name: impl Into<String>,
		role: impl Into<String>,
	) -> Self {
		Self {
			id,
			first_name: first_name.into(),
			last_name: last_name.into(),
			role: role.into(),
		}
	}

	/// Returns the full name, first and last name joined by a space.
	pub fn name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name)
	}
}

impl Serialize for Employee {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("Employee", 5)?;
		state.serialize_field("id", &self.id)?;
		state.serialize_field("firstName", &self.first_name)?;
		state.serialize_field("lastName", &self.last_name)?;
		state.serialize_field("role", &self.role)?;
		state.serialize_field("name", &self.name())?;
		state.end()
	}
}

/// Request body for creating or replacing an employee.
///
/// Either `name` or the `firstName`/`lastName` pair may be supplied; explicit
/// parts win over `name`. Any `id` in the body is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub first_name: Option<String>,
	#[serde(default)]
	pub last_name: Option<String>,
	#[serde(default)]
	pub role: String,
}

impl EmployeeRequest {
	/// Builds an employee record with the given id from this request.
	pub fn into_employee(self, id: u64) -> Employee {
		let (first_name, last_name) = match (self.first_name, self.last_name, self.name) {
			(None, None, Some(name)) => split_name(&name),
			(first, last, name) => {
				let (from_first, from_last) = name.as_deref().map(split_name).unwrap_or_default();
				(first.unwrap_or(from_first), last.unwrap_or(from_last))
			},
		};

		Employee {
			id,
			first_name,
			last_name,
			role: self.role,
		}
	}
}

fn split_name(name: &str) -> (String, String) {
	match name.trim().split_once(' ') {
		Some((first, last)) => (first.to_string(), last.trim().to_string()),
		None => (name.trim().to_string(), String::new()),
	}
}
