//! Hypermedia representations for API responses.
//!
//! Records are wrapped with a `_links` object and collections with an
//! `_embedded` list, in the HAL style:
//!
//! ```json
//! {
//!   "id": 1,
//!   "description": "iPhone",
//!   "status": "IN_PROGRESS",
//!   "_links": {
//!     "self": { "href": "http://localhost:8080/orders/1" },
//!     "orders": { "href": "http://localhost:8080/orders" },
//!     "cancel": { "href": "http://localhost:8080/orders/1/cancel" },
//!     "complete": { "href": "http://localhost:8080/orders/1/complete" }
//!   }
//! }
//! ```

use payroll_types::{Employee, Order};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A single link object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
	pub href: String,
}

/// Relation name to link pairs, serialized as an object in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Links(Vec<(String, Link)>);

impl Links {
	pub fn with(mut self, rel: impl Into<String>, link: Link) -> Self {
		self.0.push((rel.into(), link));
		self
	}

	pub fn get(&self, rel: &str) -> Option<&Link> {
		self.0.iter().find(|(name, _)| name == rel).map(|(_, link)| link)
	}
}

impl Serialize for Links {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for (rel, link) in &self.0 {
			map.serialize_entry(rel, link)?;
		}
		map.end()
	}
}

/// A record together with its links.
#[derive(Debug, Clone, Serialize)]
pub struct Resource<T> {
	#[serde(flatten)]
	pub content: T,
	#[serde(rename = "_links")]
	pub links: Links,
}

impl<T> Resource<T> {
	/// Returns the `self` link.
	pub fn self_link(&self) -> Option<&Link> {
		self.links.get("self")
	}
}

/// A list of resources embedded under a relation name.
#[derive(Debug, Clone)]
pub struct Collection<T> {
	rel: &'static str,
	items: Vec<T>,
	links: Links,
}

impl<T: Serialize> Serialize for Collection<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		struct Embedded<'a, T> {
			rel: &'static str,
			items: &'a [T],
		}

		impl<T: Serialize> Serialize for Embedded<'_, T> {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry(self.rel, self.items)?;
				map.end()
			}
		}

		let mut map = serializer.serialize_map(None)?;
		if !self.items.is_empty() {
			map.serialize_entry(
				"_embedded",
				&Embedded {
					rel: self.rel,
					items: &self.items,
				},
			)?;
		}
		map.serialize_entry("_links", &self.links)?;
		map.end()
	}
}

/// Builds absolute or path-only hrefs and assembles resources.
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
	base_url: String,
}

impl LinkBuilder {
	/// Creates a builder. Hrefs are prefixed with `public_url` when set and
	/// are bare paths otherwise.
	pub fn new(public_url: Option<&str>) -> Self {
		Self {
			base_url: public_url
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or_default(),
		}
	}

	pub fn link(&self, path: &str) -> Link {
		Link {
			href: format!("{}{}", self.base_url, path),
		}
	}

	/// Links for the API root.
	pub fn root(&self) -> Links {
		Links::default()
			.with("employees", self.link("/employees"))
			.with("orders", self.link("/orders"))
	}

	/// Wraps an order with `self`, `orders` and one link per available
	/// lifecycle action.
	pub fn order(&self, order: Order) -> Resource<Order> {
		let path = format!("/orders/{}", order.id);
		let mut links = Links::default()
			.with("self", self.link(&path))
			.with("orders", self.link("/orders"));

		for action in order.available_actions() {
			links = links.with(
				action.as_str(),
				self.link(&format!("{}/{}", path, action.as_str())),
			);
		}

		Resource {
			content: order,
			links,
		}
	}

	pub fn orders(&self, orders: Vec<Order>) -> Collection<Resource<Order>> {
		Collection {
			rel: "orderList",
			items: orders.into_iter().map(|order| self.order(order)).collect(),
			links: Links::default().with("self", self.link("/orders")),
		}
	}

	pub fn employee(&self, employee: Employee) -> Resource<Employee> {
		let links = Links::default()
			.with("self", self.link(&format!("/employees/{}", employee.id)))
			.with("employees", self.link("/employees"));

		Resource {
			content: employee,
			links,
		}
	}

	pub fn employees(&self, employees: Vec<Employee>) -> Collection<Resource<Employee>> {
		Collection {
			rel: "employeeList",
			items: employees
				.into_iter()
				.map(|employee| self.employee(employee))
				.collect(),
			links: Links::default().with("self", self.link("/employees")),
		}
	}
}
