//! Materialized keyword arguments.
//!
//! A [`Kwargs`] map is what the pipeline assembles for a handler: every entry
//! is already extracted, encoded and validated. Handlers read entries through
//! the typed accessors; a type mismatch is a programming error surfaced as an
//! internal exception, never a client error.

use crate::markers::Scopes;
use beryl_exception::{Exception, Result};
use beryl_http::{AppState, HandlerContext, Request, WebSocket};
use beryl_encoders::EncodedObject;
use hyper::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

/// A single materialized argument.
#[derive(Clone, Debug)]
pub enum Kwarg {
	/// Scalar or structured JSON value.
	Json(Value),
	/// Value materialized through an encoder.
	Object(EncodedObject),
	Request(Request),
	Socket(WebSocket),
	Headers(HeaderMap),
	Cookies(HashMap<String, String>),
	State(AppState),
	Context(HandlerContext),
	Scopes(Scopes),
}

impl Kwarg {
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			Self::Object(obj) => Some(&obj.wire),
			_ => None,
		}
	}
}

/// Name → argument mapping handed to handlers and providers.
#[derive(Clone, Debug, Default)]
pub struct Kwargs {
	values: HashMap<String, Kwarg>,
}

impl Kwargs {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, value: Kwarg) {
		self.values.insert(name.into(), value);
	}

	pub fn get(&self, name: &str) -> Option<&Kwarg> {
		self.values.get(name)
	}

	pub fn remove(&mut self, name: &str) -> Option<Kwarg> {
		self.values.remove(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.values.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Merge `other` into `self`; entries in `other` win on collisions.
	pub fn merge(&mut self, other: Kwargs) {
		self.values.extend(other.values);
	}

	fn required(&self, name: &str) -> Result<&Kwarg> {
		self.values
			.get(name)
			.ok_or_else(|| Exception::internal(format!("kwarg '{name}' is not present")))
	}

	fn mismatch(name: &str, expected: &str) -> Exception {
		Exception::internal(format!("kwarg '{name}' is not a {expected}"))
	}

	/// JSON view of an entry (the wire form for encoded objects).
	pub fn json(&self, name: &str) -> Result<&Value> {
		self.required(name)?
			.as_json()
			.ok_or_else(|| Self::mismatch(name, "JSON value"))
	}

	pub fn str(&self, name: &str) -> Result<&str> {
		self.json(name)?
			.as_str()
			.ok_or_else(|| Self::mismatch(name, "string"))
	}

	pub fn i64(&self, name: &str) -> Result<i64> {
		self.json(name)?
			.as_i64()
			.ok_or_else(|| Self::mismatch(name, "integer"))
	}

	pub fn f64(&self, name: &str) -> Result<f64> {
		self.json(name)?
			.as_f64()
			.ok_or_else(|| Self::mismatch(name, "float"))
	}

	pub fn bool(&self, name: &str) -> Result<bool> {
		self.json(name)?
			.as_bool()
			.ok_or_else(|| Self::mismatch(name, "boolean"))
	}

	pub fn object(&self, name: &str) -> Result<&EncodedObject> {
		match self.required(name)? {
			Kwarg::Object(obj) => Ok(obj),
			_ => Err(Self::mismatch(name, "encoded object")),
		}
	}

	pub fn request(&self) -> Result<&Request> {
		match self.required("request")? {
			Kwarg::Request(request) => Ok(request),
			_ => Err(Self::mismatch("request", "request")),
		}
	}

	pub fn socket(&self) -> Result<&WebSocket> {
		match self.required("socket")? {
			Kwarg::Socket(socket) => Ok(socket),
			_ => Err(Self::mismatch("socket", "websocket")),
		}
	}

	pub fn headers(&self) -> Result<&HeaderMap> {
		match self.required("headers")? {
			Kwarg::Headers(headers) => Ok(headers),
			_ => Err(Self::mismatch("headers", "header map")),
		}
	}

	pub fn cookies(&self) -> Result<&HashMap<String, String>> {
		match self.required("cookies")? {
			Kwarg::Cookies(cookies) => Ok(cookies),
			_ => Err(Self::mismatch("cookies", "cookie map")),
		}
	}

	pub fn state(&self) -> Result<&AppState> {
		match self.required("state")? {
			Kwarg::State(state) => Ok(state),
			_ => Err(Self::mismatch("state", "application state")),
		}
	}

	pub fn context(&self) -> Result<&HandlerContext> {
		match self.required("context")? {
			Kwarg::Context(context) => Ok(context),
			_ => Err(Self::mismatch("context", "handler context")),
		}
	}

	pub fn scopes(&self, name: &str) -> Result<&Scopes> {
		match self.required(name)? {
			Kwarg::Scopes(scopes) => Ok(scopes),
			_ => Err(Self::mismatch(name, "scopes")),
		}
	}
}

impl FromIterator<(String, Kwarg)> for Kwargs {
	fn from_iter<T: IntoIterator<Item = (String, Kwarg)>>(iter: T) -> Self {
		Self {
			values: iter.into_iter().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_typed_accessors() {
		let mut kwargs = Kwargs::new();
		kwargs.insert("name", Kwarg::Json(json!("ada")));
		kwargs.insert("age", Kwarg::Json(json!(36)));
		kwargs.insert("active", Kwarg::Json(json!(true)));

		assert_eq!(kwargs.str("name").unwrap(), "ada");
		assert_eq!(kwargs.i64("age").unwrap(), 36);
		assert!(kwargs.bool("active").unwrap());
	}

	#[test]
	fn test_mismatch_is_internal_error() {
		let mut kwargs = Kwargs::new();
		kwargs.insert("age", Kwarg::Json(json!("not a number")));

		let err = kwargs.i64("age").unwrap_err();
		assert!(matches!(err, Exception::Internal(_)));
	}

	#[test]
	fn test_missing_entry_is_internal_error() {
		let kwargs = Kwargs::new();
		assert!(matches!(
			kwargs.str("ghost").unwrap_err(),
			Exception::Internal(_)
		));
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = Kwargs::new();
		base.insert("a", Kwarg::Json(json!(1)));
		let mut overlay = Kwargs::new();
		overlay.insert("a", Kwarg::Json(json!(2)));
		overlay.insert("b", Kwarg::Json(json!(3)));

		base.merge(overlay);

		assert_eq!(base.i64("a").unwrap(), 2);
		assert_eq!(base.i64("b").unwrap(), 3);
	}

	#[test]
	fn test_object_wire_visible_as_json() {
		let obj = EncodedObject::new(
			"User",
			std::sync::Arc::new(42u8),
			json!({"name": "ada"}),
		);
		let mut kwargs = Kwargs::new();
		kwargs.insert("user", Kwarg::Object(obj));

		assert_eq!(kwargs.json("user").unwrap()["name"], "ada");
	}
}
