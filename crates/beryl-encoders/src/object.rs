//! Materialized values produced by encoders.

use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// A live object materialized through an encoder, paired with its canonical
/// wire form.
///
/// The `value` side supports typed downcasting for handlers that want the
/// concrete model; the `wire` side is what serialization re-emits without
/// consulting the encoder again.
#[derive(Clone)]
pub struct EncodedObject {
	pub type_name: String,
	pub value: Arc<dyn Any + Send + Sync>,
	pub wire: Value,
}

impl EncodedObject {
	pub fn new(
		type_name: impl Into<String>,
		value: Arc<dyn Any + Send + Sync>,
		wire: Value,
	) -> Self {
		Self {
			type_name: type_name.into(),
			value,
			wire,
		}
	}

	/// The encoded null value, produced when an optional body is absent.
	pub fn null() -> Self {
		Self {
			type_name: "null".into(),
			value: Arc::new(()),
			wire: Value::Null,
		}
	}

	pub fn is_null(&self) -> bool {
		self.wire.is_null() && self.type_name == "null"
	}

	/// Downcast the live value.
	///
	/// # Examples
	///
	/// ```
	/// use beryl_encoders::EncodedObject;
	/// use std::sync::Arc;
	/// use serde_json::json;
	///
	/// let obj = EncodedObject::new("count", Arc::new(42u32), json!(42));
	/// assert_eq!(*obj.downcast::<u32>().unwrap(), 42);
	/// assert!(obj.downcast::<String>().is_none());
	/// ```
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.value).downcast::<T>().ok()
	}
}

impl std::fmt::Debug for EncodedObject {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EncodedObject")
			.field("type_name", &self.type_name)
			.field("wire", &self.wire)
			.finish()
	}
}
