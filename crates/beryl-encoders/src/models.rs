//! Serde-typed model ecosystem.
//!
//! Each registered model is an ordinary Rust type with `Serialize` and
//! `DeserializeOwned`; strictness is whatever the type's own serde attributes
//! say (e.g. `#[serde(deny_unknown_fields)]`). The encoder stores a pair of
//! monomorphized closures per model so the request path never touches
//! generics.

use crate::annotation::Annotation;
use crate::object::EncodedObject;
use crate::{Encoder, EncoderError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type DecodeFn =
	Arc<dyn Fn(Value) -> Result<Arc<dyn Any + Send + Sync>, String> + Send + Sync>;
type SerializeFn =
	Arc<dyn Fn(&EncodedObject) -> Result<Value, String> + Send + Sync>;

struct ModelBinding {
	decode: DecodeFn,
	serialize: SerializeFn,
}

/// Encoder over registered serde types.
///
/// # Examples
///
/// ```
/// use beryl_encoders::{Annotation, Encoder, ModelEncoder};
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct User {
///     name: String,
///     age: u32,
/// }
///
/// let encoder = ModelEncoder::new().register::<User>("User");
/// let obj = encoder
///     .encode(&Annotation::model("User"), json!({"name": "ada", "age": 36}))
///     .unwrap();
///
/// let user = obj.downcast::<User>().unwrap();
/// assert_eq!(user.name, "ada");
/// ```
pub struct ModelEncoder {
	name: String,
	bindings: HashMap<String, ModelBinding>,
}

impl ModelEncoder {
	pub fn new() -> Self {
		Self {
			name: "models".into(),
			bindings: HashMap::new(),
		}
	}

	pub fn register<T>(mut self, name: &str) -> Self
	where
		T: Serialize + DeserializeOwned + Send + Sync + 'static,
	{
		let model_name = name.to_string();
		let decode: DecodeFn = Arc::new(move |raw| {
			serde_json::from_value::<T>(raw)
				.map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>)
				.map_err(|e| e.to_string())
		});
		let serialize_name = name.to_string();
		let serialize: SerializeFn = Arc::new(move |obj| {
			let value = obj
				.downcast::<T>()
				.ok_or_else(|| format!("value is not a '{serialize_name}'"))?;
			serde_json::to_value(&*value).map_err(|e| e.to_string())
		});
		self.bindings
			.insert(model_name, ModelBinding { decode, serialize });
		self
	}
}

impl Default for ModelEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Encoder for ModelEncoder {
	fn name(&self) -> &str {
		&self.name
	}

	fn is_type(&self, annotation: &Annotation) -> bool {
		annotation
			.model_name()
			.is_some_and(|name| self.bindings.contains_key(name))
	}

	fn encode(&self, annotation: &Annotation, raw: Value) -> Result<EncodedObject, EncoderError> {
		let name = annotation
			.model_name()
			.ok_or_else(|| EncoderError::NotHandled(format!("{annotation:?}")))?;
		let binding = self
			.bindings
			.get(name)
			.ok_or_else(|| EncoderError::NotHandled(name.to_string()))?;
		let value = (binding.decode)(raw.clone())
			.map_err(|message| EncoderError::rejected(name, vec![("body".into(), message)]))?;
		Ok(EncodedObject::new(name, value, raw))
	}

	fn serialize(&self, obj: &EncodedObject) -> Result<Value, EncoderError> {
		let binding = self
			.bindings
			.get(&obj.type_name)
			.ok_or_else(|| EncoderError::NotHandled(obj.type_name.clone()))?;
		(binding.serialize)(obj).map_err(EncoderError::Serialization)
	}
}
