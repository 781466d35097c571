//! Passthrough encoder for plain dictionaries.

use crate::annotation::Annotation;
use crate::object::EncodedObject;
use crate::{Encoder, EncoderError};
use serde_json::Value;
use std::sync::Arc;

/// Accepts any JSON object and hands it through untouched.
///
/// Registered last by [`crate::EncoderRegistry::with_defaults`], so schema
/// ecosystems always get first claim.
pub struct RawEncoder;

impl Encoder for RawEncoder {
	fn name(&self) -> &str {
		"raw"
	}

	fn is_type(&self, annotation: &Annotation) -> bool {
		matches!(annotation, Annotation::Dict)
	}

	fn encode(&self, _annotation: &Annotation, raw: Value) -> Result<EncodedObject, EncoderError> {
		match raw {
			Value::Object(map) => {
				let wire = Value::Object(map.clone());
				Ok(EncodedObject::new("dict", Arc::new(map), wire))
			}
			other => Err(EncoderError::rejected(
				"dict",
				vec![(
					"body".into(),
					format!("expected a JSON object, got {}", value_kind(&other)),
				)],
			)),
		}
	}

	fn serialize(&self, obj: &EncodedObject) -> Result<Value, EncoderError> {
		Ok(obj.wire.clone())
	}
}

fn value_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_object_passthrough() {
		let obj = RawEncoder
			.encode(&Annotation::Dict, json!({"a": 1, "b": [2, 3]}))
			.unwrap();
		assert_eq!(obj.type_name, "dict");
		assert_eq!(obj.wire, json!({"a": 1, "b": [2, 3]}));
	}

	#[test]
	fn test_non_object_rejected() {
		let err = RawEncoder.encode(&Annotation::Dict, json!([1, 2])).unwrap_err();
		assert!(matches!(err, EncoderError::Rejected { .. }));
	}
}
