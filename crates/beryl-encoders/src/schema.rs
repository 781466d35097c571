//! Declarative field-schema ecosystem.
//!
//! Schemas describe a JSON object field by field and validate wire values
//! into ordered [`Document`]s. A schema in strict mode rejects unknown top
//! level keys, naming each one; a tolerant schema ignores them.

use crate::annotation::Annotation;
use crate::json::normalize_datetime;
use crate::object::EncodedObject;
use crate::{Encoder, EncoderError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The value kinds a schema field can require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	String,
	Integer,
	Float,
	Boolean,
	/// RFC 3339 timestamp, normalized to whole seconds.
	DateTime,
	Any,
	List(Box<FieldKind>),
	Object,
	/// Accepts the first matching member kind.
	Union(Vec<FieldKind>),
}

impl FieldKind {
	fn label(&self) -> String {
		match self {
			Self::String => "string".into(),
			Self::Integer => "integer".into(),
			Self::Float => "float".into(),
			Self::Boolean => "boolean".into(),
			Self::DateTime => "datetime".into(),
			Self::Any => "any".into(),
			Self::List(inner) => format!("list of {}", inner.label()),
			Self::Object => "object".into(),
			Self::Union(kinds) => kinds
				.iter()
				.map(FieldKind::label)
				.collect::<Vec<_>>()
				.join(" or "),
		}
	}

	/// Validate and normalize one value. Returns the value to store.
	fn check(&self, value: &Value) -> Result<Value, String> {
		match (self, value) {
			(Self::Any, v) => Ok(v.clone()),
			(Self::String, Value::String(_)) => Ok(value.clone()),
			(Self::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
			(Self::Float, Value::Number(_)) => Ok(value.clone()),
			(Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
			(Self::DateTime, Value::String(raw)) => {
				normalize_datetime(raw).map(Value::String)
			}
			(Self::Object, Value::Object(_)) => Ok(value.clone()),
			(Self::List(inner), Value::Array(items)) => {
				let mut out = Vec::with_capacity(items.len());
				for item in items {
					out.push(inner.check(item)?);
				}
				Ok(Value::Array(out))
			}
			(Self::Union(kinds), v) => kinds
				.iter()
				.find_map(|kind| kind.check(v).ok())
				.ok_or_else(|| format!("expected {}", self.label())),
			_ => Err(format!("expected {}", self.label())),
		}
	}
}

/// One declared field of a [`Schema`]. Required and non-nullable by default.
#[derive(Debug, Clone)]
pub struct SchemaField {
	pub name: String,
	pub kind: FieldKind,
	pub required: bool,
	pub nullable: bool,
}

impl SchemaField {
	pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		Self {
			name: name.into(),
			kind,
			required: true,
			nullable: false,
		}
	}

	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}
}

/// A named, ordered field schema.
///
/// # Examples
///
/// ```
/// use beryl_encoders::{FieldKind, Schema, SchemaField};
/// use serde_json::json;
///
/// let schema = Schema::new("User")
///     .field(SchemaField::new("name", FieldKind::String))
///     .field(SchemaField::new("age", FieldKind::Integer).optional());
///
/// let doc = schema.validate(&json!({"name": "ada"})).unwrap();
/// assert_eq!(doc.get("name"), Some(&json!("ada")));
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
	pub name: String,
	pub fields: Vec<SchemaField>,
	pub strict: bool,
}

impl Schema {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fields: Vec::new(),
			strict: false,
		}
	}

	pub fn field(mut self, field: SchemaField) -> Self {
		self.fields.push(field);
		self
	}

	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	/// Validate a wire value into a [`Document`].
	///
	/// All failures are collected before returning so a client sees every
	/// offending field at once.
	pub fn validate(&self, value: &Value) -> Result<Document, Vec<(String, String)>> {
		let Value::Object(input) = value else {
			return Err(vec![("body".into(), "expected a JSON object".into())]);
		};

		let mut errors = Vec::new();
		let mut values = Map::new();

		for field in &self.fields {
			match input.get(&field.name) {
				None => {
					if field.required {
						errors.push((field.name.clone(), "field required".into()));
					}
				}
				Some(Value::Null) => {
					if field.nullable {
						values.insert(field.name.clone(), Value::Null);
					} else {
						errors.push((field.name.clone(), "must not be null".into()));
					}
				}
				Some(raw) => match field.kind.check(raw) {
					Ok(normalized) => {
						values.insert(field.name.clone(), normalized);
					}
					Err(message) => errors.push((field.name.clone(), message)),
				},
			}
		}

		if self.strict {
			let declared: HashMap<&str, ()> =
				self.fields.iter().map(|f| (f.name.as_str(), ())).collect();
			for key in input.keys() {
				if !declared.contains_key(key.as_str()) {
					errors.push((key.clone(), "unknown field".into()));
				}
			}
		}

		if errors.is_empty() {
			Ok(Document {
				schema: self.name.clone(),
				values,
			})
		} else {
			Err(errors)
		}
	}
}

/// A validated instance of a [`Schema`], fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
	pub schema: String,
	pub values: Map<String, Value>,
}

impl Document {
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.values.get(field)
	}

	pub fn to_wire(&self) -> Value {
		Value::Object(self.values.clone())
	}
}

/// Encoder over a set of named [`Schema`]s.
pub struct SchemaEncoder {
	name: String,
	schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaEncoder {
	pub fn new() -> Self {
		Self::with_name("schemas")
	}

	/// Encoder under a custom registry name, for override setups where two
	/// schema encoders coexist.
	pub fn with_name(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			schemas: HashMap::new(),
		}
	}

	pub fn schema(mut self, schema: Schema) -> Self {
		self.schemas.insert(schema.name.clone(), Arc::new(schema));
		self
	}
}

impl Default for SchemaEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Encoder for SchemaEncoder {
	fn name(&self) -> &str {
		&self.name
	}

	fn is_type(&self, annotation: &Annotation) -> bool {
		annotation
			.model_name()
			.is_some_and(|name| self.schemas.contains_key(name))
	}

	fn encode(&self, annotation: &Annotation, raw: Value) -> Result<EncodedObject, EncoderError> {
		let name = annotation
			.model_name()
			.ok_or_else(|| EncoderError::NotHandled(format!("{annotation:?}")))?;
		let schema = self
			.schemas
			.get(name)
			.ok_or_else(|| EncoderError::NotHandled(name.to_string()))?;
		let document = schema
			.validate(&raw)
			.map_err(|errors| EncoderError::rejected(name, errors))?;
		let wire = document.to_wire();
		Ok(EncodedObject::new(name, Arc::new(document), wire))
	}

	fn serialize(&self, obj: &EncodedObject) -> Result<Value, EncoderError> {
		match obj.downcast::<Document>() {
			Some(document) => Ok(document.to_wire()),
			None => Ok(obj.wire.clone()),
		}
	}
}
