//! # Beryl Encoders
//!
//! The pluggable boundary between live typed values and the JSON wire.
//!
//! An [`Encoder`] claims annotations ([`Encoder::is_type`]), materializes
//! wire values into live objects ([`Encoder::encode`]) and turns live objects
//! back into JSON-safe structures ([`Encoder::serialize`]). The process-wide
//! [`EncoderRegistry`] holds an ordered list of encoders: it is consulted
//! front to back and later registrations are inserted at the front, so
//! user-registered encoders override the defaults.
//!
//! Two independent schema ecosystems ship in-tree — [`ModelEncoder`] for
//! serde-typed models and [`SchemaEncoder`] for declarative field schemas —
//! plus [`RawEncoder`] for plain dictionaries.
//!
//! The registry is mutable only until serving starts: it freezes on first
//! lookup (or explicitly via [`EncoderRegistry::freeze`]) and registration
//! afterwards is a configuration error.
//!
//! ## Example
//!
//! ```
//! use beryl_encoders::{Annotation, EncoderRegistry, Schema, SchemaEncoder, SchemaField, FieldKind};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let schema = Schema::new("Item")
//!     .field(SchemaField::new("sku", FieldKind::Union(vec![FieldKind::String, FieldKind::Integer])))
//!     .field(SchemaField::new("description", FieldKind::String))
//!     .strict(true);
//!
//! let registry = EncoderRegistry::new();
//! registry.register(Arc::new(SchemaEncoder::new().schema(schema))).unwrap();
//!
//! let obj = registry
//!     .encode(&Annotation::model("Item"), json!({"sku": 123, "description": "x"}))
//!     .unwrap();
//! assert_eq!(obj.wire["sku"], 123);
//! ```

pub mod annotation;
pub mod json;
mod models;
mod object;
mod raw;
mod registry;
mod schema;

pub use annotation::Annotation;
pub use models::ModelEncoder;
pub use object::EncodedObject;
pub use raw::RawEncoder;
pub use registry::EncoderRegistry;
pub use schema::{Document, FieldKind, Schema, SchemaEncoder, SchemaField};

/// Errors raised by encoders and the registry.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
	/// No encoder in the registry claims the annotation.
	#[error("no encoder claims annotation '{0}'")]
	NotHandled(String),

	/// Registration attempted after the registry froze.
	#[error("encoder registry is frozen; encoders must be registered before serving starts")]
	Frozen,

	/// The encoder itself is malformed (empty name and the like).
	#[error("invalid encoder: {0}")]
	InvalidEncoder(String),

	/// The wire value does not satisfy the target type. Client-originated
	/// when the value came from the request.
	#[error("value rejected by '{type_name}'")]
	Rejected {
		type_name: String,
		errors: Vec<(String, String)>,
	},

	/// A live value failed to serialize onto the wire.
	#[error("serialization failed: {0}")]
	Serialization(String),
}

impl EncoderError {
	pub fn rejected(type_name: impl Into<String>, errors: Vec<(String, String)>) -> Self {
		Self::Rejected {
			type_name: type_name.into(),
			errors,
		}
	}

	/// Field-level failure pairs, when present.
	pub fn field_errors(&self) -> &[(String, String)] {
		match self {
			Self::Rejected { errors, .. } => errors,
			_ => &[],
		}
	}
}

/// A type-to-wire adapter.
///
/// Implementations must be cheap to consult: `is_type` runs during signature
/// construction and once per union arm during encoding.
pub trait Encoder: Send + Sync {
	/// Registry display name, also used for idempotent re-registration.
	fn name(&self) -> &str;

	/// Does this encoder claim the annotation?
	fn is_type(&self, annotation: &Annotation) -> bool;

	/// Distinguish annotations from instances where the two cannot be told
	/// apart; defaults to [`Encoder::is_type`].
	fn is_type_structure(&self, annotation: &Annotation) -> bool {
		self.is_type(annotation)
	}

	/// Materialize a live object of the annotated type from a decoded wire
	/// structure.
	fn encode(
		&self,
		annotation: &Annotation,
		raw: serde_json::Value,
	) -> Result<EncodedObject, EncoderError>;

	/// Convert a live object back to a JSON-safe structure.
	fn serialize(&self, obj: &EncodedObject) -> Result<serde_json::Value, EncoderError>;
}
