//! The ordered, freezable encoder registry.

use crate::annotation::Annotation;
use crate::object::EncodedObject;
use crate::{Encoder, EncoderError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Process-wide ordered list of encoders.
///
/// Lookup walks the list front to back and the first match wins.
/// [`EncoderRegistry::register`] inserts at the front, which is how
/// registration order expresses precedence: encoders registered later (the
/// application's own) shadow those registered earlier (the defaults).
///
/// The registry freezes on first lookup; from then on registration fails
/// with [`EncoderError::Frozen`].
pub struct EncoderRegistry {
	encoders: RwLock<Vec<Arc<dyn Encoder>>>,
	frozen: AtomicBool,
}

impl EncoderRegistry {
	/// Empty registry. Most applications want [`EncoderRegistry::with_defaults`].
	pub fn new() -> Self {
		Self {
			encoders: RwLock::new(Vec::new()),
			frozen: AtomicBool::new(false),
		}
	}

	/// Registry preloaded with [`crate::RawEncoder`] for plain dictionaries.
	pub fn with_defaults() -> Self {
		let registry = Self::new();
		registry
			.register(Arc::new(crate::RawEncoder))
			.unwrap_or_else(|_| unreachable!("fresh registry cannot be frozen"));
		registry
	}

	/// Register an encoder at the front of the list.
	///
	/// Idempotent by name: re-registering a name removes the previous entry
	/// first, so the newest registration also wins ties against itself.
	pub fn register(&self, encoder: Arc<dyn Encoder>) -> Result<(), EncoderError> {
		if self.frozen.load(Ordering::Acquire) {
			return Err(EncoderError::Frozen);
		}
		if encoder.name().trim().is_empty() {
			return Err(EncoderError::InvalidEncoder(
				"encoder name must not be empty".into(),
			));
		}
		let mut encoders = self
			.encoders
			.write()
			.unwrap_or_else(PoisonError::into_inner);
		encoders.retain(|existing| existing.name() != encoder.name());
		tracing::debug!(encoder = encoder.name(), "registering encoder");
		encoders.insert(0, encoder);
		Ok(())
	}

	/// Freeze explicitly. Implied by the first lookup.
	pub fn freeze(&self) {
		self.frozen.store(true, Ordering::Release);
	}

	pub fn is_frozen(&self) -> bool {
		self.frozen.load(Ordering::Acquire)
	}

	pub fn len(&self) -> usize {
		self.encoders
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn snapshot(&self) -> Vec<Arc<dyn Encoder>> {
		self.freeze();
		self.encoders
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	/// First encoder claiming the annotation directly, if any.
	pub fn find(&self, annotation: &Annotation) -> Option<Arc<dyn Encoder>> {
		self.snapshot()
			.into_iter()
			.find(|encoder| encoder.is_type(annotation))
	}

	/// Whether the annotation should be treated as an encoder-backed body.
	///
	/// Unions count when at least one non-null arm matches; containers are
	/// claimed through their element annotation.
	pub fn is_body_encoder(&self, annotation: &Annotation) -> bool {
		match annotation {
			Annotation::Optional(inner) => self.is_body_encoder(inner),
			Annotation::Union(_) => annotation
				.non_null_arms()
				.into_iter()
				.any(|arm| self.is_body_encoder(arm)),
			Annotation::List(inner) => self.is_body_encoder(inner),
			Annotation::Tuple(arms) => arms.iter().any(|arm| self.is_body_encoder(arm)),
			other => self.find(other).is_some(),
		}
	}

	/// Materialize `raw` as the annotated type.
	pub fn encode(
		&self,
		annotation: &Annotation,
		raw: Value,
	) -> Result<EncodedObject, EncoderError> {
		match annotation {
			Annotation::Optional(inner) => {
				if raw.is_null() {
					Ok(EncodedObject::null())
				} else {
					self.encode(inner, raw)
				}
			}
			Annotation::Union(_) => {
				if raw.is_null() {
					if annotation.allows_null() {
						return Ok(EncodedObject::null());
					}
					return Err(EncoderError::rejected(
						annotation_label(annotation),
						vec![("value".into(), "null is not permitted here".into())],
					));
				}
				// First arm that accepts the value wins.
				let mut last_err = None;
				for arm in annotation.non_null_arms() {
					match self.encode(arm, raw.clone()) {
						Ok(obj) => return Ok(obj),
						Err(err) => last_err = Some(err),
					}
				}
				Err(last_err.unwrap_or_else(|| {
					EncoderError::NotHandled(annotation_label(annotation))
				}))
			}
			Annotation::List(inner) if self.is_body_encoder(inner) => {
				let Value::Array(items) = raw else {
					return Err(EncoderError::rejected(
						annotation_label(annotation),
						vec![("value".into(), "expected a JSON array".into())],
					));
				};
				let mut encoded = Vec::with_capacity(items.len());
				let mut wires = Vec::with_capacity(items.len());
				for (index, item) in items.into_iter().enumerate() {
					let obj = self.encode(inner, item).map_err(|err| match err {
						EncoderError::Rejected { type_name, errors } => EncoderError::Rejected {
							type_name,
							errors: errors
								.into_iter()
								.map(|(field, msg)| (format!("{index}.{field}"), msg))
								.collect(),
						},
						other => other,
					})?;
					wires.push(obj.wire.clone());
					encoded.push(obj);
				}
				Ok(EncodedObject::new(
					annotation_label(annotation),
					Arc::new(encoded),
					Value::Array(wires),
				))
			}
			other => {
				let encoder = self
					.find(other)
					.ok_or_else(|| EncoderError::NotHandled(annotation_label(other)))?;
				encoder.encode(other, raw)
			}
		}
	}

	/// Serialize a materialized object back to its wire form.
	pub fn serialize(&self, obj: &EncodedObject) -> Result<Value, EncoderError> {
		if obj.is_null() {
			return Ok(Value::Null);
		}
		let annotation = Annotation::Model(obj.type_name.clone());
		match self.find(&annotation) {
			Some(encoder) => encoder.serialize(obj),
			// Aggregates and passthrough objects carry their canonical wire form.
			None => Ok(obj.wire.clone()),
		}
	}
}

impl Default for EncoderRegistry {
	fn default() -> Self {
		Self::with_defaults()
	}
}

fn annotation_label(annotation: &Annotation) -> String {
	match annotation {
		Annotation::Model(name) => name.clone(),
		Annotation::List(inner) => format!("list[{}]", annotation_label(inner)),
		Annotation::Optional(inner) => format!("optional[{}]", annotation_label(inner)),
		other => format!("{other:?}").to_lowercase(),
	}
}
