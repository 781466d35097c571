//! # Beryl Signature
//!
//! Per-callable signature models for the dispatch core.
//!
//! A [`Signature`] is the immutable, introspection-free description of a
//! handler or provider: every parameter with its [`Annotation`], its
//! [`FieldDefault`] marker and, where applicable, its encoder binding. The
//! [`SignatureBuilder`] is the factory: it classifies parameters once at
//! registration time so the request path only ever pattern-matches on
//! prebuilt data.
//!
//! [`settings_for`] derives the C-style extraction table
//! ([`ParamSetting`]) used by the transformer, and [`Kwargs`] is the
//! materialized argument map handlers ultimately receive.
//!
//! ## Example
//!
//! ```
//! use beryl_signature::{Signature, ParamMarker};
//! use beryl_encoders::{Annotation, EncoderRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(EncoderRegistry::with_defaults());
//! let signature = Signature::builder("list_users")
//!     .required("username", Annotation::String)
//!     .param("limit", Annotation::Integer, ParamMarker::query().with_default(20.into()))
//!     .build(registry)
//!     .unwrap();
//!
//! assert_eq!(signature.model_fields().len(), 2);
//! ```

mod kwargs;
mod markers;
mod model;
mod params;
mod reserved;

pub use kwargs::{Kwarg, Kwargs};
pub use markers::{
	FieldDefault, InjectMarker, ParamMarker, RequiresFactory, Scopes, SecurityMarker,
	SecurityScheme, SourceHint, requires_fn,
};
pub use model::{EncoderBinding, FieldDefinition, Signature, SignatureBuilder, coerce};
pub use params::{ParamKind, ParamSetting, settings_for};
pub use reserved::ReservedKwarg;
