//! # Beryl Transform
//!
//! Per-handler transformer models: the entry point of request argument
//! assembly.
//!
//! A [`TransformerModel`] composes a handler's signature, the classified
//! parameter settings of the handler *and* of every dependency it can reach,
//! the reserved-kwarg set and the optional form descriptor. Building one
//! validates the whole arrangement — name disjointness, reserved-kwarg
//! rules, form compatibility, dependency resolvability — so that by the time
//! a request arrives, [`TransformerModel::to_kwargs`] only extracts, applies
//! defaults and populates reserved values.

mod form;
mod model;

pub use form::{FormDescriptor, read_form};
pub use model::TransformerModel;
