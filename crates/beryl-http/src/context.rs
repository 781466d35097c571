//! Per-request handler context.

use crate::transport::ScopeKind;
use hyper::Method;

/// Introspection record handed to handlers through the `context` reserved
/// kwarg: which handler is running, under which template, for which verbs.
///
/// A fresh value is materialized per request; mutating it has no effect on
/// the descriptor it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
	pub handler_name: String,
	pub path_template: String,
	pub methods: Vec<Method>,
	pub kind: ScopeKind,
}

impl HandlerContext {
	pub fn new(
		handler_name: impl Into<String>,
		path_template: impl Into<String>,
		methods: Vec<Method>,
		kind: ScopeKind,
	) -> Self {
		Self {
			handler_name: handler_name.into(),
			path_template: path_template.into(),
			methods,
			kind,
		}
	}
}
