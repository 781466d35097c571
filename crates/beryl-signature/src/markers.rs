//! Default-value markers attached to signature fields.
//!
//! A field's default decides where its value comes from: a literal, a request
//! location hint, a dependency provider, a no-argument factory or a security
//! scheme. Markers are inert data; the signature factory classifies them once
//! and the request path only matches on the result.

use async_trait::async_trait;
use beryl_exception::Result;
use beryl_http::{Connection, MediaType};
use serde_json::Value;
use std::sync::Arc;

/// Where a scalar parameter is pulled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHint {
	Path,
	/// Query parameter, optionally under an external alias.
	Query(Option<String>),
	/// Header, under the given header name.
	Header(String),
	/// Cookie, under the given cookie name.
	Cookie(String),
	/// Request body field.
	Body,
}

/// Per-parameter extraction marker.
#[derive(Debug, Clone)]
pub struct ParamMarker {
	pub source: SourceHint,
	pub default: Option<Value>,
	pub required: bool,
	pub allow_none: bool,
	pub skip_validation: bool,
	/// Present on body fields; form media types trigger form parsing.
	pub media_type: Option<MediaType>,
}

impl ParamMarker {
	fn new(source: SourceHint) -> Self {
		Self {
			source,
			default: None,
			required: true,
			allow_none: false,
			skip_validation: false,
			media_type: None,
		}
	}

	pub fn query() -> Self {
		Self::new(SourceHint::Query(None))
	}

	pub fn query_as(alias: impl Into<String>) -> Self {
		Self::new(SourceHint::Query(Some(alias.into())))
	}

	pub fn header(name: impl Into<String>) -> Self {
		Self::new(SourceHint::Header(name.into()))
	}

	pub fn cookie(name: impl Into<String>) -> Self {
		Self::new(SourceHint::Cookie(name.into()))
	}

	pub fn path() -> Self {
		Self::new(SourceHint::Path)
	}

	/// JSON body field.
	pub fn body() -> Self {
		Self::new(SourceHint::Body)
	}

	/// Form body field with the given form media type.
	pub fn form(media_type: MediaType) -> Self {
		let mut marker = Self::new(SourceHint::Body);
		marker.media_type = Some(media_type);
		marker
	}

	pub fn with_default(mut self, default: Value) -> Self {
		self.default = Some(default);
		self.required = false;
		self
	}

	pub fn optional(mut self) -> Self {
		self.required = false;
		self.allow_none = true;
		self
	}

	pub fn skip_validation(mut self) -> Self {
		self.skip_validation = true;
		self
	}

	/// Effective requiredness: a required hint with neither default nor
	/// permitted null.
	pub fn is_required(&self) -> bool {
		self.required && self.default.is_none() && !self.allow_none
	}
}

/// Marks a parameter as filled by a named dependency provider.
///
/// The parameter name is the dependency key; a matching provider must exist
/// somewhere on the ownership chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectMarker;

/// A provider invoked with no connection argument, resolved during value
/// parsing.
#[async_trait]
pub trait RequiresFactory: Send + Sync {
	async fn produce(&self) -> Result<Value>;
}

/// Adapter turning an async closure into a [`RequiresFactory`].
pub fn requires_fn<F, Fut>(f: F) -> Arc<dyn RequiresFactory>
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
	struct FnFactory<F>(F);

	#[async_trait]
	impl<F, Fut> RequiresFactory for FnFactory<F>
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
	{
		async fn produce(&self) -> Result<Value> {
			(self.0)().await
		}
	}

	Arc::new(FnFactory(f))
}

/// Deduplicated, insertion-ordered set of security scopes.
///
/// Multiple security markers in one resolution batch compose: the scopes a
/// dependency observes are the union of everything collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes {
	items: Vec<String>,
}

impl Scopes {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_iter<I: IntoIterator<Item = String>>(items: I) -> Self {
		let mut scopes = Self::new();
		for item in items {
			scopes.add(item);
		}
		scopes
	}

	pub fn add(&mut self, scope: impl Into<String>) {
		let scope = scope.into();
		if !self.items.contains(&scope) {
			self.items.push(scope);
		}
	}

	pub fn union(&mut self, other: &Scopes) {
		for scope in &other.items {
			self.add(scope.clone());
		}
	}

	pub fn contains(&self, scope: &str) -> bool {
		self.items.iter().any(|s| s == scope)
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.items.iter().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}

/// An authentication scheme invoked with the live connection.
#[async_trait]
pub trait SecurityScheme: Send + Sync {
	/// Authenticate the connection under the given scopes, returning the
	/// principal value bound to the parameter.
	async fn authenticate(&self, connection: &Connection, scopes: &Scopes) -> Result<Value>;
}

/// Security marker: a scheme plus the scopes it demands.
#[derive(Clone)]
pub struct SecurityMarker {
	pub scheme: Arc<dyn SecurityScheme>,
	pub scopes: Vec<String>,
}

impl SecurityMarker {
	pub fn new(scheme: Arc<dyn SecurityScheme>) -> Self {
		Self {
			scheme,
			scopes: Vec::new(),
		}
	}

	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();
		self
	}
}

impl std::fmt::Debug for SecurityMarker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecurityMarker")
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// What a field falls back to when the request does not supply it.
#[derive(Clone)]
pub enum FieldDefault {
	/// No default; the field must be supplied.
	Required,
	/// Literal default value.
	Value(Value),
	/// Extraction marker with source hints.
	Param(ParamMarker),
	/// Dependency marker; the field name keys into the provider map.
	Inject(InjectMarker),
	/// No-argument factory resolved during parsing.
	Requires(Arc<dyn RequiresFactory>),
	/// Security scheme invoked with the connection.
	Security(SecurityMarker),
	/// Materialize the security scopes collected so far.
	Scopes,
}

impl FieldDefault {
	pub fn is_dependency(&self) -> bool {
		matches!(self, Self::Inject(_))
	}

	pub fn is_security(&self) -> bool {
		matches!(self, Self::Security(_))
	}

	pub fn is_requires(&self) -> bool {
		matches!(self, Self::Requires(_))
	}

	pub fn skip_validation(&self) -> bool {
		matches!(self, Self::Param(marker) if marker.skip_validation)
	}
}

impl std::fmt::Debug for FieldDefault {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Required => f.write_str("Required"),
			Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
			Self::Param(m) => f.debug_tuple("Param").field(m).finish(),
			Self::Inject(_) => f.write_str("Inject"),
			Self::Requires(_) => f.write_str("Requires"),
			Self::Security(m) => f.debug_tuple("Security").field(m).finish(),
			Self::Scopes => f.write_str("Scopes"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_required_hint_interplay() {
		assert!(ParamMarker::query().is_required());
		assert!(!ParamMarker::query().with_default(json!(1)).is_required());
		assert!(!ParamMarker::query().optional().is_required());
	}

	#[rstest]
	fn test_scopes_dedup_and_order() {
		let mut scopes = Scopes::new();
		scopes.add("read");
		scopes.add("write");
		scopes.add("read");

		assert_eq!(scopes.iter().collect::<Vec<_>>(), vec!["read", "write"]);
	}

	#[rstest]
	fn test_scopes_union() {
		let mut a = Scopes::from_iter(["read".to_string()]);
		let b = Scopes::from_iter(["write".to_string(), "read".to_string()]);

		a.union(&b);

		assert_eq!(a.iter().collect::<Vec<_>>(), vec!["read", "write"]);
	}

	#[tokio::test]
	async fn test_requires_fn_adapter() {
		let factory = requires_fn(|| async { Ok(json!("produced")) });
		assert_eq!(factory.produce().await.unwrap(), json!("produced"));
	}
}
