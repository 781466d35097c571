//! Signature model and factory.

use crate::kwargs::{Kwarg, Kwargs};
use crate::markers::{FieldDefault, Scopes, SourceHint};
use crate::reserved::ReservedKwarg;
use beryl_encoders::{Annotation, EncoderError, EncoderRegistry};
use beryl_exception::{ErrorDetail, Exception, Result, ValidationException, ValidationOrigin};
use beryl_http::Connection;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One classified parameter of a callable.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
	pub name: String,
	pub annotation: Annotation,
	pub default: FieldDefault,
}

/// Encoder binding for a body or structured field.
#[derive(Debug, Clone)]
pub struct EncoderBinding {
	pub encoder_name: String,
	pub annotation: Annotation,
}

/// Immutable per-callable descriptor: every parameter with its annotation,
/// default marker and encoder binding.
///
/// Built once by [`SignatureBuilder`] when a handler or provider is
/// registered; the request path never introspects anything else.
pub struct Signature {
	name: String,
	fields: Vec<FieldDefinition>,
	index: HashMap<String, usize>,
	dependency_names: Vec<String>,
	encoders: HashMap<String, EncoderBinding>,
	registry: Arc<EncoderRegistry>,
}

impl Signature {
	pub fn builder(name: impl Into<String>) -> SignatureBuilder {
		SignatureBuilder::new(name)
	}

	/// Signature with no parameters, for zero-argument providers.
	pub fn empty(name: impl Into<String>, registry: Arc<EncoderRegistry>) -> Arc<Self> {
		SignatureBuilder::new(name)
			.build(registry)
			.unwrap_or_else(|_| unreachable!("an empty signature always builds"))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn model_fields(&self) -> &[FieldDefinition] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
		self.index.get(name).map(|&i| &self.fields[i])
	}

	/// Names of parameters whose default is a dependency marker.
	pub fn dependency_names(&self) -> &[String] {
		&self.dependency_names
	}

	pub fn encoders(&self) -> &HashMap<String, EncoderBinding> {
		&self.encoders
	}

	pub fn registry(&self) -> &Arc<EncoderRegistry> {
		&self.registry
	}

	/// The reserved kwargs this signature declares.
	pub fn reserved_kwargs(&self) -> HashSet<ReservedKwarg> {
		self.fields
			.iter()
			.filter_map(|f| ReservedKwarg::from_name(&f.name))
			.collect()
	}

	fn is_dependency(&self, name: &str) -> bool {
		self.dependency_names.iter().any(|n| n == name)
	}

	/// Materialize and validate extracted values against this signature.
	///
	/// `kwargs` holds already-extracted raw values; encoder-bound fields are
	/// encoded, `Requires` and `Security` markers are resolved, scalars are
	/// coerced to their annotations. Failures are batched and classified as
	/// client or server depending on whether the failing field is a
	/// dependency name.
	pub async fn parse_values_for_connection(
		&self,
		connection: &Connection,
		kwargs: Kwargs,
	) -> Result<Kwargs> {
		let mut scopes = Scopes::new();
		self.parse_values_with_scopes(connection, kwargs, &mut scopes)
			.await
	}

	/// Like [`Signature::parse_values_for_connection`] but sharing a scope
	/// accumulator, so security markers across a dependency batch compose.
	pub async fn parse_values_with_scopes(
		&self,
		connection: &Connection,
		mut kwargs: Kwargs,
		scopes: &mut Scopes,
	) -> Result<Kwargs> {
		let mut out = Kwargs::new();
		let mut errors: Vec<ErrorDetail> = Vec::new();
		let mut server_origin = false;

		for field in &self.fields {
			let name = field.name.as_str();

			// Reserved kwargs are markers only: whatever the transformer put
			// there passes through without validation. The body kwargs are
			// the exception — an encoder-bound `data`/`payload` annotation
			// is validated like any other body field.
			let body_reserved = matches!(
				ReservedKwarg::from_name(name),
				Some(ReservedKwarg::Data | ReservedKwarg::Payload)
			);
			if ReservedKwarg::is_reserved(name)
				&& !(body_reserved && self.encoders.contains_key(name))
			{
				if let Some(value) = kwargs.remove(name) {
					out.insert(name, value);
				}
				continue;
			}

			match kwargs.remove(name) {
				Some(value) => {
					if field.default.skip_validation() {
						out.insert(name, value);
						continue;
					}
					match self.materialize(field, value) {
						Ok(materialized) => out.insert(name, materialized),
						Err(field_errors) => {
							if self.is_dependency(name) {
								server_origin = true;
							}
							errors.extend(field_errors);
						}
					}
				}
				None => match &field.default {
					FieldDefault::Requires(factory) => {
						let produced = factory.produce().await?;
						out.insert(name, Kwarg::Json(produced));
					}
					FieldDefault::Security(marker) => {
						let mut demanded = Scopes::from_iter(marker.scopes.iter().cloned());
						demanded.union(scopes);
						let principal =
							marker.scheme.authenticate(connection, &demanded).await?;
						scopes.union(&Scopes::from_iter(marker.scopes.iter().cloned()));
						out.insert(name, Kwarg::Json(principal));
					}
					FieldDefault::Scopes => {
						out.insert(name, Kwarg::Scopes(scopes.clone()));
					}
					FieldDefault::Value(default) => {
						out.insert(name, Kwarg::Json(default.clone()));
					}
					FieldDefault::Param(marker) => {
						if let Some(default) = &marker.default {
							out.insert(name, Kwarg::Json(default.clone()));
						} else if marker.allow_none || field.annotation.allows_null() {
							out.insert(name, Kwarg::Json(Value::Null));
						} else if marker.is_required() {
							if self.is_dependency(name) {
								server_origin = true;
							}
							errors.push(ErrorDetail::new(name, "field required"));
						}
					}
					// Dependencies are resolved by the graph and merged in
					// before this point; an absent one here means the field
					// was optional at the graph level.
					FieldDefault::Inject(_) => {}
					FieldDefault::Required => {
						if field.annotation.allows_null() {
							out.insert(name, Kwarg::Json(Value::Null));
						} else {
							if self.is_dependency(name) {
								server_origin = true;
							}
							errors.push(ErrorDetail::new(name, "field required"));
						}
					}
				},
			}
		}

		if errors.is_empty() {
			Ok(out)
		} else {
			let origin = if server_origin {
				ValidationOrigin::Server
			} else {
				ValidationOrigin::Client
			};
			let exc = ValidationException {
				detail: format!("validation failed for '{}'", self.name),
				errors,
				origin,
			};
			if origin == ValidationOrigin::Server {
				tracing::warn!(
					signature = %self.name,
					"dependency-produced values failed validation"
				);
			}
			Err(Exception::from(exc))
		}
	}

	fn materialize(
		&self,
		field: &FieldDefinition,
		value: Kwarg,
	) -> std::result::Result<Kwarg, Vec<ErrorDetail>> {
		let Kwarg::Json(json) = value else {
			// Already materialized (connection handles, encoded objects).
			return Ok(value);
		};

		if self.encoders.contains_key(&field.name) {
			// Body reserved kwargs report the offending field inside the
			// body by its own name; other fields are prefixed.
			let is_body_kwarg = matches!(
				ReservedKwarg::from_name(&field.name),
				Some(ReservedKwarg::Data | ReservedKwarg::Payload)
			);
			return match self.registry.encode(&field.annotation, json) {
				Ok(obj) if obj.is_null() => Ok(Kwarg::Json(Value::Null)),
				Ok(obj) => Ok(Kwarg::Object(obj)),
				Err(EncoderError::Rejected { errors, .. }) => Err(errors
					.into_iter()
					.map(|(f, m)| {
						if f == "body" {
							ErrorDetail::new(field.name.clone(), m)
						} else if is_body_kwarg {
							ErrorDetail::new(f, m)
						} else {
							ErrorDetail::new(format!("{}.{}", field.name, f), m)
						}
					})
					.collect()),
				Err(other) => Err(vec![ErrorDetail::new(field.name.clone(), other.to_string())]),
			};
		}

		match coerce(&field.annotation, json) {
			Ok(coerced) => Ok(Kwarg::Json(coerced)),
			Err(message) => Err(vec![ErrorDetail::new(field.name.clone(), message)]),
		}
	}
}

impl std::fmt::Debug for Signature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Signature")
			.field("name", &self.name)
			.field("fields", &self.fields.len())
			.field("dependencies", &self.dependency_names)
			.finish()
	}
}

/// Coerce a raw extracted value to its annotation.
///
/// Path, query, header and cookie values arrive as strings; numeric and
/// boolean annotations parse them, containers recurse.
pub fn coerce(annotation: &Annotation, value: Value) -> std::result::Result<Value, String> {
	match annotation {
		Annotation::Any | Annotation::Dict => Ok(value),
		Annotation::Null => match value {
			Value::Null => Ok(Value::Null),
			_ => Err("expected null".into()),
		},
		Annotation::String => match value {
			Value::String(_) => Ok(value),
			_ => Err("expected string".into()),
		},
		Annotation::Integer => match &value {
			Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
			Value::String(s) => s
				.parse::<i64>()
				.map(Value::from)
				.map_err(|_| format!("'{s}' is not a valid integer")),
			_ => Err("expected integer".into()),
		},
		Annotation::Float => match &value {
			Value::Number(_) => Ok(value),
			Value::String(s) => s
				.parse::<f64>()
				.ok()
				.and_then(serde_json::Number::from_f64)
				.map(Value::Number)
				.ok_or_else(|| format!("'{s}' is not a valid number")),
			_ => Err("expected number".into()),
		},
		Annotation::Boolean => match &value {
			Value::Bool(_) => Ok(value),
			Value::String(s) => match s.as_str() {
				"true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
				"false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
				_ => Err(format!("'{s}' is not a valid boolean")),
			},
			_ => Err("expected boolean".into()),
		},
		Annotation::DateTime => match &value {
			Value::String(s) => beryl_encoders::json::normalize_datetime(s).map(Value::String),
			_ => Err("expected datetime string".into()),
		},
		Annotation::List(inner) => match value {
			Value::Array(items) => items
				.into_iter()
				.map(|item| coerce(inner, item))
				.collect::<std::result::Result<Vec<_>, _>>()
				.map(Value::Array),
			other => coerce(inner, other).map(|v| Value::Array(vec![v])),
		},
		Annotation::Tuple(kinds) => match value {
			Value::Array(items) if items.len() == kinds.len() => items
				.into_iter()
				.zip(kinds)
				.map(|(item, kind)| coerce(kind, item))
				.collect::<std::result::Result<Vec<_>, _>>()
				.map(Value::Array),
			Value::Array(items) => Err(format!(
				"expected {} elements, got {}",
				kinds.len(),
				items.len()
			)),
			_ => Err("expected array".into()),
		},
		Annotation::Optional(inner) => match value {
			Value::Null => Ok(Value::Null),
			other => coerce(inner, other),
		},
		Annotation::Union(_) => {
			if value.is_null() && annotation.allows_null() {
				return Ok(Value::Null);
			}
			let arms = annotation.non_null_arms();
			arms.iter()
				.find_map(|arm| coerce(arm, value.clone()).ok())
				.ok_or_else(|| "no union member accepted the value".to_string())
		}
		Annotation::Model(name) => Err(format!(
			"model '{name}' must be resolved through an encoder"
		)),
	}
}

/// Staged field prior to validation.
struct StagedField {
	name: String,
	annotation: Option<Annotation>,
	default: FieldDefault,
}

/// The signature factory.
///
/// Collects parameter declarations and validates them into a [`Signature`]:
/// missing annotations (outside lambda mode), duplicate names and reserved
/// names used as dependency keys are configuration errors.
pub struct SignatureBuilder {
	name: String,
	lambda: bool,
	fields: Vec<StagedField>,
}

impl SignatureBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			lambda: false,
			fields: Vec::new(),
		}
	}

	/// Mark the callable as a lambda: unannotated parameters become `Any`
	/// instead of failing the build.
	pub fn lambda(mut self) -> Self {
		self.lambda = true;
		self
	}

	pub fn field(
		mut self,
		name: impl Into<String>,
		annotation: Annotation,
		default: FieldDefault,
	) -> Self {
		self.fields.push(StagedField {
			name: name.into(),
			annotation: Some(annotation),
			default,
		});
		self
	}

	/// Required scalar parameter.
	pub fn required(self, name: impl Into<String>, annotation: Annotation) -> Self {
		self.field(name, annotation, FieldDefault::Required)
	}

	pub fn with_default(
		self,
		name: impl Into<String>,
		annotation: Annotation,
		default: Value,
	) -> Self {
		self.field(name, annotation, FieldDefault::Value(default))
	}

	pub fn param(
		self,
		name: impl Into<String>,
		annotation: Annotation,
		marker: crate::markers::ParamMarker,
	) -> Self {
		self.field(name, annotation, FieldDefault::Param(marker))
	}

	/// Dependency-injected parameter; the name keys into the provider map.
	pub fn dependency(self, name: impl Into<String>, annotation: Annotation) -> Self {
		self.field(name, annotation, FieldDefault::Inject(crate::markers::InjectMarker))
	}

	pub fn requires(
		self,
		name: impl Into<String>,
		annotation: Annotation,
		factory: Arc<dyn crate::markers::RequiresFactory>,
	) -> Self {
		self.field(name, annotation, FieldDefault::Requires(factory))
	}

	pub fn security(
		self,
		name: impl Into<String>,
		annotation: Annotation,
		marker: crate::markers::SecurityMarker,
	) -> Self {
		self.field(name, annotation, FieldDefault::Security(marker))
	}

	/// Parameter receiving the collected security scopes.
	pub fn scopes(self, name: impl Into<String>) -> Self {
		self.field(name, Annotation::Any, FieldDefault::Scopes)
	}

	/// Reserved kwarg declaration.
	pub fn reserved(self, kwarg: ReservedKwarg) -> Self {
		self.field(kwarg.name(), Annotation::Any, FieldDefault::Required)
	}

	/// A parameter declared without an annotation. Fails the build unless
	/// the callable is a lambda.
	pub fn unannotated(mut self, name: impl Into<String>) -> Self {
		self.fields.push(StagedField {
			name: name.into(),
			annotation: None,
			default: FieldDefault::Required,
		});
		self
	}

	pub fn build(self, registry: Arc<EncoderRegistry>) -> Result<Arc<Signature>> {
		let mut seen: HashSet<&str> = HashSet::new();
		for staged in &self.fields {
			if !seen.insert(staged.name.as_str()) {
				return Err(Exception::improperly_configured(format!(
					"duplicate parameter '{}' in '{}'",
					staged.name, self.name
				)));
			}
		}

		let mut fields = Vec::with_capacity(self.fields.len());
		let mut dependency_names = Vec::new();
		let mut encoders = HashMap::new();

		for staged in self.fields {
			let annotation = match staged.annotation {
				Some(annotation) => annotation,
				None if self.lambda => Annotation::Any,
				None => {
					return Err(Exception::improperly_configured(format!(
						"parameter '{}' of '{}' has no annotation",
						staged.name, self.name
					)));
				}
			};

			let reserved = ReservedKwarg::is_reserved(&staged.name);
			if reserved && staged.default.is_dependency() {
				return Err(Exception::improperly_configured(format!(
					"reserved kwarg '{}' cannot be a dependency in '{}'",
					staged.name, self.name
				)));
			}

			if staged.default.is_dependency() {
				dependency_names.push(staged.name.clone());
			}

			// Body reserved kwargs take part in encoder binding; the other
			// reserved names never do.
			let body_reserved = matches!(
				ReservedKwarg::from_name(&staged.name),
				Some(ReservedKwarg::Data | ReservedKwarg::Payload)
			);
			if (!reserved || body_reserved)
				&& !staged.default.is_dependency()
				&& registry.is_body_encoder(&annotation)
			{
				encoders.insert(
					staged.name.clone(),
					EncoderBinding {
						encoder_name: registry
							.find(first_model_arm(&annotation).unwrap_or(&annotation))
							.map(|e| e.name().to_string())
							.unwrap_or_else(|| "registry".to_string()),
						annotation: annotation.clone(),
					},
				);
			}

			fields.push(FieldDefinition {
				name: staged.name,
				annotation,
				default: staged.default,
			});
		}

		let index = fields
			.iter()
			.enumerate()
			.map(|(i, f)| (f.name.clone(), i))
			.collect();

		Ok(Arc::new(Signature {
			name: self.name,
			fields,
			index,
			dependency_names,
			encoders,
			registry,
		}))
	}
}

fn first_model_arm(annotation: &Annotation) -> Option<&Annotation> {
	match annotation {
		Annotation::Model(_) => Some(annotation),
		Annotation::Optional(inner) | Annotation::List(inner) => first_model_arm(inner),
		Annotation::Union(arms) => arms.iter().find_map(first_model_arm),
		Annotation::Tuple(arms) => arms.iter().find_map(first_model_arm),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::markers::ParamMarker;
	use beryl_encoders::{FieldKind, Schema, SchemaEncoder, SchemaField};
	use beryl_http::{Request, Scope};
	use bytes::Bytes;
	use hyper::Method;
	use rstest::rstest;
	use serde_json::json;

	fn registry_with_item() -> Arc<EncoderRegistry> {
		let schema = Schema::new("Item")
			.field(SchemaField::new("sku", FieldKind::Integer))
			.field(SchemaField::new("description", FieldKind::String))
			.strict(true);
		let registry = EncoderRegistry::with_defaults();
		registry
			.register(Arc::new(SchemaEncoder::new().schema(schema)))
			.unwrap();
		Arc::new(registry)
	}

	fn connection() -> Connection {
		let scope = Scope::http(Method::GET, "/").build();
		Connection::Http(Request::with_body(scope, Bytes::new()))
	}

	#[rstest]
	fn test_unannotated_field_fails_build() {
		let err = Signature::builder("handler")
			.unannotated("mystery")
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap_err();

		assert!(matches!(err, Exception::ImproperlyConfigured(_)));
		assert!(err.to_string().contains("mystery"));
	}

	#[rstest]
	fn test_lambda_tolerates_missing_annotation() {
		let signature = Signature::builder("lambda")
			.lambda()
			.unannotated("x")
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		assert_eq!(signature.field("x").unwrap().annotation, Annotation::Any);
	}

	#[rstest]
	fn test_duplicate_parameter_fails_build() {
		let err = Signature::builder("handler")
			.required("a", Annotation::String)
			.required("a", Annotation::Integer)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap_err();

		assert!(matches!(err, Exception::ImproperlyConfigured(_)));
	}

	#[rstest]
	fn test_reserved_dependency_fails_build() {
		let err = Signature::builder("handler")
			.dependency("data", Annotation::Any)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap_err();

		assert!(err.to_string().contains("data"));
	}

	#[rstest]
	fn test_encoder_binding_detected() {
		let signature = Signature::builder("create_item")
			.required("item", Annotation::model("Item"))
			.build(registry_with_item())
			.unwrap();

		assert!(signature.encoders().contains_key("item"));
		assert!(signature.dependency_names().is_empty());
	}

	#[rstest]
	fn test_dependency_names_collected() {
		let signature = Signature::builder("handler")
			.dependency("db", Annotation::Any)
			.required("username", Annotation::String)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		assert_eq!(signature.dependency_names(), ["db".to_string()]);
	}

	#[tokio::test]
	async fn test_parse_coerces_scalars() {
		let signature = Signature::builder("handler")
			.required("age", Annotation::Integer)
			.required("active", Annotation::Boolean)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let mut kwargs = Kwargs::new();
		kwargs.insert("age", Kwarg::Json(json!("42")));
		kwargs.insert("active", Kwarg::Json(json!("true")));

		let parsed = signature
			.parse_values_for_connection(&connection(), kwargs)
			.await
			.unwrap();

		assert_eq!(parsed.i64("age").unwrap(), 42);
		assert!(parsed.bool("active").unwrap());
	}

	#[tokio::test]
	async fn test_parse_applies_encoder() {
		let signature = Signature::builder("create_item")
			.required("item", Annotation::model("Item"))
			.build(registry_with_item())
			.unwrap();

		let mut kwargs = Kwargs::new();
		kwargs.insert(
			"item",
			Kwarg::Json(json!({"sku": 1, "description": "widget"})),
		);

		let parsed = signature
			.parse_values_for_connection(&connection(), kwargs)
			.await
			.unwrap();

		let obj = parsed.object("item").unwrap();
		assert_eq!(obj.type_name, "Item");
	}

	#[tokio::test]
	async fn test_parse_encoder_rejection_is_client_error() {
		let signature = Signature::builder("create_item")
			.required("item", Annotation::model("Item"))
			.build(registry_with_item())
			.unwrap();

		let mut kwargs = Kwargs::new();
		kwargs.insert("item", Kwarg::Json(json!({"sku": 1})));

		let err = signature
			.parse_values_for_connection(&connection(), kwargs)
			.await
			.unwrap_err();

		match err {
			Exception::Validation(v) => {
				assert_eq!(v.origin, ValidationOrigin::Client);
				assert_eq!(v.errors[0].field, "item.description");
			}
			other => panic!("expected validation error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_parse_dependency_failure_is_server_error() {
		let signature = Signature::builder("handler")
			.field("db", Annotation::Integer, FieldDefault::Inject(crate::markers::InjectMarker))
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		// The resolver supplied a value that does not match the annotation.
		let mut kwargs = Kwargs::new();
		kwargs.insert("db", Kwarg::Json(json!({"not": "an int"})));

		let err = signature
			.parse_values_for_connection(&connection(), kwargs)
			.await
			.unwrap_err();

		match err {
			Exception::Validation(v) => assert_eq!(v.origin, ValidationOrigin::Server),
			other => panic!("expected validation error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_parse_requires_factory_resolved() {
		let factory = crate::markers::requires_fn(|| async { Ok(json!("fresh")) });
		let signature = Signature::builder("handler")
			.requires("token", Annotation::String, factory)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let parsed = signature
			.parse_values_for_connection(&connection(), Kwargs::new())
			.await
			.unwrap();

		assert_eq!(parsed.str("token").unwrap(), "fresh");
	}

	#[tokio::test]
	async fn test_parse_skip_validation_passthrough() {
		let signature = Signature::builder("handler")
			.param(
				"anything",
				Annotation::Integer,
				ParamMarker::query().skip_validation(),
			)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let mut kwargs = Kwargs::new();
		kwargs.insert("anything", Kwarg::Json(json!("not an int")));

		let parsed = signature
			.parse_values_for_connection(&connection(), kwargs)
			.await
			.unwrap();

		assert_eq!(parsed.str("anything").unwrap(), "not an int");
	}

	#[tokio::test]
	async fn test_parse_missing_required_batched() {
		let signature = Signature::builder("handler")
			.required("a", Annotation::String)
			.required("b", Annotation::Integer)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let err = signature
			.parse_values_for_connection(&connection(), Kwargs::new())
			.await
			.unwrap_err();

		match err {
			Exception::Validation(v) => {
				let fields: Vec<&str> = v.errors.iter().map(|e| e.field.as_str()).collect();
				assert_eq!(fields, vec!["a", "b"]);
			}
			other => panic!("expected validation error, got {other:?}"),
		}
	}

	#[rstest]
	#[case(Annotation::Integer, json!("7"), json!(7))]
	#[case(Annotation::Float, json!("2.5"), json!(2.5))]
	#[case(Annotation::Boolean, json!("yes"), json!(true))]
	#[case(Annotation::optional(Annotation::Integer), json!(null), json!(null))]
	#[case(Annotation::list(Annotation::Integer), json!(["1", "2"]), json!([1, 2]))]
	#[case(
		Annotation::Union(vec![Annotation::Integer, Annotation::String]),
		json!("abc"),
		json!("abc")
	)]
	fn test_coerce_matrix(
		#[case] annotation: Annotation,
		#[case] input: Value,
		#[case] expected: Value,
	) {
		assert_eq!(coerce(&annotation, input).unwrap(), expected);
	}

	#[rstest]
	fn test_coerce_scalar_to_single_element_list() {
		// A repeated query parameter sent once still satisfies a list.
		assert_eq!(
			coerce(&Annotation::list(Annotation::String), json!("solo")).unwrap(),
			json!(["solo"])
		);
	}

	#[rstest]
	fn test_coerce_rejects_mismatch() {
		assert!(coerce(&Annotation::Integer, json!("abc")).is_err());
		assert!(coerce(&Annotation::Boolean, json!("maybe")).is_err());
	}
}
