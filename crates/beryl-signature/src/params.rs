//! Parameter settings: the classified extraction table.
//!
//! For every non-reserved, non-dependency, non-body field of a signature a
//! [`ParamSetting`] records where the value lives in the request and under
//! which external alias. Classification happens once, against the declared
//! path parameter names; the transformer then partitions the settings into
//! the four extraction sets.

use crate::markers::{FieldDefault, SourceHint};
use crate::model::Signature;
use crate::reserved::ReservedKwarg;
use beryl_encoders::Annotation;
use serde_json::Value;
use std::collections::HashSet;

/// Request location of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
	Path,
	Query,
	Header,
	Cookie,
}

/// Normalized per-parameter extraction record.
#[derive(Debug, Clone)]
pub struct ParamSetting {
	/// Internal kwarg name.
	pub field_name: String,
	/// External name in the request.
	pub field_alias: String,
	pub kind: ParamKind,
	pub default_value: Option<Value>,
	pub is_required: bool,
	pub is_security: bool,
	pub is_requires: bool,
	pub annotation: Annotation,
}

/// Classify the signature's fields into parameter settings.
///
/// The classification table, first match wins:
///
/// | rule | kind | alias |
/// |---|---|---|
/// | field name is a declared path parameter | `Path` | field name |
/// | marker carries a header hint | `Header` | the hint |
/// | marker carries a cookie hint | `Cookie` | the hint |
/// | marker carries a query hint | `Query` | the hint (or field name) |
/// | otherwise | `Query` | field name |
pub fn settings_for(signature: &Signature, path_param_names: &HashSet<String>) -> Vec<ParamSetting> {
	let mut settings = Vec::new();

	for field in signature.model_fields() {
		if ReservedKwarg::is_reserved(&field.name) || field.default.is_dependency() {
			continue;
		}
		// Encoder-bound fields are the request body, not named parameters,
		// unless they are captured by the path.
		if signature.encoders().contains_key(&field.name)
			&& !path_param_names.contains(&field.name)
		{
			continue;
		}
		if matches!(field.default, FieldDefault::Scopes) {
			continue;
		}

		let (marker_default, marker_required, allow_none, source) = match &field.default {
			FieldDefault::Param(marker) => {
				if matches!(marker.source, SourceHint::Body) {
					continue;
				}
				(
					marker.default.clone(),
					marker.required,
					marker.allow_none,
					Some(marker.source.clone()),
				)
			}
			FieldDefault::Value(value) => (Some(value.clone()), false, false, None),
			FieldDefault::Required => (None, true, false, None),
			FieldDefault::Requires(_) | FieldDefault::Security(_) => (None, false, false, None),
			FieldDefault::Inject(_) | FieldDefault::Scopes => continue,
		};

		let (kind, alias) = if path_param_names.contains(&field.name) {
			(ParamKind::Path, field.name.clone())
		} else {
			match &source {
				Some(SourceHint::Header(name)) => (ParamKind::Header, name.clone()),
				Some(SourceHint::Cookie(name)) => (ParamKind::Cookie, name.clone()),
				Some(SourceHint::Query(Some(alias))) => (ParamKind::Query, alias.clone()),
				_ => (ParamKind::Query, field.name.clone()),
			}
		};

		let allows_null = allow_none || field.annotation.allows_null();
		settings.push(ParamSetting {
			field_name: field.name.clone(),
			field_alias: alias,
			kind,
			default_value: marker_default.clone(),
			is_required: marker_required && marker_default.is_none() && !allows_null,
			is_security: field.default.is_security(),
			is_requires: field.default.is_requires(),
			annotation: field.annotation.clone(),
		});
	}

	settings
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::markers::ParamMarker;
	use beryl_encoders::EncoderRegistry;
	use rstest::rstest;
	use serde_json::json;
	use std::sync::Arc;

	fn path_names(names: &[&str]) -> HashSet<String> {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[rstest]
	fn test_path_classification_beats_hints() {
		let signature = Signature::builder("handler")
			.required("username", Annotation::String)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &path_names(&["username"]));

		assert_eq!(settings.len(), 1);
		assert_eq!(settings[0].kind, ParamKind::Path);
		assert_eq!(settings[0].field_alias, "username");
		assert!(settings[0].is_required);
	}

	#[rstest]
	fn test_header_and_cookie_hints() {
		let signature = Signature::builder("handler")
			.param(
				"api_key",
				Annotation::String,
				ParamMarker::header("x-api-key"),
			)
			.param("session", Annotation::String, ParamMarker::cookie("sid"))
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());

		let api_key = settings.iter().find(|s| s.field_name == "api_key").unwrap();
		assert_eq!(api_key.kind, ParamKind::Header);
		assert_eq!(api_key.field_alias, "x-api-key");

		let session = settings.iter().find(|s| s.field_name == "session").unwrap();
		assert_eq!(session.kind, ParamKind::Cookie);
		assert_eq!(session.field_alias, "sid");
	}

	#[rstest]
	fn test_query_alias_hint() {
		let signature = Signature::builder("handler")
			.param(
				"page_size",
				Annotation::Integer,
				ParamMarker::query_as("pageSize"),
			)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());
		assert_eq!(settings[0].kind, ParamKind::Query);
		assert_eq!(settings[0].field_alias, "pageSize");
	}

	#[rstest]
	fn test_unhinted_scalar_defaults_to_query() {
		let signature = Signature::builder("handler")
			.required("limit", Annotation::Integer)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());
		assert_eq!(settings[0].kind, ParamKind::Query);
		assert_eq!(settings[0].field_alias, "limit");
	}

	#[rstest]
	fn test_default_value_makes_optional() {
		let signature = Signature::builder("handler")
			.param(
				"limit",
				Annotation::Integer,
				ParamMarker::query().with_default(json!(20)),
			)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());
		assert!(!settings[0].is_required);
		assert_eq!(settings[0].default_value, Some(json!(20)));
	}

	#[rstest]
	fn test_optional_annotation_not_required() {
		let signature = Signature::builder("handler")
			.required("flag", Annotation::optional(Annotation::Boolean))
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());
		assert!(!settings[0].is_required);
	}

	#[rstest]
	fn test_reserved_and_dependencies_excluded() {
		let signature = Signature::builder("handler")
			.reserved(ReservedKwarg::Request)
			.dependency("db", Annotation::Any)
			.required("q", Annotation::String)
			.build(Arc::new(EncoderRegistry::with_defaults()))
			.unwrap();

		let settings = settings_for(&signature, &HashSet::new());
		let names: Vec<&str> = settings.iter().map(|s| s.field_name.as_str()).collect();
		assert_eq!(names, vec!["q"]);
	}
}
