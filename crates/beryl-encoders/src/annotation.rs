//! Annotation tree describing handler parameter and return types.

/// A structural description of a parameter's declared type.
///
/// Built once at registration time; the request path only pattern-matches on
/// it. Named schema types appear as [`Annotation::Model`] and are claimed by
/// an encoder in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
	/// No constraint; passes through untouched.
	Any,
	/// The null/unit type. On its own it marks handlers that return nothing;
	/// inside a union it marks optionality.
	Null,
	String,
	Integer,
	Float,
	Boolean,
	/// RFC 3339 timestamp, normalized to whole-second precision on the wire.
	DateTime,
	List(Box<Annotation>),
	Tuple(Vec<Annotation>),
	/// A free-form JSON object.
	Dict,
	/// Sugar for `Union([inner, Null])`.
	Optional(Box<Annotation>),
	Union(Vec<Annotation>),
	/// A named schema type resolved through the encoder registry.
	Model(String),
}

impl Annotation {
	pub fn model(name: impl Into<String>) -> Self {
		Self::Model(name.into())
	}

	pub fn optional(inner: Annotation) -> Self {
		Self::Optional(Box::new(inner))
	}

	pub fn list(inner: Annotation) -> Self {
		Self::List(Box::new(inner))
	}

	/// Whether a null wire value satisfies this annotation.
	pub fn allows_null(&self) -> bool {
		match self {
			Self::Null | Self::Any | Self::Optional(_) => true,
			Self::Union(arms) => arms.iter().any(Annotation::allows_null),
			_ => false,
		}
	}

	/// The non-null arms of this annotation, unwrapping unions and
	/// optionality. A plain annotation is its own single arm.
	pub fn non_null_arms(&self) -> Vec<&Annotation> {
		match self {
			Self::Null => Vec::new(),
			Self::Optional(inner) => inner.non_null_arms(),
			Self::Union(arms) => arms.iter().flat_map(Annotation::non_null_arms).collect(),
			other => vec![other],
		}
	}

	/// Whether this annotation denotes a sequence or mapping container, i.e.
	/// a parameter that should receive the full multi-value list rather than
	/// a collapsed scalar.
	pub fn is_container(&self) -> bool {
		matches!(self, Self::List(_) | Self::Tuple(_) | Self::Dict)
	}

	pub fn model_name(&self) -> Option<&str> {
		match self {
			Self::Model(name) => Some(name),
			Self::Optional(inner) => inner.model_name(),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_optional_allows_null() {
		assert!(Annotation::optional(Annotation::String).allows_null());
		assert!(!Annotation::String.allows_null());
	}

	#[rstest]
	fn test_union_with_null_arm_allows_null() {
		let union = Annotation::Union(vec![Annotation::Integer, Annotation::Null]);
		assert!(union.allows_null());
	}

	#[rstest]
	fn test_non_null_arms_flattens_nested_unions() {
		let union = Annotation::Union(vec![
			Annotation::model("User"),
			Annotation::Union(vec![Annotation::Integer, Annotation::Null]),
		]);

		let arms = union.non_null_arms();
		assert_eq!(
			arms,
			vec![&Annotation::model("User"), &Annotation::Integer]
		);
	}

	#[rstest]
	#[case(Annotation::list(Annotation::String), true)]
	#[case(Annotation::Dict, true)]
	#[case(Annotation::Tuple(vec![Annotation::Integer]), true)]
	#[case(Annotation::String, false)]
	#[case(Annotation::model("User"), false)]
	fn test_is_container(#[case] annotation: Annotation, #[case] expected: bool) {
		assert_eq!(annotation.is_container(), expected);
	}
}
