//! The closed set of reserved kwarg names.

/// Parameter names with framework-defined meaning.
///
/// These names may never be used as dependency keys or path parameters;
/// declaring one in a handler signature asks the transformer to materialize
/// the corresponding value instead of extracting it from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedKwarg {
	State,
	Headers,
	Cookies,
	Request,
	Context,
	Socket,
	Data,
	Query,
	Payload,
}

impl ReservedKwarg {
	pub const ALL: [ReservedKwarg; 9] = [
		Self::State,
		Self::Headers,
		Self::Cookies,
		Self::Request,
		Self::Context,
		Self::Socket,
		Self::Data,
		Self::Query,
		Self::Payload,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Self::State => "state",
			Self::Headers => "headers",
			Self::Cookies => "cookies",
			Self::Request => "request",
			Self::Context => "context",
			Self::Socket => "socket",
			Self::Data => "data",
			Self::Query => "query",
			Self::Payload => "payload",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|kwarg| kwarg.name() == name)
	}

	pub fn is_reserved(name: &str) -> bool {
		Self::from_name(name).is_some()
	}

	/// Whether this kwarg consumes the request body.
	pub fn is_body(&self) -> bool {
		matches!(self, Self::Data | Self::Payload)
	}
}
