//! # Beryl Exception
//!
//! The closed error taxonomy shared by every stage of the dispatch pipeline.
//!
//! Errors fall into two broad families:
//!
//! - **Configuration errors** ([`Exception::ImproperlyConfigured`],
//!   [`Exception::MissingDependency`]) raised while an application is being
//!   assembled. They are never recovered: the application must not start.
//! - **Request errors** (validation, permission, lookup failures) raised while
//!   serving a connection and rendered to the client with a fixed status code.
//!
//! Validation failures carry a structured error list so clients receive every
//! offending field in one response rather than the first one found.
//!
//! ## Example
//!
//! ```
//! use beryl_exception::{Exception, ValidationException, ValidationOrigin};
//! use http::StatusCode;
//!
//! let exc = Exception::from(ValidationException::client("invalid payload"));
//! assert_eq!(exc.status_code(), StatusCode::BAD_REQUEST);
//!
//! let exc = Exception::PermissionDenied;
//! assert_eq!(exc.status_code(), StatusCode::FORBIDDEN);
//! ```

use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Exception>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
	/// Field name or dotted path into the offending structure.
	pub field: String,
	/// Human-readable description of what was wrong with the value.
	pub message: String,
}

impl ErrorDetail {
	pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Which side of the connection produced the values that failed validation.
///
/// Client-originated failures (path, query, header, cookie, body fields) are
/// the caller's fault and render as 400-class responses. Server-originated
/// failures come from values produced by dependency providers and render as
/// 500-class responses while still carrying the error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOrigin {
	Client,
	Server,
}

/// Structured validation failure with a batch of field errors.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{detail}")]
pub struct ValidationException {
	pub detail: String,
	pub errors: Vec<ErrorDetail>,
	pub origin: ValidationOrigin,
}

impl ValidationException {
	/// Client-originated validation failure (400-class).
	pub fn client(detail: impl Into<String>) -> Self {
		Self {
			detail: detail.into(),
			errors: Vec::new(),
			origin: ValidationOrigin::Client,
		}
	}

	/// Server-originated validation failure (500-class), used when values
	/// produced by a dependency provider fail structural validation.
	pub fn server(detail: impl Into<String>) -> Self {
		Self {
			detail: detail.into(),
			errors: Vec::new(),
			origin: ValidationOrigin::Server,
		}
	}

	pub fn with_errors(mut self, errors: Vec<ErrorDetail>) -> Self {
		self.errors = errors;
		self
	}

	pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.errors.push(ErrorDetail::new(field, message));
	}

	/// Wire body per the validation error format:
	/// `{"detail": "...", "errors": [{"field": "message"}, ...]}`.
	pub fn to_wire(&self) -> serde_json::Value {
		let errors: Vec<serde_json::Value> = self
			.errors
			.iter()
			.map(|e| json!({ e.field.clone(): e.message.clone() }))
			.collect();
		json!({ "detail": self.detail, "errors": errors })
	}
}

/// The closed exception set of the dispatch core.
///
/// Every variant has a fixed HTTP status; nothing outside this enum crosses a
/// crate boundary as an error.
#[derive(Debug, thiserror::Error)]
pub enum Exception {
	#[error("not authenticated")]
	NotAuthenticated,

	#[error("not authorized")]
	NotAuthorized,

	#[error("permission denied")]
	PermissionDenied,

	#[error("not found")]
	NotFound,

	/// Carries the verbs that *are* allowed so the renderer can emit the
	/// mandatory `Allow` header.
	#[error("method not allowed")]
	MethodNotAllowed { allowed: Vec<Method> },

	#[error(transparent)]
	Validation(#[from] ValidationException),

	#[error("internal server error: {0}")]
	Internal(String),

	#[error("service unavailable")]
	ServiceUnavailable,

	/// Registration-time misconfiguration. The application must not start.
	#[error("improperly configured: {0}")]
	ImproperlyConfigured(String),

	/// A declared dependency has no provider anywhere on the ownership chain.
	#[error("missing dependency: no provider registered for '{0}'")]
	MissingDependency(String),
}

impl Exception {
	pub fn improperly_configured(detail: impl Into<String>) -> Self {
		Self::ImproperlyConfigured(detail.into())
	}

	pub fn internal(detail: impl Into<String>) -> Self {
		Self::Internal(detail.into())
	}

	/// Whether this exception denotes a registration-time failure.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			Self::ImproperlyConfigured(_) | Self::MissingDependency(_)
		)
	}

	/// The HTTP status this exception renders as.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::NotAuthenticated | Self::NotAuthorized => StatusCode::UNAUTHORIZED,
			Self::PermissionDenied => StatusCode::FORBIDDEN,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
			Self::Validation(v) => match v.origin {
				ValidationOrigin::Client => StatusCode::BAD_REQUEST,
				ValidationOrigin::Server => StatusCode::INTERNAL_SERVER_ERROR,
			},
			Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
			Self::ImproperlyConfigured(_) | Self::MissingDependency(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	/// The WebSocket close code this exception maps to when it escapes a
	/// socket handler or denies a handshake.
	///
	/// 1008 (policy violation) for authentication and permission failures,
	/// 1007 (invalid payload) for validation failures, 1011 (internal error)
	/// for everything else.
	pub fn websocket_close_code(&self) -> u16 {
		match self {
			Self::NotAuthenticated | Self::NotAuthorized | Self::PermissionDenied => 1008,
			Self::Validation(_) => 1007,
			Self::NotFound => 1008,
			_ => 1011,
		}
	}

	/// Value for the `Allow` header, present only on 405 responses.
	pub fn allow_header(&self) -> Option<String> {
		match self {
			Self::MethodNotAllowed { allowed } => {
				let mut verbs: Vec<&str> = allowed.iter().map(Method::as_str).collect();
				verbs.sort_unstable();
				Some(verbs.join(", "))
			}
			_ => None,
		}
	}

	/// JSON body for the rendered response.
	pub fn to_wire(&self) -> serde_json::Value {
		match self {
			Self::Validation(v) => v.to_wire(),
			other => json!({ "detail": other.to_string() }),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Exception::NotAuthenticated, StatusCode::UNAUTHORIZED)]
	#[case(Exception::NotAuthorized, StatusCode::UNAUTHORIZED)]
	#[case(Exception::PermissionDenied, StatusCode::FORBIDDEN)]
	#[case(Exception::NotFound, StatusCode::NOT_FOUND)]
	#[case(Exception::ServiceUnavailable, StatusCode::SERVICE_UNAVAILABLE)]
	#[case(Exception::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
	#[case(
		Exception::ImproperlyConfigured("dup".into()),
		StatusCode::INTERNAL_SERVER_ERROR
	)]
	fn test_status_mapping(#[case] exc: Exception, #[case] expected: StatusCode) {
		assert_eq!(exc.status_code(), expected);
	}

	#[rstest]
	fn test_validation_origin_drives_status() {
		let client = Exception::from(ValidationException::client("bad input"));
		let server = Exception::from(ValidationException::server("provider output invalid"));

		assert_eq!(client.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(server.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[rstest]
	fn test_method_not_allowed_allow_header() {
		let exc = Exception::MethodNotAllowed {
			allowed: vec![Method::POST, Method::GET],
		};

		assert_eq!(exc.status_code(), StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(exc.allow_header().as_deref(), Some("GET, POST"));
	}

	#[rstest]
	fn test_allow_header_absent_for_other_variants() {
		assert!(Exception::NotFound.allow_header().is_none());
	}

	#[rstest]
	fn test_validation_wire_format() {
		let mut exc = ValidationException::client("invalid payload");
		exc.push("description", "field required");
		exc.push("sku", "expected string or integer");

		let wire = exc.to_wire();

		assert_eq!(wire["detail"], "invalid payload");
		assert_eq!(wire["errors"][0]["description"], "field required");
		assert_eq!(wire["errors"][1]["sku"], "expected string or integer");
	}

	#[rstest]
	#[case(Exception::PermissionDenied, 1008)]
	#[case(Exception::NotAuthenticated, 1008)]
	#[case(Exception::Validation(ValidationException::client("x")), 1007)]
	#[case(Exception::Internal("x".into()), 1011)]
	fn test_websocket_close_codes(#[case] exc: Exception, #[case] code: u16) {
		assert_eq!(exc.websocket_close_code(), code);
	}

	#[rstest]
	fn test_configuration_predicate() {
		assert!(Exception::improperly_configured("dup provider").is_configuration());
		assert!(Exception::MissingDependency("db".into()).is_configuration());
		assert!(!Exception::NotFound.is_configuration());
	}
}
