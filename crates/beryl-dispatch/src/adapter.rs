//! Response adaptation.
//!
//! The adapter maps a handler's return value to a concrete wire response.
//! Selection is driven by the *declared* return annotation — classified once
//! at registration — and the runtime value is only cast against that class;
//! a mismatch is an internal error, never a client one.

use crate::descriptor::HandlerDescriptor;
use crate::endpoint::HandlerValue;
use beryl_exception::{Exception, Result};
use beryl_http::{Background, MediaType, Response, ResponseCookie};
use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use serde_json::Value;

/// Constructs the concrete wire response for raw handler return values.
///
/// The default implementation builds a plain [`Response`]; applications may
/// install their own to stamp every raw response of a handler (extra
/// headers, custom status semantics) without touching the adapter.
pub trait ResponseFactory: Send + Sync {
	fn build(&self, body: Bytes, status: hyper::StatusCode, media_type: MediaType) -> Response;
}

/// The stock [`ResponseFactory`].
pub struct DefaultResponseFactory;

impl ResponseFactory for DefaultResponseFactory {
	fn build(&self, body: Bytes, status: hyper::StatusCode, media_type: MediaType) -> Response {
		Response::new(status).with_body(body).with_typed_header(
			CONTENT_TYPE,
			hyper::header::HeaderValue::from_str(media_type.as_str())
				.unwrap_or_else(|_| hyper::header::HeaderValue::from_static("application/json")),
		)
	}
}

/// The precomputed class of a handler's declared return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAnnotation {
	/// Returns nothing; an empty response with the handler defaults.
	None,
	/// Raw data serialized under the default media type.
	Raw,
	Json,
	Stream,
	File,
	Redirect,
	Template,
	/// A typed response: the value's own status and headers override the
	/// handler defaults.
	Typed,
	/// An opaque transport response passed through with handler-level
	/// headers and cookies overlaid.
	Transport,
}

/// Adapt a handler return value into a wire response plus the background
/// batch to run after send.
pub fn adapt(
	descriptor: &HandlerDescriptor,
	value: HandlerValue,
) -> Result<(Response, Background)> {
	let defaults = descriptor.render_defaults();
	let mut background = Background::empty();
	if let Some(handler_background) = descriptor.background() {
		background.extend(handler_background.clone());
	}

	let annotation = descriptor.return_annotation();
	let mut response = match (annotation, value) {
		(ReturnAnnotation::None, HandlerValue::None) => {
			Response::new(descriptor.status_code_default())
		}
		(ReturnAnnotation::Raw, HandlerValue::None) => {
			Response::new(descriptor.status_code_default())
		}
		(ReturnAnnotation::Raw, HandlerValue::Raw(data)) => {
			raw_response(descriptor, data)?
		}
		(ReturnAnnotation::Json, HandlerValue::Json(wrapper)) => {
			if let Some(extra) = &wrapper.background {
				background.extend(extra.clone());
			}
			wrapper.into_response(&defaults).map_err(Exception::from)?
		}
		(ReturnAnnotation::Stream, HandlerValue::Stream(wrapper)) => {
			if let Some(extra) = &wrapper.background {
				background.extend(extra.clone());
			}
			wrapper.into_response(&defaults).map_err(Exception::from)?
		}
		(ReturnAnnotation::File, HandlerValue::File(wrapper)) => {
			if let Some(extra) = &wrapper.background {
				background.extend(extra.clone());
			}
			wrapper.into_response(&defaults).map_err(Exception::from)?
		}
		(ReturnAnnotation::Redirect, HandlerValue::Redirect(wrapper)) => {
			if let Some(extra) = &wrapper.background {
				background.extend(extra.clone());
			}
			wrapper.into_response(&defaults).map_err(Exception::from)?
		}
		(ReturnAnnotation::Template, HandlerValue::Template(wrapper)) => {
			if let Some(extra) = &wrapper.background {
				background.extend(extra.clone());
			}
			wrapper.into_response(&defaults).map_err(Exception::from)?
		}
		(ReturnAnnotation::Typed | ReturnAnnotation::Transport, HandlerValue::Transport(r)) => r,
		(declared, got) => {
			return Err(Exception::internal(format!(
				"handler '{}' declares a {declared:?} return but produced a {} value",
				descriptor.name(),
				got.kind()
			)));
		}
	};

	match annotation {
		// Pass-through: handler-level headers and cookies are overlaid on
		// top of whatever the response carries.
		ReturnAnnotation::Transport => {
			for (name, value) in descriptor.response_headers().iter() {
				response.headers.insert(name.clone(), value.clone());
			}
			overlay_cookies(&mut response, descriptor.response_cookies(), true);
		}
		// Everything else: handler defaults first, data-level wins.
		_ => {
			for (name, value) in descriptor.response_headers().iter() {
				if !response.headers.contains_key(name) {
					response.headers.insert(name.clone(), value.clone());
				}
			}
			overlay_cookies(&mut response, descriptor.response_cookies(), false);
		}
	}

	Ok((response, background))
}

/// Union cookies keyed by name. With `force`, the incoming set wins on
/// collisions; otherwise the cookies already on the response do.
fn overlay_cookies(response: &mut Response, cookies: &[ResponseCookie], force: bool) {
	for cookie in cookies {
		match response.cookies.iter_mut().find(|c| c.key == cookie.key) {
			Some(existing) => {
				if force {
					*existing = cookie.clone();
				}
			}
			None => response.cookies.push(cookie.clone()),
		}
	}
}

fn raw_response(descriptor: &HandlerDescriptor, data: Value) -> Result<Response> {
	let media_type = descriptor.media_type_default();
	let body = match media_type {
		MediaType::Json => Bytes::from(
			serde_json::to_vec(&data)
				.map_err(|e| Exception::internal(format!("serialization failed: {e}")))?,
		),
		MediaType::Text | MediaType::Html => match data {
			Value::String(text) => Bytes::from(text),
			other => Bytes::from(other.to_string()),
		},
		other => {
			return Err(Exception::internal(format!(
				"raw return values cannot be serialized as '{other}'"
			)));
		}
	};
	Ok(descriptor
		.response_class()
		.build(body, descriptor.status_code_default(), media_type))
}

/// Render an exception into its wire response, including the mandatory
/// `Allow` header on 405.
pub fn render_exception(exception: &Exception) -> Response {
	let mut response = Response::new(exception.status_code());
	if let Some(allow) = exception.allow_header() {
		response = response.with_header("allow", &allow);
	}
	response
		.with_json(&exception.to_wire())
		.unwrap_or_else(|_| Response::internal_server_error())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::endpoint::endpoint_fn;
	use beryl_encoders::EncoderRegistry;
	use beryl_http::JsonResponse;
	use beryl_signature::Signature;
	use hyper::{Method, StatusCode};
	use serde_json::json;
	use std::sync::Arc;

	fn descriptor(annotation: ReturnAnnotation) -> Arc<HandlerDescriptor> {
		let registry = Arc::new(EncoderRegistry::with_defaults());
		HandlerDescriptor::builder(
			"/things",
			endpoint_fn(|_| async { Ok(HandlerValue::None) }),
		)
		.method(Method::GET)
		.signature(Signature::empty("things", registry))
		.returns(annotation)
		.response_header("x-app", "beryl")
		.response_cookie(ResponseCookie::new("session", "default"))
		.build()
		.unwrap()
	}

	#[test]
	fn test_raw_value_serialized_with_defaults() {
		let descriptor = descriptor(ReturnAnnotation::Raw);
		let (response, _) =
			adapt(&descriptor, HandlerValue::Raw(json!({"user": "ada"}))).unwrap();

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(
			response.body_bytes().unwrap(),
			&Bytes::from_static(b"{\"user\":\"ada\"}")
		);
		assert_eq!(response.headers.get("x-app").unwrap(), "beryl");
	}

	#[test]
	fn test_json_wrapper_headers_win_over_defaults() {
		let descriptor = descriptor(ReturnAnnotation::Json);
		let wrapper = JsonResponse::new(json!([1, 2]))
			.with_status(StatusCode::ACCEPTED)
			.with_header("x-app", "wrapper")
			.with_cookie(ResponseCookie::new("session", "wrapper"));

		let (response, _) = adapt(&descriptor, HandlerValue::Json(wrapper)).unwrap();

		assert_eq!(response.status, StatusCode::ACCEPTED);
		// Data-level header and cookie override the handler defaults.
		assert_eq!(response.headers.get("x-app").unwrap(), "wrapper");
		assert_eq!(response.cookies.len(), 1);
		assert_eq!(response.cookies[0].value, "wrapper");
	}

	#[test]
	fn test_transport_passthrough_overlays_handler_headers() {
		let descriptor = descriptor(ReturnAnnotation::Transport);
		let raw = Response::new(StatusCode::IM_A_TEAPOT)
			.with_header("x-app", "inner")
			.with_body("tea");

		let (response, _) = adapt(&descriptor, HandlerValue::Transport(raw)).unwrap();

		assert_eq!(response.status, StatusCode::IM_A_TEAPOT);
		// Handler-level headers overlay the opaque response.
		assert_eq!(response.headers.get("x-app").unwrap(), "beryl");
	}

	#[test]
	fn test_annotation_mismatch_is_internal() {
		let descriptor = descriptor(ReturnAnnotation::Json);
		let err = adapt(&descriptor, HandlerValue::Raw(json!(1))).unwrap_err();
		assert!(matches!(err, Exception::Internal(_)));
	}

	#[test]
	fn test_render_405_includes_allow() {
		let exc = Exception::MethodNotAllowed {
			allowed: vec![Method::GET, Method::POST],
		};
		let response = render_exception(&exc);

		assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(response.headers.get("allow").unwrap(), "GET, POST");
	}

	#[test]
	fn test_render_validation_error_body() {
		let exc = Exception::from(
			beryl_exception::ValidationException::client("invalid payload").with_errors(vec![
				beryl_exception::ErrorDetail::new("description", "field required"),
			]),
		);
		let response = render_exception(&exc);

		assert_eq!(response.status, StatusCode::BAD_REQUEST);
		let body: serde_json::Value =
			serde_json::from_slice(response.body_bytes().unwrap()).unwrap();
		assert_eq!(body["detail"], "invalid payload");
		assert_eq!(body["errors"][0]["description"], "field required");
	}
}
