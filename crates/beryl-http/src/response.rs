//! Concrete wire response and its transport emission.

use crate::cookies::ResponseCookie;
use crate::transport::{SendEvent, Transport};
use crate::{Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::Stream;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;
use std::pin::Pin;

/// Boxed byte stream for streaming response bodies.
pub type StreamBody =
	Pin<Box<dyn Stream<Item = std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>>> + Send>>;

/// Response body payload.
pub enum ResponseBody {
	Empty,
	Bytes(Bytes),
	Stream(StreamBody),
}

impl std::fmt::Debug for ResponseBody {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Empty => f.write_str("Empty"),
			Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
			Self::Stream(_) => f.write_str("Stream"),
		}
	}
}

/// HTTP response representation.
///
/// This is the terminal form every handler return value is adapted into
/// before hitting the transport.
#[derive(Debug)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub cookies: Vec<ResponseCookie>,
	pub body: ResponseBody,
}

impl Response {
	/// Create a new response with the given status code.
	///
	/// # Examples
	///
	/// ```
	/// use beryl_http::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			body: ResponseBody::Empty,
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn created() -> Self {
		Self::new(StatusCode::CREATED)
	}

	pub fn no_content() -> Self {
		Self::new(StatusCode::NO_CONTENT)
	}

	pub fn bad_request() -> Self {
		Self::new(StatusCode::BAD_REQUEST)
	}

	pub fn unauthorized() -> Self {
		Self::new(StatusCode::UNAUTHORIZED)
	}

	pub fn forbidden() -> Self {
		Self::new(StatusCode::FORBIDDEN)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = ResponseBody::Bytes(body.into());
		self
	}

	pub fn with_stream(mut self, stream: StreamBody) -> Self {
		self.body = ResponseBody::Stream(stream);
		self
	}

	/// Add a header, silently dropping invalid names or values.
	///
	/// # Examples
	///
	/// ```
	/// use beryl_http::Response;
	///
	/// let response = Response::ok().with_header("x-request-id", "abc");
	/// assert_eq!(response.headers.get("x-request-id").unwrap(), "abc");
	/// ```
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			hyper::header::HeaderName::from_bytes(name.as_bytes()),
			hyper::header::HeaderValue::from_str(value),
		) {
			self.headers.insert(name, value);
		}
		self
	}

	pub fn with_typed_header(
		mut self,
		name: hyper::header::HeaderName,
		value: hyper::header::HeaderValue,
	) -> Self {
		self.headers.insert(name, value);
		self
	}

	pub fn with_cookie(mut self, cookie: ResponseCookie) -> Self {
		self.cookies.push(cookie);
		self
	}

	/// Serialize `data` as the JSON body and set the content type.
	pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
		let body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
		self.body = ResponseBody::Bytes(Bytes::from(body));
		self.headers.insert(
			CONTENT_TYPE,
			hyper::header::HeaderValue::from_static("application/json"),
		);
		Ok(self)
	}

	/// Body bytes when the body is buffered; `None` for streams.
	pub fn body_bytes(&self) -> Option<&Bytes> {
		match &self.body {
			ResponseBody::Bytes(b) => Some(b),
			_ => None,
		}
	}

	/// Fold cookies into `Set-Cookie` headers and return the final header map.
	fn wire_headers(&self) -> HeaderMap {
		let mut headers = self.headers.clone();
		for cookie in &self.cookies {
			if let Ok(value) = hyper::header::HeaderValue::from_str(&cookie.to_header_value()) {
				headers.append(SET_COOKIE, value);
			}
		}
		if let ResponseBody::Bytes(bytes) = &self.body {
			if !headers.contains_key(CONTENT_LENGTH) {
				headers.insert(
					CONTENT_LENGTH,
					hyper::header::HeaderValue::from_str(&bytes.len().to_string())
						.unwrap_or_else(|_| hyper::header::HeaderValue::from_static("0")),
				);
			}
		}
		headers
	}

	/// Emit this response as transport events.
	///
	/// When `discard_body` is set (HEAD requests) the headers — including the
	/// content length of the serialized body — are sent unchanged while the
	/// body itself is dropped.
	pub async fn send(self, transport: &Transport, discard_body: bool) -> Result<()> {
		let headers = self.wire_headers();
		transport.send(SendEvent::ResponseStart {
			status: self.status,
			headers,
		})?;

		if discard_body {
			return transport.send(SendEvent::ResponseBody {
				body: Bytes::new(),
				more_body: false,
			});
		}

		match self.body {
			ResponseBody::Empty => transport.send(SendEvent::ResponseBody {
				body: Bytes::new(),
				more_body: false,
			}),
			ResponseBody::Bytes(bytes) => transport.send(SendEvent::ResponseBody {
				body: bytes,
				more_body: false,
			}),
			ResponseBody::Stream(mut stream) => {
				while let Some(chunk) = stream.next().await {
					let chunk = chunk.map_err(|e| Error::Rendering(e.to_string()))?;
					transport.send(SendEvent::ResponseBody {
						body: chunk,
						more_body: true,
					})?;
				}
				transport.send(SendEvent::ResponseBody {
					body: Bytes::new(),
					more_body: false,
				})
			}
		}
	}
}
