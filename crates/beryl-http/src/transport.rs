//! Transport event shapes and the per-connection scope.
//!
//! A server in front of the dispatcher delivers three things per connection:
//! a [`Scope`] describing the matched request, a receive stream of
//! [`ReceiveEvent`]s and a send sink taking [`SendEvent`]s. The dispatcher
//! never touches sockets directly; everything flows through these events.

use crate::state::AppState;
use crate::websocket::Message;
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Connection flavor carried by the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
	Http,
	WebSocket,
}

/// Everything known about a connection before its body is read.
///
/// Path parameters arrive already captured by the external route matcher;
/// the raw query string is parsed lazily by [`crate::Request`].
#[derive(Debug, Clone)]
pub struct Scope {
	pub kind: ScopeKind,
	pub method: Method,
	pub path: String,
	pub raw_query: String,
	pub headers: HeaderMap,
	pub path_params: HashMap<String, String>,
	pub state: AppState,
}

impl Scope {
	/// Start building an HTTP scope.
	///
	/// # Examples
	///
	/// ```
	/// use beryl_http::Scope;
	/// use hyper::Method;
	///
	/// let scope = Scope::http(Method::GET, "/users/ada")
	///     .path_param("username", "ada")
	///     .build();
	/// assert_eq!(scope.path, "/users/ada");
	/// ```
	pub fn http(method: Method, path: impl Into<String>) -> ScopeBuilder {
		ScopeBuilder::new(ScopeKind::Http, method, path)
	}

	/// Start building a WebSocket scope.
	pub fn websocket(path: impl Into<String>) -> ScopeBuilder {
		ScopeBuilder::new(ScopeKind::WebSocket, Method::GET, path)
	}
}

/// Builder for [`Scope`].
pub struct ScopeBuilder {
	scope: Scope,
}

impl ScopeBuilder {
	fn new(kind: ScopeKind, method: Method, path: impl Into<String>) -> Self {
		Self {
			scope: Scope {
				kind,
				method,
				path: path.into(),
				raw_query: String::new(),
				headers: HeaderMap::new(),
				path_params: HashMap::new(),
				state: AppState::new(),
			},
		}
	}

	pub fn query(mut self, raw_query: impl Into<String>) -> Self {
		self.scope.raw_query = raw_query.into();
		self
	}

	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.scope.headers = headers;
		self
	}

	pub fn header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (
			hyper::header::HeaderName::from_bytes(name.as_bytes()),
			hyper::header::HeaderValue::from_str(value),
		) {
			self.scope.headers.append(name, value);
		}
		self
	}

	pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.scope.path_params.insert(name.into(), value.into());
		self
	}

	pub fn state(mut self, state: AppState) -> Self {
		self.scope.state = state;
		self
	}

	pub fn build(self) -> Scope {
		self.scope
	}
}

/// Events flowing from the transport into the dispatcher.
#[derive(Debug)]
pub enum ReceiveEvent {
	/// A chunk of the HTTP request body. `more_body` is false on the last
	/// chunk; an empty body is a single event with an empty payload.
	Body { body: Bytes, more_body: bool },
	/// The HTTP peer disconnected before the body completed.
	Disconnect,
	/// WebSocket handshake reached the application.
	Connect,
	/// An inbound WebSocket frame.
	WsMessage(Message),
	/// The WebSocket peer disconnected.
	WsDisconnect { code: u16 },
}

/// Events flowing from the dispatcher back to the transport.
#[derive(Debug)]
pub enum SendEvent {
	ResponseStart {
		status: StatusCode,
		headers: HeaderMap,
	},
	ResponseBody {
		body: Bytes,
		more_body: bool,
	},
	WsAccept {
		subprotocol: Option<String>,
		headers: HeaderMap,
	},
	WsSend(Message),
	WsClose {
		code: u16,
		reason: String,
	},
}

/// Send half of a connection's transport channel.
///
/// Cheap to clone; both the pipeline and interceptors write through it.
#[derive(Debug, Clone)]
pub struct Transport {
	tx: mpsc::UnboundedSender<SendEvent>,
}

impl Transport {
	pub fn new(tx: mpsc::UnboundedSender<SendEvent>) -> Self {
		Self { tx }
	}

	/// Create a transport together with the receiver a test (or server glue
	/// layer) reads produced events from.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<SendEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self::new(tx), rx)
	}

	pub fn send(&self, event: SendEvent) -> crate::Result<()> {
		self.tx
			.send(event)
			.map_err(|e| crate::Error::Channel(e.to_string()))
	}

	/// Raw send half, for connection types that own their channel end.
	pub fn sender(&self) -> mpsc::UnboundedSender<SendEvent> {
		self.tx.clone()
	}
}
