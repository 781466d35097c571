//! Connection polymorphism over HTTP and WebSocket.

use crate::request::Request;
use crate::state::AppState;
use crate::transport::ScopeKind;
use crate::websocket::WebSocket;
use hyper::HeaderMap;
use std::collections::HashMap;

/// The two connection flavors the dispatch pipeline serves.
///
/// Everything upstream of the handler (parameter extraction, dependency
/// resolution, permissions) is written against this type so the same
/// machinery drives both transports.
#[derive(Debug, Clone)]
pub enum Connection {
	Http(Request),
	WebSocket(WebSocket),
}

impl Connection {
	pub fn kind(&self) -> ScopeKind {
		match self {
			Self::Http(_) => ScopeKind::Http,
			Self::WebSocket(_) => ScopeKind::WebSocket,
		}
	}

	pub fn headers(&self) -> &HeaderMap {
		match self {
			Self::Http(request) => request.headers(),
			Self::WebSocket(socket) => socket.headers(),
		}
	}

	pub fn path_params(&self) -> &HashMap<String, String> {
		match self {
			Self::Http(request) => request.path_params(),
			Self::WebSocket(socket) => socket.path_params(),
		}
	}

	pub fn query_params(&self) -> &HashMap<String, Vec<String>> {
		match self {
			Self::Http(request) => request.query_params(),
			Self::WebSocket(socket) => socket.query_params(),
		}
	}

	pub fn cookies(&self) -> &HashMap<String, String> {
		match self {
			Self::Http(request) => request.cookies(),
			Self::WebSocket(socket) => socket.cookies(),
		}
	}

	pub fn state(&self) -> &AppState {
		match self {
			Self::Http(request) => request.state(),
			Self::WebSocket(socket) => socket.app_state(),
		}
	}

	/// The HTTP request, when this is an HTTP connection.
	pub fn as_request(&self) -> Option<&Request> {
		match self {
			Self::Http(request) => Some(request),
			Self::WebSocket(_) => None,
		}
	}

	/// The socket, when this is a WebSocket connection.
	pub fn as_socket(&self) -> Option<&WebSocket> {
		match self {
			Self::Http(_) => None,
			Self::WebSocket(socket) => Some(socket),
		}
	}
}

impl From<Request> for Connection {
	fn from(request: Request) -> Self {
		Self::Http(request)
	}
}

impl From<WebSocket> for Connection {
	fn from(socket: WebSocket) -> Self {
		Self::WebSocket(socket)
	}
}
