//! # Beryl HTTP
//!
//! Connection model and transport plumbing for the beryl dispatch core.
//!
//! This crate owns everything a handler can observe about an inbound
//! connection and everything the framework can say back:
//!
//! - [`Scope`] and the transport event shapes ([`ReceiveEvent`],
//!   [`SendEvent`]) a server feeds into the dispatcher;
//! - [`Request`] and [`WebSocket`], the two [`Connection`] variants, with
//!   one-shot body buffering, multi-map query parsing and cookie access;
//! - [`Response`] (the concrete wire response) and the semantic response
//!   containers ([`JsonResponse`], [`StreamResponse`], [`FileResponse`],
//!   [`RedirectResponse`], [`TemplateResponse`]) handlers declare as return
//!   annotations;
//! - [`AppState`] with shallow-copy handout, [`Background`] tasks and
//!   response cookies.
//!
//! Route matching and the listener loop live outside this crate; the types
//! here are what they hand over once a connection is matched.

mod background;
mod connection;
mod containers;
mod context;
mod cookies;
mod media;
mod request;
mod response;
mod state;
mod transport;
mod websocket;

pub use background::{Background, BackgroundTask};
pub use connection::Connection;
pub use containers::{
	FileResponse, JsonResponse, RedirectResponse, RenderDefaults, StreamResponse,
	TemplateEngine, TemplateResponse,
};
pub use context::HandlerContext;
pub use cookies::{ResponseCookie, SameSite, parse_request_cookies};
pub use media::MediaType;
pub use request::Request;
pub use response::{Response, ResponseBody, StreamBody};
pub use state::AppState;
pub use transport::{ReceiveEvent, Scope, ScopeBuilder, ScopeKind, SendEvent, Transport};
pub use websocket::{Message, WebSocket};

use beryl_exception::{Exception, ValidationException};

/// Errors raised while reading from or writing to a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The peer went away while the body or a frame was being read.
	#[error("connection disconnected")]
	Disconnected,

	/// The transport channel was closed underneath us.
	#[error("transport channel closed: {0}")]
	Channel(String),

	/// The request body was not valid JSON.
	#[error("invalid JSON body: {0}")]
	InvalidJson(String),

	/// The request body was not a valid form payload.
	#[error("invalid form body: {0}")]
	InvalidForm(String),

	/// A value could not be serialized onto the wire.
	#[error("serialization failed: {0}")]
	Serialization(String),

	/// Operation invalid for the current WebSocket state.
	#[error("websocket state error: {0}")]
	WebSocketState(String),

	/// A semantic response container could not be rendered.
	#[error("response rendering failed: {0}")]
	Rendering(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for Exception {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidJson(msg) => Exception::from(
				ValidationException::client("invalid JSON body").with_errors(vec![
					beryl_exception::ErrorDetail::new("body", msg),
				]),
			),
			Error::InvalidForm(msg) => Exception::from(
				ValidationException::client("invalid form body").with_errors(vec![
					beryl_exception::ErrorDetail::new("body", msg),
				]),
			),
			other => Exception::internal(other.to_string()),
		}
	}
}
