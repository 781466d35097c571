//! WebSocket connection lifecycle.

use crate::cookies::parse_request_cookies;
use crate::state::AppState;
use crate::transport::{ReceiveEvent, Scope, SendEvent};
use crate::{Error, Result};
use hyper::HeaderMap;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, mpsc};

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Message {
	Text { data: String },
	Binary { data: Vec<u8> },
	Ping,
	Pong,
	Close { code: u16, reason: String },
}

impl Message {
	pub fn text(data: impl Into<String>) -> Self {
		Self::Text { data: data.into() }
	}

	pub fn binary(data: Vec<u8>) -> Self {
		Self::Binary { data }
	}

	/// Text message holding the JSON serialization of `data`.
	pub fn json<T: serde::Serialize>(data: &T) -> Result<Self> {
		let json = serde_json::to_string(data).map_err(|e| Error::Serialization(e.to_string()))?;
		Ok(Self::text(json))
	}

	/// Parse a text frame as JSON.
	pub fn parse_json(&self) -> Result<serde_json::Value> {
		match self {
			Self::Text { data } => {
				serde_json::from_str(data).map_err(|e| Error::InvalidJson(e.to_string()))
			}
			_ => Err(Error::InvalidJson("not a text frame".into())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WsState {
	Connecting,
	Accepted,
	Closed,
}

/// A WebSocket connection handed to socket handlers.
///
/// The lifecycle is accept → exchange frames → close; sending before
/// [`WebSocket::accept`] or after [`WebSocket::close`] is a state error.
/// Cheap to clone; the frame stream is shared.
#[derive(Clone)]
pub struct WebSocket {
	scope: Arc<Scope>,
	query: Arc<HashMap<String, Vec<String>>>,
	cookies: Arc<HashMap<String, String>>,
	receive: Arc<Mutex<mpsc::Receiver<ReceiveEvent>>>,
	send: mpsc::UnboundedSender<SendEvent>,
	state: Arc<RwLock<WsState>>,
}

impl WebSocket {
	pub fn new(
		scope: Scope,
		receive: mpsc::Receiver<ReceiveEvent>,
		send: mpsc::UnboundedSender<SendEvent>,
	) -> Self {
		let query = Arc::new(parse_ws_query(&scope.raw_query));
		let cookies = Arc::new(parse_request_cookies(&scope.headers));
		Self {
			scope: Arc::new(scope),
			query,
			cookies,
			receive: Arc::new(Mutex::new(receive)),
			send,
			state: Arc::new(RwLock::new(WsState::Connecting)),
		}
	}

	pub fn path(&self) -> &str {
		&self.scope.path
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.scope.headers
	}

	pub fn path_params(&self) -> &HashMap<String, String> {
		&self.scope.path_params
	}

	pub fn query_params(&self) -> &HashMap<String, Vec<String>> {
		&self.query
	}

	pub fn cookies(&self) -> &HashMap<String, String> {
		&self.cookies
	}

	pub fn app_state(&self) -> &AppState {
		&self.scope.state
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	fn current_state(&self) -> WsState {
		*self.state.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(&self, state: WsState) {
		*self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
	}

	pub fn is_accepted(&self) -> bool {
		self.current_state() == WsState::Accepted
	}

	pub fn is_closed(&self) -> bool {
		self.current_state() == WsState::Closed
	}

	/// Complete the handshake.
	pub async fn accept(&self) -> Result<()> {
		self.accept_with(None, HeaderMap::new()).await
	}

	pub async fn accept_with(
		&self,
		subprotocol: Option<String>,
		headers: HeaderMap,
	) -> Result<()> {
		match self.current_state() {
			WsState::Connecting => {
				self.send
					.send(SendEvent::WsAccept {
						subprotocol,
						headers,
					})
					.map_err(|e| Error::Channel(e.to_string()))?;
				self.set_state(WsState::Accepted);
				Ok(())
			}
			WsState::Accepted => Err(Error::WebSocketState("already accepted".into())),
			WsState::Closed => Err(Error::WebSocketState("connection closed".into())),
		}
	}

	/// Receive the next frame.
	pub async fn receive(&self) -> Result<Message> {
		if self.current_state() != WsState::Accepted {
			return Err(Error::WebSocketState(
				"receive before accept or after close".into(),
			));
		}
		let mut receive = self.receive.lock().await;
		loop {
			match receive.recv().await {
				Some(ReceiveEvent::WsMessage(message)) => return Ok(message),
				Some(ReceiveEvent::WsDisconnect { .. }) | None => {
					self.set_state(WsState::Closed);
					return Err(Error::Disconnected);
				}
				Some(ReceiveEvent::Connect) => continue,
				Some(other) => {
					return Err(Error::Channel(format!(
						"unexpected event on websocket: {other:?}"
					)));
				}
			}
		}
	}

	/// Receive a text frame and parse it as JSON.
	///
	/// # Examples
	///
	/// ```no_run
	/// use beryl_http::WebSocket;
	///
	/// async fn echo(socket: WebSocket) -> beryl_http::Result<()> {
	///     socket.accept().await?;
	///     let payload = socket.receive_json().await?;
	///     socket.send_json(&payload).await?;
	///     socket.close(1000, "done").await
	/// }
	/// ```
	pub async fn receive_json(&self) -> Result<serde_json::Value> {
		self.receive().await?.parse_json()
	}

	pub async fn receive_text(&self) -> Result<String> {
		match self.receive().await? {
			Message::Text { data } => Ok(data),
			other => Err(Error::WebSocketState(format!(
				"expected text frame, got {other:?}"
			))),
		}
	}

	fn send_frame(&self, message: Message) -> Result<()> {
		if self.current_state() != WsState::Accepted {
			return Err(Error::WebSocketState(
				"send before accept or after close".into(),
			));
		}
		self.send
			.send(SendEvent::WsSend(message))
			.map_err(|e| Error::Channel(e.to_string()))
	}

	pub async fn send_text(&self, data: impl Into<String>) -> Result<()> {
		self.send_frame(Message::text(data))
	}

	pub async fn send_bytes(&self, data: Vec<u8>) -> Result<()> {
		self.send_frame(Message::binary(data))
	}

	pub async fn send_json<T: serde::Serialize>(&self, data: &T) -> Result<()> {
		self.send_frame(Message::json(data)?)
	}

	/// Close the connection. Idempotent: closing twice is a no-op.
	pub async fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
		if self.current_state() == WsState::Closed {
			return Ok(());
		}
		self.set_state(WsState::Closed);
		self.send
			.send(SendEvent::WsClose {
				code,
				reason: reason.into(),
			})
			.map_err(|e| Error::Channel(e.to_string()))
	}
}

impl std::fmt::Debug for WebSocket {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WebSocket")
			.field("path", &self.scope.path)
			.field("state", &self.current_state())
			.finish()
	}
}

fn parse_ws_query(raw: &str) -> HashMap<String, Vec<String>> {
	let mut params: HashMap<String, Vec<String>> = HashMap::new();
	for pair in raw.split('&') {
		if pair.is_empty() {
			continue;
		}
		let mut parts = pair.splitn(2, '=');
		let key = percent_decode_str(parts.next().unwrap_or(""))
			.decode_utf8_lossy()
			.to_string();
		let value = percent_decode_str(parts.next().unwrap_or(""))
			.decode_utf8_lossy()
			.to_string();
		params.entry(key).or_default().push(value);
	}
	params
}
