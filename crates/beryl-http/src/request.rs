//! HTTP request connection.

use crate::cookies::parse_request_cookies;
use crate::state::AppState;
use crate::transport::{ReceiveEvent, Scope};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use hyper::{HeaderMap, Method};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, mpsc};

/// An HTTP connection as seen by the dispatch pipeline and by handlers.
///
/// Cheap to clone — all request data is shared behind `Arc`s, and the body is
/// a one-shot stream buffered on first read: whichever consumer touches it
/// first (a `data` reserved kwarg, a body encoder, an explicit
/// [`Request::body`] call) drains the transport; every later read observes
/// the same cached bytes.
#[derive(Clone)]
pub struct Request {
	scope: Arc<Scope>,
	query: Arc<HashMap<String, Vec<String>>>,
	cookies: Arc<HashMap<String, String>>,
	receive: Arc<Mutex<mpsc::Receiver<ReceiveEvent>>>,
	body: Arc<OnceCell<Bytes>>,
}

impl Request {
	pub fn new(scope: Scope, receive: mpsc::Receiver<ReceiveEvent>) -> Self {
		let query = Arc::new(parse_query_params(&scope.raw_query));
		let cookies = Arc::new(parse_request_cookies(&scope.headers));
		Self {
			scope: Arc::new(scope),
			query,
			cookies,
			receive: Arc::new(Mutex::new(receive)),
			body: Arc::new(OnceCell::new()),
		}
	}

	/// Request with a pre-buffered body, mainly for tests.
	///
	/// # Examples
	///
	/// ```
	/// use beryl_http::{Request, Scope};
	/// use hyper::Method;
	/// use bytes::Bytes;
	///
	/// # tokio_test::block_on(async {
	/// let scope = Scope::http(Method::POST, "/items").build();
	/// let request = Request::with_body(scope, Bytes::from_static(b"{\"a\":1}"));
	/// assert_eq!(request.json().await.unwrap()["a"], 1);
	/// # });
	/// ```
	pub fn with_body(scope: Scope, body: Bytes) -> Self {
		let (tx, rx) = mpsc::channel(1);
		drop(tx);
		let request = Self::new(scope, rx);
		// A fresh cell cannot already be set.
		request
			.body
			.set(body)
			.unwrap_or_else(|_| unreachable!("body cell freshly created"));
		request
	}

	pub fn method(&self) -> &Method {
		&self.scope.method
	}

	pub fn path(&self) -> &str {
		&self.scope.path
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.scope.headers
	}

	/// Single header value as UTF-8, if present and decodable.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.scope.headers.get(name).and_then(|v| v.to_str().ok())
	}

	pub fn path_params(&self) -> &HashMap<String, String> {
		&self.scope.path_params
	}

	/// Query parameters as a multi-map preserving duplicate keys.
	pub fn query_params(&self) -> &HashMap<String, Vec<String>> {
		&self.query
	}

	pub fn cookies(&self) -> &HashMap<String, String> {
		&self.cookies
	}

	pub fn state(&self) -> &AppState {
		&self.scope.state
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	/// The complete request body.
	///
	/// The first call drains the transport's body events; subsequent calls
	/// return the cached bytes without touching the stream again.
	pub async fn body(&self) -> Result<Bytes> {
		self.body
			.get_or_try_init(|| async {
				let mut receive = self.receive.lock().await;
				let mut buf = BytesMut::new();
				loop {
					match receive.recv().await {
						Some(ReceiveEvent::Body { body, more_body }) => {
							buf.extend_from_slice(&body);
							if !more_body {
								break;
							}
						}
						Some(ReceiveEvent::Disconnect) | None => {
							return Err(Error::Disconnected);
						}
						Some(other) => {
							return Err(Error::Channel(format!(
								"unexpected event while reading body: {other:?}"
							)));
						}
					}
				}
				Ok(buf.freeze())
			})
			.await
			.cloned()
	}

	/// Parse the body as JSON. Reuses the cached body bytes.
	pub async fn json(&self) -> Result<serde_json::Value> {
		let body = self.body().await?;
		serde_json::from_slice(&body).map_err(|e| Error::InvalidJson(e.to_string()))
	}

	/// Parse the body as `application/x-www-form-urlencoded` pairs.
	pub async fn form(&self) -> Result<Vec<(String, String)>> {
		let body = self.body().await?;
		serde_urlencoded::from_bytes(&body).map_err(|e| Error::InvalidForm(e.to_string()))
	}

	pub fn content_type(&self) -> Option<&str> {
		self.header(hyper::header::CONTENT_TYPE.as_str())
	}
}

impl std::fmt::Debug for Request {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Request")
			.field("method", &self.scope.method)
			.field("path", &self.scope.path)
			.finish()
	}
}

/// Parse a raw query string into a percent-decoded multi-map.
///
/// Splits each pair on the first `=` only, so values containing `=` (Base64,
/// formulas) survive intact. Duplicate keys accumulate in order.
fn parse_query_params(raw: &str) -> HashMap<String, Vec<String>> {
	let mut params: HashMap<String, Vec<String>> = HashMap::new();
	if raw.is_empty() {
		return params;
	}
	for pair in raw.split('&') {
		if pair.is_empty() {
			continue;
		}
		let mut parts = pair.splitn(2, '=');
		let key = parts.next().unwrap_or("");
		let value = parts.next().unwrap_or("");
		let key = percent_decode_str(&key.replace('+', " "))
			.decode_utf8_lossy()
			.to_string();
		let value = percent_decode_str(&value.replace('+', " "))
			.decode_utf8_lossy()
			.to_string();
		params.entry(key).or_default().push(value);
	}
	params
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::Scope;
	use rstest::rstest;

	fn request_for_query(raw: &str) -> Request {
		let scope = Scope::http(Method::GET, "/q").query(raw).build();
		Request::with_body(scope, Bytes::new())
	}

	#[rstest]
	fn test_query_preserves_equals_in_value() {
		let request = request_for_query("token=abc==");
		assert_eq!(request.query_params()["token"], vec!["abc==".to_string()]);
	}

	#[rstest]
	fn test_query_duplicate_keys_accumulate() {
		let request = request_for_query("tag=a&tag=b&tag=c");
		assert_eq!(
			request.query_params()["tag"],
			vec!["a".to_string(), "b".to_string(), "c".to_string()]
		);
	}

	#[rstest]
	fn test_query_percent_and_plus_decoding() {
		let request = request_for_query("name=John%20Doe&city=New+York");
		assert_eq!(request.query_params()["name"], vec!["John Doe".to_string()]);
		assert_eq!(request.query_params()["city"], vec!["New York".to_string()]);
	}

	#[rstest]
	fn test_empty_query() {
		let request = request_for_query("");
		assert!(request.query_params().is_empty());
	}

	#[tokio::test]
	async fn test_body_read_exactly_once_from_stream() {
		let scope = Scope::http(Method::POST, "/items").build();
		let (tx, rx) = mpsc::channel(4);
		tx.send(ReceiveEvent::Body {
			body: Bytes::from_static(b"{\"sku\":"),
			more_body: true,
		})
		.await
		.unwrap();
		tx.send(ReceiveEvent::Body {
			body: Bytes::from_static(b"123}"),
			more_body: false,
		})
		.await
		.unwrap();
		drop(tx);

		let request = Request::new(scope, rx);

		// First read drains the channel; second returns the cached value even
		// though the channel is now closed.
		let first = request.body().await.unwrap();
		let second = request.body().await.unwrap();
		assert_eq!(first, Bytes::from_static(b"{\"sku\":123}"));
		assert_eq!(first, second);

		let json = request.json().await.unwrap();
		assert_eq!(json["sku"], 123);
	}

	#[tokio::test]
	async fn test_disconnect_while_reading_body() {
		let scope = Scope::http(Method::POST, "/items").build();
		let (tx, rx) = mpsc::channel(1);
		tx.send(ReceiveEvent::Disconnect).await.unwrap();
		drop(tx);

		let request = Request::new(scope, rx);
		assert!(matches!(request.body().await, Err(Error::Disconnected)));
	}

	#[tokio::test]
	async fn test_form_parsing() {
		let scope = Scope::http(Method::POST, "/submit").build();
		let request = Request::with_body(scope, Bytes::from_static(b"a=1&b=two%20words"));

		let pairs = request.form().await.unwrap();
		assert_eq!(
			pairs,
			vec![
				("a".to_string(), "1".to_string()),
				("b".to_string(), "two words".to_string())
			]
		);
	}

	#[rstest]
	fn test_cookies_parsed_from_scope_headers() {
		let scope = Scope::http(Method::GET, "/")
			.header("cookie", "session=abc; theme=dark")
			.build();
		let request = Request::with_body(scope, Bytes::new());

		assert_eq!(
			request.cookies().get("session").map(String::as_str),
			Some("abc")
		);
		assert_eq!(
			request.cookies().get("theme").map(String::as_str),
			Some("dark")
		);
	}
}
