//! The handler callable boundary.

use async_trait::async_trait;
use beryl_exception::Result;
use beryl_http::{
	FileResponse, JsonResponse, RedirectResponse, Response, StreamResponse, TemplateResponse,
};
use beryl_signature::Kwargs;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What a handler may return.
///
/// The response adapter turns each variant into a concrete wire [`Response`]
/// according to the handler's *declared* return annotation.
pub enum HandlerValue {
	/// Nothing; renders as an empty response with the handler defaults.
	None,
	/// Raw data serialized with the handler's default media type.
	Raw(Value),
	Json(JsonResponse),
	Stream(StreamResponse),
	File(FileResponse),
	Redirect(RedirectResponse),
	Template(TemplateResponse),
	/// A fully built transport response.
	Transport(Response),
}

impl HandlerValue {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Raw(_) => "raw",
			Self::Json(_) => "json",
			Self::Stream(_) => "stream",
			Self::File(_) => "file",
			Self::Redirect(_) => "redirect",
			Self::Template(_) => "template",
			Self::Transport(_) => "transport",
		}
	}
}

impl std::fmt::Debug for HandlerValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.kind())
	}
}

/// A registered handler body, invoked with fully materialized kwargs.
#[async_trait]
pub trait Endpoint: Send + Sync {
	async fn call(&self, kwargs: Kwargs) -> Result<HandlerValue>;
}

struct FnEndpoint<F>(F);

#[async_trait]
impl<F, Fut> Endpoint for FnEndpoint<F>
where
	F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<HandlerValue>> + Send + 'static,
{
	async fn call(&self, kwargs: Kwargs) -> Result<HandlerValue> {
		(self.0)(kwargs).await
	}
}

/// Async handler from a closure.
///
/// # Examples
///
/// ```
/// use beryl_dispatch::{HandlerValue, endpoint_fn};
/// use serde_json::json;
///
/// let endpoint = endpoint_fn(|kwargs| async move {
///     let username = kwargs.str("username")?.to_string();
///     Ok(HandlerValue::Raw(json!({"user": username})))
/// });
/// # let _ = endpoint;
/// ```
pub fn endpoint_fn<F, Fut>(f: F) -> Arc<dyn Endpoint>
where
	F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<HandlerValue>> + Send + 'static,
{
	Arc::new(FnEndpoint(f))
}

struct BlockingEndpoint<F>(Arc<F>);

#[async_trait]
impl<F> Endpoint for BlockingEndpoint<F>
where
	F: Fn(Kwargs) -> Result<HandlerValue> + Send + Sync + 'static,
{
	async fn call(&self, kwargs: Kwargs) -> Result<HandlerValue> {
		let f = Arc::clone(&self.0);
		tokio::task::spawn_blocking(move || f(kwargs))
			.await
			.map_err(|e| beryl_exception::Exception::internal(format!("handler panicked: {e}")))?
	}
}

/// Synchronous handler from a closure; runs on the blocking thread pool so
/// the connection loop is never stalled.
pub fn blocking_endpoint_fn<F>(f: F) -> Arc<dyn Endpoint>
where
	F: Fn(Kwargs) -> Result<HandlerValue> + Send + Sync + 'static,
{
	Arc::new(BlockingEndpoint(Arc::new(f)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn test_async_endpoint() {
		let endpoint = endpoint_fn(|_| async { Ok(HandlerValue::Raw(json!("hi"))) });
		let value = endpoint.call(Kwargs::new()).await.unwrap();
		assert!(matches!(value, HandlerValue::Raw(v) if v == json!("hi")));
	}

	#[tokio::test]
	async fn test_blocking_endpoint_runs_off_loop() {
		let endpoint = blocking_endpoint_fn(|_| {
			// A sync body is free to block here.
			std::thread::sleep(std::time::Duration::from_millis(5));
			Ok(HandlerValue::Raw(json!(7)))
		});
		let value = endpoint.call(Kwargs::new()).await.unwrap();
		assert!(matches!(value, HandlerValue::Raw(v) if v == json!(7)));
	}
}
