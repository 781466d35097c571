//! Pre-handler interceptors.

use async_trait::async_trait;
use beryl_exception::Result;
use beryl_http::{Scope, Transport};
use std::future::Future;
use std::sync::Arc;

/// Whether the chain continues after an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
	Continue,
	/// The interceptor wrote a response itself; skip the handler.
	Halt,
}

/// A transformer over the connection's scope and transport, run before the
/// request object is even constructed.
///
/// Interceptors run strictly in declaration order, each completing fully
/// (including awaits) before the next begins. Returning [`Control::Halt`]
/// short-circuits the pipeline after the interceptor has written its own
/// response through the transport.
#[async_trait]
pub trait Interceptor: Send + Sync {
	async fn intercept(&self, scope: &mut Scope, transport: &Transport) -> Result<Control>;
}

struct FnInterceptor<F>(F);

#[async_trait]
impl<F, Fut> Interceptor for FnInterceptor<F>
where
	F: Fn(&mut Scope, &Transport) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Control>> + Send + 'static,
{
	async fn intercept(&self, scope: &mut Scope, transport: &Transport) -> Result<Control> {
		(self.0)(scope, transport).await
	}
}

/// Interceptor from a closure.
///
/// # Examples
///
/// ```
/// use beryl_dispatch::{Control, interceptor_fn};
///
/// let tag = interceptor_fn(|scope, _transport| {
///     scope.path_params.insert("traced".into(), "yes".into());
///     async { Ok(Control::Continue) }
/// });
/// # let _ = tag;
/// ```
pub fn interceptor_fn<F, Fut>(f: F) -> Arc<dyn Interceptor>
where
	F: Fn(&mut Scope, &Transport) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Control>> + Send + 'static,
{
	Arc::new(FnInterceptor(f))
}
