//! Access-control predicates.

use async_trait::async_trait;
use beryl_exception::Result;
use beryl_http::{Connection, HandlerContext};
use std::future::Future;
use std::sync::Arc;

/// A predicate in the handler's permission chain.
///
/// Predicates run sequentially in declaration order after validation; the
/// first denial aborts the request with 403. A predicate may also raise
/// (e.g. not-authenticated) to abort with its own status.
#[async_trait]
pub trait Permission: Send + Sync {
	async fn has_permission(
		&self,
		connection: &Connection,
		handler: &HandlerContext,
	) -> Result<bool>;
}

struct FnPermission<F>(F);

#[async_trait]
impl<F, Fut> Permission for FnPermission<F>
where
	F: Fn(Connection, HandlerContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<bool>> + Send + 'static,
{
	async fn has_permission(
		&self,
		connection: &Connection,
		handler: &HandlerContext,
	) -> Result<bool> {
		(self.0)(connection.clone(), handler.clone()).await
	}
}

/// Permission from an async closure.
pub fn permission_fn<F, Fut>(f: F) -> Arc<dyn Permission>
where
	F: Fn(Connection, HandlerContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<bool>> + Send + 'static,
{
	Arc::new(FnPermission(f))
}
