//! Dependency provider records.

use async_trait::async_trait;
use beryl_exception::Result;
use beryl_signature::{Kwarg, Kwargs, Signature};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A callable producing a dependency value from its resolved kwargs.
#[async_trait]
pub trait Provide: Send + Sync {
	async fn provide(&self, kwargs: Kwargs) -> Result<Kwarg>;
}

struct FnProvider<F>(F);

#[async_trait]
impl<F, Fut> Provide for FnProvider<F>
where
	F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Kwarg>> + Send + 'static,
{
	async fn provide(&self, kwargs: Kwargs) -> Result<Kwarg> {
		(self.0)(kwargs).await
	}
}

/// Adapter turning an async closure into a [`Provide`].
pub fn provider_fn<F, Fut>(f: F) -> Arc<dyn Provide>
where
	F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Kwarg>> + Send + 'static,
{
	Arc::new(FnProvider(f))
}

/// Adapter for providers returning plain JSON values.
pub fn value_provider_fn<F, Fut>(f: F) -> Arc<dyn Provide>
where
	F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Value>> + Send + 'static,
{
	Arc::new(FnProvider(move |kwargs| {
		let fut = f(kwargs);
		async move { fut.await.map(Kwarg::Json) }
	}))
}

/// A named provider record: the callable, its signature, the cache policy and
/// the cached value slot.
///
/// The cache slot is the only mutable field, guarded by a single-flight cell:
/// when two requests race on first use, exactly one runs the provider body
/// and both observe the same value. Structural equality
/// ([`Dependency::is_identical`]) is over the callable identity and the cache
/// flag.
pub struct Dependency {
	signature: Arc<Signature>,
	provider: Arc<dyn Provide>,
	use_cache: bool,
	cell: OnceCell<Kwarg>,
}

impl Dependency {
	/// Uncached provider: re-invoked on every request.
	pub fn new(signature: Arc<Signature>, provider: Arc<dyn Provide>) -> Arc<Self> {
		Arc::new(Self {
			signature,
			provider,
			use_cache: false,
			cell: OnceCell::new(),
		})
	}

	/// Cached provider: the first resolution memoizes for the lifetime of
	/// this record.
	pub fn cached(signature: Arc<Signature>, provider: Arc<dyn Provide>) -> Arc<Self> {
		Arc::new(Self {
			signature,
			provider,
			use_cache: true,
			cell: OnceCell::new(),
		})
	}

	pub fn signature(&self) -> &Arc<Signature> {
		&self.signature
	}

	pub fn provider(&self) -> &Arc<dyn Provide> {
		&self.provider
	}

	pub fn use_cache(&self) -> bool {
		self.use_cache
	}

	/// Structural equality over `(callable, use_cache)`.
	pub fn is_identical(&self, other: &Dependency) -> bool {
		Arc::ptr_eq(&self.provider, &other.provider) && self.use_cache == other.use_cache
	}

	/// Run `make` through the cache policy: cached records single-flight the
	/// first invocation and replay its value afterwards, uncached records
	/// invoke every time.
	pub async fn resolve_through<F, Fut>(&self, make: F) -> Result<Kwarg>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Kwarg>>,
	{
		if self.use_cache {
			self.cell.get_or_try_init(make).await.cloned()
		} else {
			make().await
		}
	}
}

impl std::fmt::Debug for Dependency {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dependency")
			.field("signature", &self.signature.name())
			.field("use_cache", &self.use_cache)
			.field("cached", &self.cell.initialized())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use beryl_encoders::EncoderRegistry;
	use serde_json::json;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn empty_signature(name: &str) -> Arc<Signature> {
		Signature::empty(name, Arc::new(EncoderRegistry::with_defaults()))
	}

	#[tokio::test]
	async fn test_cached_record_invokes_once() {
		let calls = Arc::new(AtomicU32::new(0));
		let dep = Dependency::cached(
			empty_signature("counter"),
			value_provider_fn({
				let calls = Arc::clone(&calls);
				move |_| {
					let calls = Arc::clone(&calls);
					async move { Ok(json!(calls.fetch_add(1, Ordering::SeqCst) + 1)) }
				}
			}),
		);

		let make = |d: Arc<Dependency>| async move {
			d.resolve_through(|| async { d.provider().provide(Kwargs::new()).await })
				.await
				.unwrap()
		};

		let first = make(Arc::clone(&dep)).await;
		let second = make(Arc::clone(&dep)).await;

		assert_eq!(first.as_json(), second.as_json());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_uncached_record_invokes_every_time() {
		let calls = Arc::new(AtomicU32::new(0));
		let dep = Dependency::new(
			empty_signature("counter"),
			value_provider_fn({
				let calls = Arc::clone(&calls);
				move |_| {
					let calls = Arc::clone(&calls);
					async move { Ok(json!(calls.fetch_add(1, Ordering::SeqCst) + 1)) }
				}
			}),
		);

		for _ in 0..3 {
			dep.resolve_through(|| async { dep.provider().provide(Kwargs::new()).await })
				.await
				.unwrap();
		}

		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_failed_initialization_is_not_cached() {
		let calls = Arc::new(AtomicU32::new(0));
		let dep = Dependency::cached(
			empty_signature("flaky"),
			value_provider_fn({
				let calls = Arc::clone(&calls);
				move |_| {
					let calls = Arc::clone(&calls);
					async move {
						if calls.fetch_add(1, Ordering::SeqCst) == 0 {
							Err(beryl_exception::Exception::internal("first call fails"))
						} else {
							Ok(json!("ok"))
						}
					}
				}
			}),
		);

		let run = || async {
			dep.resolve_through(|| async { dep.provider().provide(Kwargs::new()).await })
				.await
		};

		assert!(run().await.is_err());
		assert!(run().await.is_ok());
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_structural_equality() {
		let provider = value_provider_fn(|_| async { Ok(json!(1)) });
		let a = Dependency::cached(empty_signature("a"), Arc::clone(&provider));
		let b = Dependency::cached(empty_signature("b"), Arc::clone(&provider));
		let c = Dependency::new(empty_signature("c"), provider);
		let d = Dependency::cached(
			empty_signature("d"),
			value_provider_fn(|_| async { Ok(json!(1)) }),
		);

		// Same callable, same cache flag.
		assert!(a.is_identical(&b));
		// Same callable, different cache flag.
		assert!(!a.is_identical(&c));
		// Different callable.
		assert!(!a.is_identical(&d));
	}
}
