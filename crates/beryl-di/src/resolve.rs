//! Request-time dependency resolution.

use crate::graph::DependencyGraph;
use crate::provider::Dependency;
use beryl_exception::{Exception, Result};
use beryl_http::Connection;
use beryl_signature::{Kwarg, Kwargs, Scopes};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};

/// Resolves a handler's dependency DAG against a live connection.
///
/// Siblings resolve sequentially in declaration order; providers may share
/// mutable state, so nothing here runs concurrently. Security scopes
/// collected while resolving one provider are visible to the next
/// (composition by union).
pub struct Resolver<'a> {
	graph: &'a DependencyGraph,
	connection: &'a Connection,
	/// Raw values already extracted from the connection, covering parameters
	/// that dependency signatures declare.
	extracted: &'a Kwargs,
	scopes: Mutex<Scopes>,
}

impl<'a> Resolver<'a> {
	pub fn new(graph: &'a DependencyGraph, connection: &'a Connection, extracted: &'a Kwargs) -> Self {
		Self {
			graph,
			connection,
			extracted,
			scopes: Mutex::new(Scopes::new()),
		}
	}

	/// Resolve every root dependency into a kwargs map keyed by root name.
	pub async fn resolve_all(&self) -> Result<Kwargs> {
		let mut kwargs = Kwargs::new();
		for root in self.graph.roots() {
			let value = self.resolve(root).await?;
			kwargs.insert(root.clone(), value);
		}
		Ok(kwargs)
	}

	/// Resolve a single named dependency, honoring its cache policy.
	pub fn resolve<'s>(&'s self, name: &'s str) -> BoxFuture<'s, Result<Kwarg>> {
		Box::pin(async move {
			let dependency = self
				.graph
				.node(name)
				.ok_or_else(|| Exception::MissingDependency(name.to_string()))?;
			tracing::debug!(dependency = name, cached = dependency.use_cache(), "resolving");
			dependency
				.resolve_through(|| self.invoke(name, Arc::clone(dependency)))
				.await
		})
	}

	async fn invoke(&self, name: &str, dependency: Arc<Dependency>) -> Result<Kwarg> {
		let mut kwargs = Kwargs::new();

		// Children first, in edge order.
		for child in self.graph.children(name) {
			let value = self.resolve(child).await?;
			kwargs.insert(child.clone(), value);
		}

		// Connection-extracted values for the provider's own parameters.
		for field in dependency.signature().model_fields() {
			if kwargs.contains(&field.name) {
				continue;
			}
			if let Some(value) = self.extracted.get(&field.name) {
				kwargs.insert(field.name.clone(), value.clone());
			}
		}

		// Parse under the shared scope accumulator so Security markers
		// across the batch compose.
		let mut scopes = self
			.scopes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		let parsed = dependency
			.signature()
			.parse_values_with_scopes(self.connection, kwargs, &mut scopes)
			.await?;
		*self.scopes.lock().unwrap_or_else(PoisonError::into_inner) = scopes;

		dependency.provider().provide(parsed).await
	}

	/// Scopes collected so far, for callers that keep resolving afterwards.
	pub fn collected_scopes(&self) -> Scopes {
		self.scopes
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::ProviderMap;
	use crate::provider::value_provider_fn;
	use async_trait::async_trait;
	use beryl_encoders::{Annotation, EncoderRegistry};
	use beryl_http::{Request, Scope};
	use beryl_signature::{SecurityMarker, SecurityScheme, Signature};
	use bytes::Bytes;
	use hyper::Method;
	use serde_json::{Value, json};
	use std::sync::atomic::{AtomicU32, Ordering};

	fn registry() -> Arc<EncoderRegistry> {
		Arc::new(EncoderRegistry::with_defaults())
	}

	fn connection() -> Connection {
		let scope = Scope::http(Method::GET, "/count").build();
		Connection::Http(Request::with_body(scope, Bytes::new()))
	}

	fn counter_provider(calls: Arc<AtomicU32>) -> Arc<dyn crate::provider::Provide> {
		value_provider_fn(move |_| {
			let calls = Arc::clone(&calls);
			async move { Ok(json!(calls.fetch_add(1, Ordering::SeqCst) + 1)) }
		})
	}

	#[tokio::test]
	async fn test_cached_dependency_shared_across_requests() {
		let calls = Arc::new(AtomicU32::new(0));
		let mut map = ProviderMap::new();
		map.insert(
			"counter",
			crate::provider::Dependency::cached(
				Signature::empty("counter", registry()),
				counter_provider(Arc::clone(&calls)),
			),
		)
		.unwrap();

		let graph = DependencyGraph::build(&["counter".to_string()], &map).unwrap();

		// Two sequential requests observe the same value.
		for _ in 0..2 {
			let conn = connection();
			let extracted = Kwargs::new();
			let resolver = Resolver::new(&graph, &conn, &extracted);
			let kwargs = resolver.resolve_all().await.unwrap();
			assert_eq!(kwargs.i64("counter").unwrap(), 1);
		}
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_uncached_dependency_invoked_per_request() {
		let calls = Arc::new(AtomicU32::new(0));
		let mut map = ProviderMap::new();
		map.insert(
			"counter",
			crate::provider::Dependency::new(
				Signature::empty("counter", registry()),
				counter_provider(Arc::clone(&calls)),
			),
		)
		.unwrap();

		let graph = DependencyGraph::build(&["counter".to_string()], &map).unwrap();

		let mut seen = Vec::new();
		for _ in 0..3 {
			let conn = connection();
			let extracted = Kwargs::new();
			let resolver = Resolver::new(&graph, &conn, &extracted);
			seen.push(resolver.resolve_all().await.unwrap().i64("counter").unwrap());
		}

		assert_eq!(seen, vec![1, 2, 3]);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_nested_resolution_passes_child_values() {
		let mut map = ProviderMap::new();
		map.insert(
			"base",
			crate::provider::Dependency::new(
				Signature::empty("base", registry()),
				value_provider_fn(|_| async { Ok(json!(21)) }),
			),
		)
		.unwrap();
		map.insert(
			"double",
			crate::provider::Dependency::new(
				Signature::builder("double")
					.required("base", Annotation::Integer)
					.build(registry())
					.unwrap(),
				value_provider_fn(|kwargs| async move { Ok(json!(kwargs.i64("base")? * 2)) }),
			),
		)
		.unwrap();

		let graph = DependencyGraph::build(&["double".to_string()], &map).unwrap();
		let conn = connection();
		let extracted = Kwargs::new();
		let resolver = Resolver::new(&graph, &conn, &extracted);

		let kwargs = resolver.resolve_all().await.unwrap();
		assert_eq!(kwargs.i64("double").unwrap(), 42);
	}

	#[tokio::test]
	async fn test_provider_reads_extracted_connection_params() {
		let mut map = ProviderMap::new();
		map.insert(
			"greeting",
			crate::provider::Dependency::new(
				Signature::builder("greeting")
					.required("name", Annotation::String)
					.build(registry())
					.unwrap(),
				value_provider_fn(|kwargs| async move {
					Ok(json!(format!("hello {}", kwargs.str("name")?)))
				}),
			),
		)
		.unwrap();

		let graph = DependencyGraph::build(&["greeting".to_string()], &map).unwrap();
		let conn = connection();
		let mut extracted = Kwargs::new();
		extracted.insert("name", Kwarg::Json(json!("ada")));
		let resolver = Resolver::new(&graph, &conn, &extracted);

		let kwargs = resolver.resolve_all().await.unwrap();
		assert_eq!(kwargs.str("greeting").unwrap(), "hello ada");
	}

	struct RecordingScheme;

	#[async_trait]
	impl SecurityScheme for RecordingScheme {
		async fn authenticate(&self, _connection: &Connection, scopes: &Scopes) -> Result<Value> {
			Ok(json!(scopes.iter().collect::<Vec<_>>()))
		}
	}

	#[tokio::test]
	async fn test_security_scopes_compose_across_batch() {
		let scheme = Arc::new(RecordingScheme);
		let mut map = ProviderMap::new();
		map.insert(
			"first",
			crate::provider::Dependency::new(
				Signature::builder("first")
					.security(
						"user",
						Annotation::Any,
						SecurityMarker::new(Arc::clone(&scheme) as _).with_scopes(["read"]),
					)
					.build(registry())
					.unwrap(),
				value_provider_fn(|kwargs| async move { Ok(kwargs.json("user")?.clone()) }),
			),
		)
		.unwrap();
		map.insert(
			"second",
			crate::provider::Dependency::new(
				Signature::builder("second")
					.security(
						"user",
						Annotation::Any,
						SecurityMarker::new(scheme as _).with_scopes(["write"]),
					)
					.build(registry())
					.unwrap(),
				value_provider_fn(|kwargs| async move { Ok(kwargs.json("user")?.clone()) }),
			),
		)
		.unwrap();

		let graph =
			DependencyGraph::build(&["first".to_string(), "second".to_string()], &map).unwrap();
		let conn = connection();
		let extracted = Kwargs::new();
		let resolver = Resolver::new(&graph, &conn, &extracted);

		let kwargs = resolver.resolve_all().await.unwrap();

		// The first batch member sees its own scopes; the second sees the
		// union of everything collected before it plus its own.
		assert_eq!(kwargs.json("first").unwrap(), &json!(["read"]));
		assert_eq!(kwargs.json("second").unwrap(), &json!(["write", "read"]));
		assert_eq!(
			resolver.collected_scopes().iter().collect::<Vec<_>>(),
			vec!["read", "write"]
		);
	}
}
