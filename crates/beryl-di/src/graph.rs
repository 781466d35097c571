//! Provider maps, ownership-chain merging and the dependency DAG.

use crate::provider::Dependency;
use beryl_exception::{Exception, Result};
use beryl_signature::ReservedKwarg;
use std::collections::HashMap;
use std::sync::Arc;

/// Name → provider map contributed at one ownership level.
#[derive(Clone, Default)]
pub struct ProviderMap {
	entries: HashMap<String, Arc<Dependency>>,
}

impl ProviderMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a provider under a name.
	///
	/// Rejected at startup: reserved kwarg names, a second registration of
	/// the same name with a structurally different provider, and a provider
	/// structurally equal to one already registered under another name.
	pub fn insert(&mut self, name: impl Into<String>, dependency: Arc<Dependency>) -> Result<()> {
		let name = name.into();
		if ReservedKwarg::is_reserved(&name) {
			return Err(Exception::improperly_configured(format!(
				"'{name}' is a reserved kwarg and cannot be a dependency name"
			)));
		}
		if let Some(existing) = self.entries.get(&name) {
			if existing.is_identical(&dependency) {
				return Ok(());
			}
			return Err(Exception::improperly_configured(format!(
				"conflicting providers registered for '{name}'"
			)));
		}
		for (other_name, other) in &self.entries {
			if other.is_identical(&dependency) {
				return Err(Exception::improperly_configured(format!(
					"provider for '{name}' is structurally equal to the one for '{other_name}'"
				)));
			}
		}
		self.entries.insert(name, dependency);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<&Arc<Dependency>> {
		self.entries.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl std::fmt::Debug for ProviderMap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_set().entries(self.entries.keys()).finish()
	}
}

/// Merge ownership-chain levels root to leaf into one combined map.
///
/// An inner level may shadow an outer one only with a structurally identical
/// provider; any other collision is a configuration error.
pub fn merge_chain(levels: &[&ProviderMap]) -> Result<ProviderMap> {
	let mut combined = ProviderMap::new();
	for level in levels {
		for (name, dependency) in &level.entries {
			match combined.entries.get(name) {
				None => {
					// Cross-name structural duplicates are still rejected.
					for (other_name, other) in &combined.entries {
						if other.is_identical(dependency) {
							return Err(Exception::improperly_configured(format!(
								"provider for '{name}' is structurally equal to the one for \
								 '{other_name}'"
							)));
						}
					}
					combined.entries.insert(name.clone(), Arc::clone(dependency));
				}
				Some(existing) if existing.is_identical(dependency) => {}
				Some(_) => {
					return Err(Exception::improperly_configured(format!(
						"provider for '{name}' conflicts with one registered on an outer level"
					)));
				}
			}
		}
	}
	Ok(combined)
}

/// Per-handler dependency DAG: an arena of provider records indexed by name
/// plus the child edges discovered from each provider's signature.
pub struct DependencyGraph {
	roots: Vec<String>,
	nodes: HashMap<String, Arc<Dependency>>,
	edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
	/// Build the DAG for a handler's dependency names.
	///
	/// Every root must have a provider in the combined map; children are the
	/// provider-signature parameters whose names also appear in the map.
	/// Cycles are rejected here, at build time, with the full cycle path.
	pub fn build(root_names: &[String], providers: &ProviderMap) -> Result<Self> {
		let mut graph = Self {
			roots: root_names.to_vec(),
			nodes: HashMap::new(),
			edges: HashMap::new(),
		};

		#[derive(Clone, Copy, PartialEq)]
		enum Color {
			Gray,
			Black,
		}

		fn visit(
			name: &str,
			providers: &ProviderMap,
			graph: &mut DependencyGraph,
			colors: &mut HashMap<String, Color>,
			path: &mut Vec<String>,
		) -> Result<()> {
			match colors.get(name) {
				Some(Color::Black) => return Ok(()),
				Some(Color::Gray) => {
					let start = path.iter().position(|n| n == name).unwrap_or(0);
					let mut cycle: Vec<&str> =
						path[start..].iter().map(String::as_str).collect();
					cycle.push(name);
					return Err(Exception::improperly_configured(format!(
						"circular dependency detected: {}",
						cycle.join(" -> ")
					)));
				}
				None => {}
			}

			let dependency = providers
				.get(name)
				.ok_or_else(|| Exception::MissingDependency(name.to_string()))?;

			colors.insert(name.to_string(), Color::Gray);
			path.push(name.to_string());

			let children: Vec<String> = dependency
				.signature()
				.model_fields()
				.iter()
				.filter(|field| providers.contains(&field.name))
				.map(|field| field.name.clone())
				.collect();

			for child in &children {
				visit(child, providers, graph, colors, path)?;
			}

			path.pop();
			colors.insert(name.to_string(), Color::Black);
			graph.nodes.insert(name.to_string(), Arc::clone(dependency));
			graph.edges.insert(name.to_string(), children);
			Ok(())
		}

		let mut colors = HashMap::new();
		let mut path = Vec::new();
		for root in root_names {
			visit(root, providers, &mut graph, &mut colors, &mut path)?;
		}
		Ok(graph)
	}

	pub fn roots(&self) -> &[String] {
		&self.roots
	}

	pub fn node(&self, name: &str) -> Option<&Arc<Dependency>> {
		self.nodes.get(name)
	}

	pub fn children(&self, name: &str) -> &[String] {
		self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
	}

	/// All provider records reachable from the roots.
	pub fn dependencies(&self) -> impl Iterator<Item = (&str, &Arc<Dependency>)> {
		self.nodes.iter().map(|(name, dep)| (name.as_str(), dep))
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

impl std::fmt::Debug for DependencyGraph {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DependencyGraph")
			.field("roots", &self.roots)
			.field("nodes", &self.nodes.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::{Dependency, value_provider_fn};
	use beryl_encoders::{Annotation, EncoderRegistry};
	use beryl_signature::Signature;
	use rstest::rstest;
	use serde_json::json;

	fn registry() -> Arc<EncoderRegistry> {
		Arc::new(EncoderRegistry::with_defaults())
	}

	fn leaf(name: &str) -> Arc<Dependency> {
		Dependency::new(
			Signature::empty(name, registry()),
			value_provider_fn(|_| async { Ok(json!(1)) }),
		)
	}

	/// Provider whose signature names other providers as parameters.
	fn with_params(name: &str, params: &[&str]) -> Arc<Dependency> {
		let mut builder = Signature::builder(name);
		for param in params {
			builder = builder.required(*param, Annotation::Any);
		}
		Dependency::new(
			builder.build(registry()).unwrap(),
			value_provider_fn(|_| async { Ok(json!(1)) }),
		)
	}

	#[rstest]
	fn test_reserved_name_rejected() {
		let mut map = ProviderMap::new();
		let err = map.insert("request", leaf("request")).unwrap_err();
		assert!(matches!(err, Exception::ImproperlyConfigured(_)));
	}

	#[rstest]
	fn test_conflicting_same_name_rejected() {
		let mut map = ProviderMap::new();
		map.insert("db", leaf("db")).unwrap();
		let err = map.insert("db", leaf("db2")).unwrap_err();
		assert!(err.to_string().contains("db"));
	}

	#[rstest]
	fn test_identical_same_name_is_idempotent() {
		let dep = leaf("db");
		let mut map = ProviderMap::new();
		map.insert("db", Arc::clone(&dep)).unwrap();
		map.insert("db", dep).unwrap();
		assert_eq!(map.len(), 1);
	}

	#[rstest]
	fn test_structural_duplicate_under_two_names_rejected() {
		let dep = leaf("shared");
		let twin = Dependency::new(
			Signature::empty("twin", registry()),
			Arc::clone(dep.provider()),
		);
		let mut map = ProviderMap::new();
		map.insert("a", dep).unwrap();
		let err = map.insert("b", twin).unwrap_err();
		assert!(err.to_string().contains("structurally equal"));
	}

	#[rstest]
	fn test_chain_shadowing_only_when_identical() {
		let dep = leaf("db");
		let mut outer = ProviderMap::new();
		outer.insert("db", Arc::clone(&dep)).unwrap();
		let mut inner = ProviderMap::new();
		inner.insert("db", dep).unwrap();

		assert!(merge_chain(&[&outer, &inner]).is_ok());

		let mut conflicting = ProviderMap::new();
		conflicting.insert("db", leaf("other")).unwrap();
		let err = merge_chain(&[&outer, &conflicting]).unwrap_err();
		assert!(matches!(err, Exception::ImproperlyConfigured(_)));
	}

	#[rstest]
	fn test_graph_builds_edges_from_signatures() {
		let mut map = ProviderMap::new();
		map.insert("config", leaf("config")).unwrap();
		map.insert("db", with_params("db", &["config"])).unwrap();
		map.insert("service", with_params("service", &["db", "config"]))
			.unwrap();

		let graph = DependencyGraph::build(&["service".to_string()], &map).unwrap();

		assert_eq!(graph.len(), 3);
		assert_eq!(graph.children("service"), ["db", "config"]);
		assert_eq!(graph.children("db"), ["config"]);
		assert!(graph.children("config").is_empty());
	}

	#[rstest]
	fn test_missing_root_provider() {
		let map = ProviderMap::new();
		let err = DependencyGraph::build(&["ghost".to_string()], &map).unwrap_err();
		assert!(matches!(err, Exception::MissingDependency(_)));
	}

	#[rstest]
	fn test_cycle_detected_at_build_time_with_path() {
		// a needs b, b needs a.
		let mut map = ProviderMap::new();
		map.insert("a", with_params("a", &["b"])).unwrap();
		map.insert("b", with_params("b", &["a"])).unwrap();

		let err = DependencyGraph::build(&["a".to_string()], &map).unwrap_err();

		let message = err.to_string();
		assert!(message.contains("circular dependency"));
		assert!(message.contains("a"));
		assert!(message.contains("b"));
		assert!(message.contains("a -> b -> a"));
	}

	#[rstest]
	fn test_self_cycle_detected() {
		let mut map = ProviderMap::new();
		map.insert("narcissus", with_params("narcissus", &["narcissus"]))
			.unwrap();

		let err = DependencyGraph::build(&["narcissus".to_string()], &map).unwrap_err();
		assert!(err.to_string().contains("narcissus -> narcissus"));
	}

	#[rstest]
	fn test_diamond_is_not_a_cycle() {
		let mut map = ProviderMap::new();
		map.insert("base", leaf("base")).unwrap();
		map.insert("left", with_params("left", &["base"])).unwrap();
		map.insert("right", with_params("right", &["base"])).unwrap();
		map.insert("top", with_params("top", &["left", "right"]))
			.unwrap();

		let graph = DependencyGraph::build(&["top".to_string()], &map).unwrap();
		assert_eq!(graph.len(), 4);
	}
}
