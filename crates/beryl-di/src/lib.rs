//! # Beryl DI
//!
//! Named dependency providers for the dispatch core.
//!
//! Providers live in name → [`Dependency`] maps ([`ProviderMap`]) contributed
//! at every ownership level (application, include group, route group,
//! handler). Registration validates eagerly: reserved names, conflicting
//! registrations and structural duplicates all fail at startup.
//!
//! Per handler, [`DependencyGraph::build`] walks the provider signatures into
//! an acyclic graph — cycles are a build-time configuration error with the
//! full path in the message — and [`Resolver`] executes it per request:
//! children before parents, sequentially, with single-flight memoization for
//! `use_cache` records and scope composition across security markers.
//!
//! ## Example
//!
//! ```
//! use beryl_di::{Dependency, DependencyGraph, ProviderMap, value_provider_fn};
//! use beryl_encoders::EncoderRegistry;
//! use beryl_signature::Signature;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(EncoderRegistry::with_defaults());
//! let mut providers = ProviderMap::new();
//! providers
//!     .insert(
//!         "config",
//!         Dependency::cached(
//!             Signature::empty("config", registry),
//!             value_provider_fn(|_| async { Ok(json!({"debug": true})) }),
//!         ),
//!     )
//!     .unwrap();
//!
//! let graph = DependencyGraph::build(&["config".to_string()], &providers).unwrap();
//! assert_eq!(graph.len(), 1);
//! ```

mod graph;
mod provider;
mod resolve;

pub use graph::{DependencyGraph, ProviderMap, merge_chain};
pub use provider::{Dependency, Provide, provider_fn, value_provider_fn};
pub use resolve::Resolver;
