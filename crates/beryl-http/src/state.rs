//! Application state shared across connections.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Entry = Arc<dyn Any + Send + Sync>;

/// Mutable application-wide state, keyed by name.
///
/// Handlers never receive this handle directly; the `state` reserved kwarg
/// hands out a [shallow copy](AppState::shallow_copy) so in-handler writes
/// cannot leak back into the shared record. The stored values themselves are
/// shared (`Arc`), matching shallow-copy semantics.
///
/// # Examples
///
/// ```
/// use beryl_http::AppState;
///
/// let state = AppState::new();
/// state.insert("greeting", "hello".to_string());
///
/// let copy = state.shallow_copy();
/// assert_eq!(*copy.get::<String>("greeting").unwrap(), "hello");
///
/// copy.insert("greeting", "changed".to_string());
/// assert_eq!(*state.get::<String>("greeting").unwrap(), "hello");
/// ```
#[derive(Clone, Default)]
pub struct AppState {
	entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl AppState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		entries.insert(key.into(), Arc::new(value));
	}

	pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		entries
			.get(key)
			.and_then(|entry| Arc::clone(entry).downcast::<T>().ok())
	}

	pub fn contains(&self, key: &str) -> bool {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// New state with its own entry map sharing the stored values.
	///
	/// Inserting into the copy does not affect the original.
	pub fn shallow_copy(&self) -> Self {
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
		Self {
			entries: Arc::new(RwLock::new(entries.clone())),
		}
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState").field("len", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_insert_and_get_typed() {
		let state = AppState::new();
		state.insert("count", 7u64);
		state.insert("name", "beryl".to_string());

		assert_eq!(*state.get::<u64>("count").unwrap(), 7);
		assert_eq!(*state.get::<String>("name").unwrap(), "beryl");
		assert!(state.get::<u64>("name").is_none());
	}

	#[test]
	fn test_shallow_copy_isolates_map_but_shares_values() {
		let state = AppState::new();
		state.insert("shared", 1i32);

		let copy = state.shallow_copy();
		copy.insert("local", 2i32);

		assert!(copy.contains("shared"));
		assert!(copy.contains("local"));
		assert!(!state.contains("local"));

		// The shared entry is the same allocation in both maps.
		let a = state.get::<i32>("shared").unwrap();
		let b = copy.get::<i32>("shared").unwrap();
		assert!(Arc::ptr_eq(&a, &b));
	}
}
