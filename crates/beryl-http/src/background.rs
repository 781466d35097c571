//! Background tasks attached to responses.

use futures::future::BoxFuture;
use std::sync::Arc;

type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A single deferred unit of work.
#[derive(Clone)]
pub struct BackgroundTask {
	name: String,
	task: TaskFn,
}

impl BackgroundTask {
	/// # Examples
	///
	/// ```
	/// use beryl_http::BackgroundTask;
	///
	/// let task = BackgroundTask::new("audit", || Box::pin(async {
	///     // write an audit record
	/// }));
	/// assert_eq!(task.name(), "audit");
	/// ```
	pub fn new<F>(name: impl Into<String>, task: F) -> Self
	where
		F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			task: Arc::new(task),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn run(&self) {
		(self.task)().await;
	}
}

impl std::fmt::Debug for BackgroundTask {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("BackgroundTask").field(&self.name).finish()
	}
}

/// An ordered collection of background tasks executed after the response has
/// been sent.
///
/// Tasks run sequentially in registration order. They are enqueued to run
/// after send, so request cancellation does not reach them.
#[derive(Clone, Debug, Default)]
pub struct Background {
	tasks: Vec<BackgroundTask>,
}

impl Background {
	pub fn new(task: BackgroundTask) -> Self {
		Self { tasks: vec![task] }
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn add(&mut self, task: BackgroundTask) {
		self.tasks.push(task);
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	/// Merge another batch after this one.
	pub fn extend(&mut self, other: Background) {
		self.tasks.extend(other.tasks);
	}

	/// Run every task in order on the current task.
	pub async fn run(self) {
		for task in self.tasks {
			tracing::debug!(task = task.name(), "running background task");
			task.run().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	#[tokio::test]
	async fn test_tasks_run_in_registration_order() {
		let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

		let mut background = Background::empty();
		for name in ["first", "second", "third"] {
			let log = Arc::clone(&log);
			background.add(BackgroundTask::new(name, move || {
				let log = Arc::clone(&log);
				Box::pin(async move {
					log.lock().unwrap().push(name);
				})
			}));
		}

		background.run().await;

		assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
	}

	#[tokio::test]
	async fn test_extend_appends() {
		let counter = Arc::new(Mutex::new(0u32));
		let make = |c: Arc<Mutex<u32>>| {
			BackgroundTask::new("inc", move || {
				let c = Arc::clone(&c);
				Box::pin(async move {
					*c.lock().unwrap() += 1;
				})
			})
		};

		let mut a = Background::new(make(Arc::clone(&counter)));
		let b = Background::new(make(Arc::clone(&counter)));
		a.extend(b);
		assert_eq!(a.len(), 2);

		a.run().await;
		assert_eq!(*counter.lock().unwrap(), 2);
	}
}
