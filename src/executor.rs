//! Background task execution
//!
//! Filter passes and disk-touching resolutions never run on the thread that
//! triggered them. They are handed to a [`TaskExecutor`].

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::HealError;

/// Unit of background work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs tasks off the calling thread
pub trait TaskExecutor: Send + Sync {
	/// Queue a task. Fails if the executor does not accept work anymore.
	fn execute(&self, task: Task) -> Result<(), HealError>;
}

/// Executor backed by tokio's blocking pool
pub struct TokioExecutor {
	handle: Handle,
	shut_down: AtomicBool,
}

impl TokioExecutor {
	/// Use the given runtime
	pub fn new(handle: Handle) -> Self {
		TokioExecutor { handle, shut_down: AtomicBool::new(false) }
	}

	/// Use the runtime of the calling context
	pub fn current() -> Result<Self, HealError> {
		Handle::try_current()
			.map(Self::new)
			.map_err(|e| HealError::Rejected { message: format!("No tokio runtime: {}", e) })
	}

	/// Stop accepting new tasks; already queued tasks still run
	pub fn shutdown(&self) {
		self.shut_down.store(true, Ordering::SeqCst);
	}
}

impl TaskExecutor for TokioExecutor {
	fn execute(&self, task: Task) -> Result<(), HealError> {
		if self.shut_down.load(Ordering::SeqCst) {
			return Err(HealError::Rejected { message: "executor is shut down".to_string() });
		}
		debug!("Queueing background task");
		drop(self.handle.spawn_blocking(task));
		Ok(())
	}
}


// vim: ts=4
