//! Per-folder (or global) collection of current problems

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace};

use super::{Problem, ProblemKey};
use crate::environment::ListenerId;
use crate::error::HealError;
use crate::types::FolderId;

/// Receiver of registry changes. Called outside the registry lock.
pub trait ProblemListener: Send + Sync {
	fn problem_added(&self, problem: &Problem);
	fn problem_removed(&self, problem: &Problem);
}

#[derive(Default)]
struct Entries {
	order: Vec<ProblemKey>,
	by_key: HashMap<ProblemKey, Arc<Problem>>,
}

impl Entries {
	fn take(&mut self, key: &ProblemKey) -> Option<Arc<Problem>> {
		let removed = self.by_key.remove(key)?;
		self.order.retain(|k| k != key);
		Some(removed)
	}
}

/// Set of problems, at most one per [`ProblemKey`], kept in insertion order
pub struct ProblemRegistry {
	folder: Option<FolderId>,
	entries: Mutex<Entries>,
	listeners: RwLock<Vec<(ListenerId, Arc<dyn ProblemListener>)>>,
	next_listener: AtomicU64,
}

impl ProblemRegistry {
	/// Registry accepting problems of any folder
	pub fn new() -> Self {
		ProblemRegistry {
			folder: None,
			entries: Mutex::new(Entries::default()),
			listeners: RwLock::new(Vec::new()),
			next_listener: AtomicU64::new(1),
		}
	}

	/// Registry owned by one folder
	pub fn for_folder(folder: FolderId) -> Self {
		ProblemRegistry { folder: Some(folder), ..Self::new() }
	}

	pub fn folder(&self) -> Option<&FolderId> {
		self.folder.as_ref()
	}

	/// Register a problem. Returns `Ok(false)` if an equal one is already present.
	///
	/// A folder registry refuses problems that name another folder.
	pub fn add(&self, problem: Problem) -> Result<bool, HealError> {
		if let (Some(mine), Some(theirs)) = (&self.folder, problem.folder_id()) {
			if mine != theirs {
				return Err(HealError::invalid(format!(
					"{} problem of folder {} does not belong to folder {}",
					problem.tag(),
					theirs,
					mine
				)));
			}
		}

		let key = problem.key();
		let added = {
			let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
			if entries.by_key.contains_key(&key) {
				trace!("Problem already registered: {:?}", key);
				return Ok(false);
			}
			let problem = Arc::new(problem);
			entries.order.push(key);
			entries.by_key.insert(problem.key(), Arc::clone(&problem));
			problem
		};

		debug!("Problem added: {}", added.tag());
		for listener in self.listener_snapshot() {
			listener.problem_added(&added);
		}
		Ok(true)
	}

	/// Remove the problem equal to `problem`. Returns whether one was present.
	pub fn remove(&self, problem: &Problem) -> bool {
		self.remove_key(&problem.key())
	}

	pub fn remove_key(&self, key: &ProblemKey) -> bool {
		let removed = {
			let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
			entries.take(key)
		};
		match removed {
			Some(problem) => {
				debug!("Problem removed: {}", problem.tag());
				self.notify_removed(&[problem]);
				true
			}
			None => false,
		}
	}

	/// Remove every problem matching `pred`; returns how many went away
	pub fn remove_where<F>(&self, pred: F) -> usize
	where
		F: Fn(&Problem) -> bool,
	{
		let removed: Vec<Arc<Problem>> = {
			let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
			let Entries { order, by_key } = &mut *entries;
			let mut removed = Vec::new();
			order.retain(|key| {
				if !by_key.get(key).map_or(false, |p| pred(p.as_ref())) {
					return true;
				}
				if let Some(p) = by_key.remove(key) {
					removed.push(p);
				}
				false
			});
			removed
		};
		self.notify_removed(&removed);
		removed.len()
	}

	pub fn remove_all(&self) -> usize {
		self.remove_where(|_| true)
	}

	pub fn contains(&self, problem: &Problem) -> bool {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.by_key.contains_key(&problem.key())
	}

	pub fn get(&self, key: &ProblemKey) -> Option<Arc<Problem>> {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.by_key.get(key).cloned()
	}

	pub fn count(&self) -> usize {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.count() == 0
	}

	/// Snapshot in insertion order
	pub fn problems(&self) -> Vec<Arc<Problem>> {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.order.iter().filter_map(|k| entries.by_key.get(k).cloned()).collect()
	}

	pub fn add_listener(&self, listener: Arc<dyn ProblemListener>) -> ListenerId {
		let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
		let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
		listeners.push((id, listener));
		id
	}

	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
		let before = listeners.len();
		listeners.retain(|(lid, _)| *lid != id);
		listeners.len() != before
	}

	fn listener_snapshot(&self) -> Vec<Arc<dyn ProblemListener>> {
		let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
		listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
	}

	fn notify_removed(&self, removed: &[Arc<Problem>]) {
		if removed.is_empty() {
			return;
		}
		let listeners = self.listener_snapshot();
		for problem in removed {
			for listener in &listeners {
				listener.problem_removed(problem);
			}
		}
	}
}

impl Default for ProblemRegistry {
	fn default() -> Self {
		Self::new()
	}
}


// vim: ts=4
