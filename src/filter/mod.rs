//! Live filtered view of a folder
//!
//! [`DirectoryFilter`] recomputes a [`FilteredDirectoryModel`] whenever the
//! criteria change or the folder reports a relevant change. Recomputes run
//! on a [`TaskExecutor`], never on the caller's thread, and are single
//! flight: while a pass runs, further triggers collapse into one more pass.
//!
//! Two flags coordinate this. `pending` records that a recompute is wanted,
//! `running` that a worker owns the engine. A trigger always sets `pending`
//! before trying to take `running`, and a worker re-checks `pending` after
//! releasing `running`, so no trigger is lost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::environment::{Folder, FolderEvent, FolderEventKind, FolderListener, ListenerId};
use crate::error::HealError;
use crate::executor::TaskExecutor;
use crate::types::{FileInfo, FolderId};

pub mod keywords;
pub mod model;

pub use keywords::KeywordFilter;
pub use model::{DirectoryTree, FileEntry, FilteredDirectoryModel};

/// Which files of a folder are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
	/// Local files and files with a pending remote version
	#[default]
	LocalAndIncoming,
	/// Files that are up to date locally
	LocalOnly,
	/// Files with a newer remote version
	IncomingOnly,
	/// Files recently downloaded
	NewOnly,
	/// Deleted files and earlier versions
	DeletedAndPrevious,
}

impl FilterMode {
	pub const ALL: [FilterMode; 5] = [
		FilterMode::LocalAndIncoming,
		FilterMode::LocalOnly,
		FilterMode::IncomingOnly,
		FilterMode::NewOnly,
		FilterMode::DeletedAndPrevious,
	];

	/// Whether an entry that passed the keyword filter is shown
	pub fn accepts(&self, entry: &FileEntry) -> bool {
		let deleted = entry.info.deleted;
		match self {
			FilterMode::LocalAndIncoming => !deleted,
			FilterMode::LocalOnly => !deleted && !entry.incoming,
			FilterMode::IncomingOnly => !deleted && entry.incoming,
			FilterMode::NewOnly => !deleted && entry.new_download,
			FilterMode::DeletedAndPrevious => deleted,
		}
	}
}

impl fmt::Display for FilterMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FilterMode::LocalAndIncoming => "local-and-incoming",
			FilterMode::LocalOnly => "local-only",
			FilterMode::IncomingOnly => "incoming-only",
			FilterMode::NewOnly => "new-only",
			FilterMode::DeletedAndPrevious => "deleted-and-previous",
		};
		f.write_str(name)
	}
}

impl FromStr for FilterMode {
	type Err = HealError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().replace('_', "-").as_str() {
			"local-and-incoming" | "all" => Ok(FilterMode::LocalAndIncoming),
			"local-only" | "local" => Ok(FilterMode::LocalOnly),
			"incoming-only" | "incoming" => Ok(FilterMode::IncomingOnly),
			"new-only" | "new" => Ok(FilterMode::NewOnly),
			"deleted-and-previous" | "deleted" => Ok(FilterMode::DeletedAndPrevious),
			_ => Err(HealError::invalid(format!("Unknown filter mode: {}", s))),
		}
	}
}

/// Everything a pass filters by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
	pub search_text: Option<String>,
	pub mode: FilterMode,
	/// Also publish a flat list of all shown files
	pub flat: bool,
	pub show_hidden: bool,
}

impl Default for FilterCriteria {
	fn default() -> Self {
		FilterCriteria { search_text: None, mode: FilterMode::default(), flat: false, show_hidden: true }
	}
}

impl FilterCriteria {
	/// Default mode, not flat and no search text
	pub fn is_default(&self) -> bool {
		self.mode == FilterMode::default()
			&& !self.flat
			&& self.search_text.as_deref().map_or(true, |t| t.trim().is_empty())
	}
}

/// Tallies of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCounts {
	/// Every file walked
	pub original: usize,
	/// Files shown
	pub filtered: usize,
	/// Keyword matches that are neither incoming nor deleted
	pub local: usize,
	pub incoming: usize,
	pub deleted: usize,
}

/// Result of one pass, as handed to listeners
#[derive(Debug, Clone)]
pub struct FilteredDirectoryEvent {
	pub folder: FolderId,
	pub model: Arc<FilteredDirectoryModel>,
	pub flat_model: Option<Arc<Vec<FileInfo>>>,
	pub counts: FilterCounts,
	pub recycled_count: usize,
	/// First result for this folder
	pub folder_changed: bool,
	pub default_filter: bool,
	pub criteria: FilterCriteria,
}

impl FilteredDirectoryEvent {
	pub fn local_count(&self) -> usize {
		self.counts.local
	}

	pub fn incoming_count(&self) -> usize {
		self.counts.incoming
	}

	pub fn deleted_count(&self) -> usize {
		self.counts.deleted
	}
}

/// Receiver of filter results. Called on the worker thread.
pub trait DirectoryFilterListener: Send + Sync {
	/// The subject folder was replaced; current results are void
	fn invalidate(&self) {}

	fn filtering_started(&self) {}

	fn filter_changed(&self, event: &FilteredDirectoryEvent);
}

/// Filter one directory tree. `counts` accumulates over the whole walk.
pub fn filter_directory(
	tree: &DirectoryTree,
	keywords: &KeywordFilter,
	criteria: &FilterCriteria,
	counts: &mut FilterCounts,
) -> FilteredDirectoryModel {
	let mut model = FilteredDirectoryModel::new(tree.name.clone(), tree.path.clone());

	for entry in &tree.files {
		counts.original += 1;
		if entry.hidden && !criteria.show_hidden {
			continue;
		}
		if !keywords.matches(&entry.info) {
			continue;
		}

		if criteria.mode.accepts(entry) {
			counts.filtered += 1;
			model.files.push(entry.info.clone());
			if entry.new_download {
				model.has_new_files = true;
			}
		}

		if entry.info.deleted {
			counts.deleted += 1;
		} else if entry.incoming {
			counts.incoming += 1;
		} else {
			counts.local += 1;
		}
	}

	for sub in &tree.subdirectories {
		if sub.hidden && !criteria.show_hidden {
			continue;
		}
		let child = filter_directory(sub, keywords, criteria, counts);
		model.has_new_files |= child.has_new_files;
		model.subdirectories.push(child);
	}

	model
}

struct FilterState {
	folder: Option<Arc<dyn Folder>>,
	subscription: Option<ListenerId>,
	criteria: FilterCriteria,
}

struct FilterInner {
	executor: Arc<dyn TaskExecutor>,
	state: Mutex<FilterState>,
	running: AtomicBool,
	pending: AtomicBool,
	listeners: RwLock<Vec<(ListenerId, Arc<dyn DirectoryFilterListener>)>>,
	next_listener: AtomicU64,
	last_folder: Mutex<Option<FolderId>>,
	latest: RwLock<Option<Arc<FilteredDirectoryEvent>>>,
	passes: AtomicU64,
}

/// Single-flight filter engine for one view
#[derive(Clone)]
pub struct DirectoryFilter {
	inner: Arc<FilterInner>,
}

impl DirectoryFilter {
	pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
		Self::with_criteria(executor, FilterCriteria::default())
	}

	pub fn with_criteria(executor: Arc<dyn TaskExecutor>, criteria: FilterCriteria) -> Self {
		DirectoryFilter {
			inner: Arc::new(FilterInner {
				executor,
				state: Mutex::new(FilterState { folder: None, subscription: None, criteria }),
				running: AtomicBool::new(false),
				pending: AtomicBool::new(false),
				listeners: RwLock::new(Vec::new()),
				next_listener: AtomicU64::new(1),
				last_folder: Mutex::new(None),
				latest: RwLock::new(None),
				passes: AtomicU64::new(0),
			}),
		}
	}

	/// Make `folder` the subject and schedule a pass.
	///
	/// Switching to another folder unsubscribes from the old one and
	/// invalidates listeners.
	pub fn set_folder(&self, folder: Arc<dyn Folder>) {
		let new_id = folder.info().id.clone();
		let changed = {
			let state = self.inner.lock_state();
			state.folder.as_ref().map_or(true, |f| f.info().id != new_id)
		};

		let subscription = if changed {
			let watcher = Arc::new(FolderWatcher { filter: Arc::downgrade(&self.inner) });
			Some(folder.add_folder_listener(watcher))
		} else {
			None
		};

		let previous = {
			let mut state = self.inner.lock_state();
			let previous = if changed {
				state.folder.take().zip(state.subscription.take())
			} else {
				None
			};
			state.folder = Some(folder);
			if subscription.is_some() {
				state.subscription = subscription;
			}
			previous
		};

		if let Some((old, id)) = previous {
			old.remove_folder_listener(id);
		}
		if changed {
			debug!("Filtering folder {}", new_id);
			for listener in self.inner.listener_snapshot() {
				listener.invalidate();
			}
		}
		self.inner.schedule();
	}

	/// Drop the subject folder. No passes run until a new one is set.
	pub fn clear_folder(&self) {
		let previous = {
			let mut state = self.inner.lock_state();
			state.folder.take().zip(state.subscription.take())
		};
		if let Some((old, id)) = previous {
			old.remove_folder_listener(id);
		}
		*self.inner.latest.write().unwrap_or_else(|e| e.into_inner()) = None;
	}

	pub fn set_filter_mode(&self, mode: FilterMode) {
		self.update_criteria(|c| c.mode = mode);
	}

	pub fn set_search_text(&self, text: impl Into<String>) {
		let text = text.into();
		self.update_criteria(|c| c.search_text = if text.is_empty() { None } else { Some(text) });
	}

	pub fn set_flat(&self, flat: bool) {
		self.update_criteria(|c| c.flat = flat);
	}

	pub fn set_show_hidden(&self, show_hidden: bool) {
		self.update_criteria(|c| c.show_hidden = show_hidden);
	}

	pub fn set_criteria(&self, criteria: FilterCriteria) {
		self.update_criteria(|c| *c = criteria);
	}

	pub fn criteria(&self) -> FilterCriteria {
		self.inner.lock_state().criteria.clone()
	}

	/// Most recently published result
	pub fn latest(&self) -> Option<Arc<FilteredDirectoryEvent>> {
		self.inner.latest.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Whether a worker currently owns the engine
	pub fn is_running(&self) -> bool {
		self.inner.running.load(Ordering::SeqCst)
	}

	/// Number of completed passes
	pub fn pass_count(&self) -> u64 {
		self.inner.passes.load(Ordering::SeqCst)
	}

	pub fn add_listener(&self, listener: Arc<dyn DirectoryFilterListener>) -> ListenerId {
		let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
		self.inner.listeners.write().unwrap_or_else(|e| e.into_inner()).push((id, listener));
		id
	}

	pub fn remove_listener(&self, id: ListenerId) {
		self.inner.listeners.write().unwrap_or_else(|e| e.into_inner()).retain(|(lid, _)| *lid != id);
	}

	fn update_criteria<F: FnOnce(&mut FilterCriteria)>(&self, update: F) {
		update(&mut self.inner.lock_state().criteria);
		self.inner.schedule();
	}
}

impl FolderListener for DirectoryFilter {
	fn folder_changed(&self, event: &FolderEvent) {
		self.inner.on_folder_event(event);
	}
}

impl Drop for FilterInner {
	fn drop(&mut self) {
		let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
		if let (Some(folder), Some(id)) = (state.folder.take(), state.subscription.take()) {
			folder.remove_folder_listener(id);
		}
	}
}

/// Subscription on the subject folder. Does not keep the engine alive.
struct FolderWatcher {
	filter: Weak<FilterInner>,
}

impl FolderListener for FolderWatcher {
	fn folder_changed(&self, event: &FolderEvent) {
		if let Some(inner) = self.filter.upgrade() {
			inner.on_folder_event(event);
		}
	}
}

/// Whether a folder event can change the filtered view
fn is_relevant(kind: &FolderEventKind) -> bool {
	match kind {
		FolderEventKind::FileChanged | FolderEventKind::FilesDeleted => true,
		FolderEventKind::RemoteContentsChanged { complete } => *complete,
		FolderEventKind::ScanCommitted { changes } => *changes,
	}
}

impl FilterInner {
	fn lock_state(&self) -> std::sync::MutexGuard<'_, FilterState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn listener_snapshot(&self) -> Vec<Arc<dyn DirectoryFilterListener>> {
		let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
		listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
	}

	fn on_folder_event(self: &Arc<Self>, event: &FolderEvent) {
		let is_subject = {
			let state = self.lock_state();
			state.folder.as_ref().map_or(false, |f| f.info().id == event.folder)
		};
		if !is_subject {
			trace!("Ignoring event of folder {}", event.folder);
			return;
		}
		if is_relevant(&event.kind) {
			self.schedule();
		}
	}

	/// Request a pass; start a worker unless one is running
	fn schedule(self: &Arc<Self>) {
		if self.lock_state().folder.is_none() {
			return;
		}
		self.pending.store(true, Ordering::SeqCst);
		if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
			trace!("Filter pass running, recompute queued");
			return;
		}

		let inner = Arc::clone(self);
		if let Err(e) = self.executor.execute(Box::new(move || inner.run_passes())) {
			warn!("Filter pass rejected: {}", e);
			self.running.store(false, Ordering::SeqCst);
		}
	}

	fn run_passes(&self) {
		loop {
			while self.pending.swap(false, Ordering::SeqCst) {
				self.filter_once();
			}
			self.running.store(false, Ordering::SeqCst);

			// a trigger between the last swap and the store above saw
			// `running` still set and left the work to us
			if !self.pending.load(Ordering::SeqCst)
				|| self
					.running
					.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
					.is_err()
			{
				break;
			}
		}
	}

	fn filter_once(&self) {
		let (folder, criteria) = {
			let state = self.lock_state();
			match &state.folder {
				Some(folder) => (Arc::clone(folder), state.criteria.clone()),
				None => return,
			}
		};

		let listeners = self.listener_snapshot();
		for listener in &listeners {
			listener.filtering_started();
		}

		let start = Instant::now();
		let tree = folder.snapshot();
		let keywords = KeywordFilter::parse(criteria.search_text.as_deref().unwrap_or(""));
		let mut counts = FilterCounts::default();
		let model = filter_directory(&tree, &keywords, &criteria, &mut counts);
		let flat_model = if criteria.flat { Some(Arc::new(model.flatten())) } else { None };

		let folder_id = folder.info().id.clone();
		let folder_changed = {
			let mut last = self.last_folder.lock().unwrap_or_else(|e| e.into_inner());
			let changed = last.as_ref() != Some(&folder_id);
			*last = Some(folder_id.clone());
			changed
		};

		let event = Arc::new(FilteredDirectoryEvent {
			folder: folder_id,
			model: Arc::new(model),
			flat_model,
			counts,
			recycled_count: folder.recycled_count(),
			folder_changed,
			default_filter: criteria.is_default(),
			criteria,
		});

		*self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&event));
		self.passes.fetch_add(1, Ordering::SeqCst);

		debug!(
			"Filtered {} of {} files in {} ms",
			counts.filtered,
			counts.original,
			start.elapsed().as_millis()
		);
		for listener in &listeners {
			listener.filter_changed(&event);
		}
	}
}


// vim: ts=4
