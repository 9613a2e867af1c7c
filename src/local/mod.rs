//! A folder on local disk
//!
//! [`LocalFolder`] keeps the folder's file records in a [`FolderDatabase`],
//! detects problems while scanning and queues peer messages in an outbox
//! until a transport picks them up.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::environment::{
	Folder, FolderEvent, FolderEventKind, FolderListener, FolderMessage, ListenerId,
};
use crate::error::HealError;
use crate::filter::model::{DirectoryTree, FileEntry};
use crate::problem::detect::{self, DeletionGuard, SyncActivity};
use crate::problem::{Problem, ProblemKind, ProblemRegistry, ProblemTag};
use crate::types::{FileInfo, FolderId, FolderInfo, MemberInfo};

pub mod database;
pub mod environment;

pub use database::FolderDatabase;
pub use environment::{LocalEnvironment, OfflineAccessControl};

/// Outcome of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanResult {
	pub total_files: usize,
	pub new_files: usize,
	pub changed_files: usize,
	pub deleted_files: usize,
	/// Deletions held back by mass deletion protection
	pub held_deletions: usize,
}

impl ScanResult {
	pub fn has_changes(&self) -> bool {
		self.new_files + self.changed_files + self.deleted_files > 0
	}
}

/// Database location for a folder at `base`, inside the profile directory
pub fn default_db_path(config: &Config, base: &Path) -> PathBuf {
	let canonical = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
	let digest = blake3::hash(canonical.to_string_lossy().as_bytes());
	let name = hex::encode(&digest.as_bytes()[..8]);
	config.profile_dir().join("folders").join(format!("{}.db", name))
}

pub struct LocalFolder {
	info: FolderInfo,
	base: PathBuf,
	db: FolderDatabase,
	config: Config,
	me: MemberInfo,
	problems: ProblemRegistry,
	listeners: RwLock<Vec<(ListenerId, Arc<dyn FolderListener>)>>,
	next_listener: AtomicU64,
	held_deletions: Mutex<Vec<FileInfo>>,
	outbox: Mutex<Vec<FolderMessage>>,
	scan_lock: Mutex<()>,
}

impl LocalFolder {
	/// Open the folder at `base` with its database at `db_path`.
	///
	/// A fresh database gets a newly generated folder id.
	pub fn open(base: &Path, db_path: &Path, config: Config, me: MemberInfo) -> Result<Self, HealError> {
		let db = FolderDatabase::open(db_path)?;
		let id = match db.folder_id()? {
			Some(id) => id,
			None => {
				let id = FolderId::generate();
				db.set_folder_id(&id)?;
				info!("New folder id {} for {}", id, base.display());
				id
			}
		};
		let name = base
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| base.display().to_string());

		Ok(LocalFolder {
			info: FolderInfo::new(id.clone(), name),
			base: base.to_path_buf(),
			db,
			config,
			me,
			problems: ProblemRegistry::for_folder(id),
			listeners: RwLock::new(Vec::new()),
			next_listener: AtomicU64::new(1),
			held_deletions: Mutex::new(Vec::new()),
			outbox: Mutex::new(Vec::new()),
			scan_lock: Mutex::new(()),
		})
	}

	pub fn database(&self) -> &FolderDatabase {
		&self.db
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Deletions currently held back
	pub fn held_deletions(&self) -> Vec<FileInfo> {
		self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	/// Take the messages queued for peers
	pub fn take_outbox(&self) -> Vec<FolderMessage> {
		std::mem::take(&mut *self.outbox.lock().unwrap_or_else(|e| e.into_inner()))
	}

	/// Record that the folder was fully in sync at `time`
	pub fn mark_synchronized(&self, time: SystemTime) -> Result<(), HealError> {
		self.db.set_last_sync(time)?;
		detect::check_sync(
			&self.problems,
			&self.info,
			Some(time),
			SyncActivity::idle(),
			SystemTime::now(),
			self.config.sync_warn_secs,
		)?;
		Ok(())
	}

	/// Compare the disk with the database and commit the differences
	pub fn scan(&self) -> Result<ScanResult, HealError> {
		self.scan_with(DeletionGuard::from_config(&self.config))
	}

	fn scan_with(&self, guard: DeletionGuard) -> Result<ScanResult, HealError> {
		let _scanning = self.scan_lock.lock().unwrap_or_else(|e| e.into_inner());

		if !self.base.is_dir() {
			self.raise(ProblemKind::DeviceDisconnected { folder: self.info.clone() });
			return Err(HealError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("{} is not available", self.base.display()),
			)));
		}
		self.clear(ProblemTag::DeviceDisconnected);

		let mut on_disk = Vec::new();
		if let Err(e) = walk(&self.base, "", &mut on_disk) {
			if e.kind() == io::ErrorKind::PermissionDenied {
				self.raise(ProblemKind::AccessDenied { folder: self.info.clone() });
			}
			return Err(e.into());
		}
		self.clear(ProblemTag::AccessDenied);

		let known = match self.db.records() {
			Ok(records) => records,
			Err(e) => {
				warn!("Database of folder {} is damaged: {}", self.info.name, e);
				self.raise(ProblemKind::FolderDatabaseCorrupt { folder: self.info.clone() });
				return Err(e);
			}
		};
		let known: HashMap<String, FileInfo> =
			known.into_iter().map(|f| (f.relative_name.clone(), f)).collect();

		let seen: HashSet<&str> = on_disk.iter().map(|(rel, _)| rel.as_str()).collect();
		self.problems.remove_where(|p| {
			is_filename_tag(p.tag()) && p.kind().file().map_or(false, |f| !seen.contains(f.relative_name.as_str()))
		});

		let mut result = ScanResult { total_files: on_disk.len(), ..Default::default() };
		let mut changes = Vec::new();

		for (rel, meta) in &on_disk {
			let size = meta.len();
			let modified = meta.modified().unwrap_or(UNIX_EPOCH);
			let record = match known.get(rel) {
				Some(prev) if !prev.deleted && prev.size == size && prev.modified == modified => {
					self.check_name(prev);
					continue;
				}
				Some(prev) => {
					result.changed_files += 1;
					FileInfo { version: prev.version + 1, ..FileInfo::new(self.info.id.clone(), rel.as_str())? }
				}
				None => {
					result.new_files += 1;
					FileInfo::new(self.info.id.clone(), rel.as_str())?
				}
			};
			let mut record = record.with_size(size).with_modified(modified).with_modified_by(self.me.clone());
			if self.config.hash_contents {
				record.content_hash = Some(hash_file(&self.base.join(rel))?);
			}
			self.check_name(&record);
			changes.push(record);
		}

		let held: HashSet<String> =
			self.held_deletions().into_iter().map(|f| f.relative_name).collect();
		let live_known = known.values().filter(|f| !f.deleted).count();
		let vanished: Vec<FileInfo> = known
			.values()
			.filter(|f| !f.deleted && !seen.contains(f.relative_name.as_str()) && !held.contains(&f.relative_name))
			.cloned()
			.collect();

		if !vanished.is_empty() {
			match guard.check_allowed(vanished.len() + held.len(), live_known) {
				Ok(()) => {
					result.deleted_files = vanished.len();
					changes.extend(vanished.into_iter().map(|f| self.deleted_record(f)));
				}
				Err(reason) => {
					warn!("Holding back deletions in folder {}: {}", self.info.name, reason);
					result.held_deletions = vanished.len();
					for problem in guard.problems_for(&self.info, &vanished) {
						self.add_problem(problem);
					}
					self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()).extend(vanished);
				}
			}
		}

		self.db.put_all(&changes)?;
		debug!(
			"Scanned {}: {} files, {} new, {} changed, {} deleted, {} held",
			self.info.name,
			result.total_files,
			result.new_files,
			result.changed_files,
			result.deleted_files,
			result.held_deletions
		);
		self.notify(FolderEventKind::ScanCommitted { changes: result.has_changes() });

		let now = SystemTime::now();
		if self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()).is_empty() {
			self.db.set_last_sync(now)?;
		}
		// no transfers without a peer connection
		detect::check_sync(
			&self.problems,
			&self.info,
			self.db.last_sync()?,
			SyncActivity::idle(),
			now,
			self.config.sync_warn_secs,
		)?;
		Ok(result)
	}

	fn deleted_record(&self, file: FileInfo) -> FileInfo {
		let version = file.version + 1;
		file.with_deleted(true).with_version(version).with_modified_by(self.me.clone())
	}

	fn check_name(&self, file: &FileInfo) {
		for problem in detect::filename_problems(file, &self.config) {
			self.add_problem(problem);
		}
	}

	fn raise(&self, kind: ProblemKind) {
		match Problem::new(kind) {
			Ok(problem) => self.add_problem(problem),
			Err(e) => warn!("Cannot record problem: {}", e),
		}
	}

	fn add_problem(&self, problem: Problem) {
		if let Err(e) = self.problems.add(problem) {
			warn!("Cannot record problem: {}", e);
		}
	}

	fn clear(&self, tag: ProblemTag) {
		self.problems.remove_where(|p| p.tag() == tag);
	}

	fn notify(&self, kind: FolderEventKind) {
		let event = FolderEvent::new(self.info.id.clone(), kind);
		let listeners: Vec<Arc<dyn FolderListener>> = {
			let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
			listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
		};
		for listener in listeners {
			listener.folder_changed(&event);
		}
	}
}

impl Folder for LocalFolder {
	fn info(&self) -> &FolderInfo {
		&self.info
	}

	fn local_base(&self) -> &Path {
		&self.base
	}

	fn is_known(&self, file: &FileInfo) -> bool {
		match self.db.get(&file.relative_name) {
			Ok(Some(record)) => !record.deleted,
			Ok(None) => false,
			Err(e) => {
				warn!("Cannot look up {}: {}", file.relative_name, e);
				false
			}
		}
	}

	fn remove_files_local(&self, files: &[FileInfo]) -> Result<(), HealError> {
		let names: Vec<&str> = files.iter().map(|f| f.relative_name.as_str()).collect();
		let removed = self.db.remove_all(&names)?;
		debug!("Removed {} records from folder {}", removed, self.info.name);
		self.notify(FolderEventKind::FilesDeleted);
		Ok(())
	}

	fn scan_new_file(&self, file: FileInfo) -> Result<(), HealError> {
		let meta = fs::metadata(self.disk_file(&file))?;
		let version = match self.db.get(&file.relative_name)? {
			Some(previous) => previous.version + 1,
			None => file.version,
		};
		let mut record = FileInfo {
			size: meta.len(),
			modified: meta.modified().unwrap_or(UNIX_EPOCH),
			version,
			deleted: false,
			..file
		};
		if self.config.hash_contents && record.content_hash.is_none() {
			record.content_hash = Some(hash_file(&self.disk_file(&record))?);
		}
		self.db.put(&record)?;
		self.check_name(&record);
		self.notify(FolderEventKind::FileChanged);
		Ok(())
	}

	fn rebuild_database(&self) -> Result<(), HealError> {
		info!("Rebuilding database of folder {}", self.info.name);
		self.db.clear()?;
		self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()).clear();
		self.clear(ProblemTag::LocalDeletionMassDelete);
		self.scan_with(DeletionGuard::disabled())?;
		Ok(())
	}

	fn broadcast(&self, message: FolderMessage) -> Result<(), HealError> {
		debug!("Queueing message for peers of {}: {:?}", self.info.name, message);
		self.outbox.lock().unwrap_or_else(|e| e.into_inner()).push(message);
		Ok(())
	}

	fn commit_local_deletions(&self) -> Result<Vec<FileInfo>, HealError> {
		let held = std::mem::take(&mut *self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()));
		let deleted: Vec<FileInfo> = held.into_iter().map(|f| self.deleted_record(f)).collect();
		self.db.put_all(&deleted)?;
		if !deleted.is_empty() {
			self.notify(FolderEventKind::FilesDeleted);
		}
		Ok(deleted)
	}

	fn discard_local_deletions(&self) -> Result<Vec<FileInfo>, HealError> {
		let held = std::mem::take(&mut *self.held_deletions.lock().unwrap_or_else(|e| e.into_inner()));
		debug!("Discarded {} held deletions in {}", held.len(), self.info.name);
		Ok(held)
	}

	fn snapshot(&self) -> DirectoryTree {
		match self.db.records() {
			Ok(records) => DirectoryTree::from_entries(self.info.name.clone(), records.into_iter().map(FileEntry::new)),
			Err(e) => {
				warn!("Cannot read records of folder {}: {}", self.info.name, e);
				DirectoryTree::root(self.info.name.clone())
			}
		}
	}

	fn problems(&self) -> &ProblemRegistry {
		&self.problems
	}

	fn add_folder_listener(&self, listener: Arc<dyn FolderListener>) -> ListenerId {
		let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
		self.listeners.write().unwrap_or_else(|e| e.into_inner()).push((id, listener));
		id
	}

	fn remove_folder_listener(&self, id: ListenerId) {
		self.listeners.write().unwrap_or_else(|e| e.into_inner()).retain(|(lid, _)| *lid != id);
	}
}

fn is_filename_tag(tag: ProblemTag) -> bool {
	matches!(
		tag,
		ProblemTag::IllegalChars
			| ProblemTag::IllegalMacChars
			| ProblemTag::IllegalEnding
			| ProblemTag::ReservedWindowsName
			| ProblemTag::TooLongFilename
	)
}

/// Collect regular files below `dir` as (relative name, metadata).
///
/// Only an unreadable `dir` itself is an error; unreadable subdirectories are skipped.
fn walk(dir: &Path, prefix: &str, out: &mut Vec<(String, fs::Metadata)>) -> io::Result<()> {
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let name = entry.file_name().to_string_lossy().into_owned();
		let rel = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
		let file_type = entry.file_type()?;

		if file_type.is_dir() {
			if let Err(e) = walk(&entry.path(), &rel, out) {
				warn!("Skipping {}: {}", entry.path().display(), e);
			}
		} else if file_type.is_file() {
			out.push((rel, entry.metadata()?));
		}
	}
	Ok(())
}

fn hash_file(path: &Path) -> Result<String, HealError> {
	let mut file = fs::File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(hex::encode(hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::TestFolder;

	#[test]
	fn test_scan_detects_new_changed_deleted() {
		let t = TestFolder::new();
		t.write("a.txt", "one");
		t.write("dir/b.txt", "two");
		let first = t.folder.scan().unwrap();
		assert_eq!(first.new_files, 2);

		t.write("a.txt", "one more");
		filetime::set_file_mtime(t.path("a.txt"), filetime::FileTime::from_unix_time(1_000_000, 0)).unwrap();
		t.write("c.txt", "three");
		let second = t.folder.scan().unwrap();
		assert_eq!(second.new_files, 1);
		assert_eq!(second.changed_files, 1);

		let record = t.folder.database().get("a.txt").unwrap().unwrap();
		assert_eq!(record.version, 1);
		assert_eq!(record.size, 8);
	}

	#[test]
	fn test_small_deletion_is_committed() {
		let t = TestFolder::new();
		for i in 0..10 {
			t.write(&format!("f{}.txt", i), "x");
		}
		t.folder.scan().unwrap();
		fs::remove_file(t.path("f0.txt")).unwrap();

		let result = t.folder.scan().unwrap();
		assert_eq!(result.deleted_files, 1);
		assert!(t.folder.database().get("f0.txt").unwrap().unwrap().deleted);
		assert!(!t.folder.is_known(&t.file("f0.txt")));
	}

	#[test]
	fn test_mass_deletion_is_held() {
		let t = TestFolder::new();
		for i in 0..4 {
			t.write(&format!("f{}.txt", i), "x");
		}
		t.folder.scan().unwrap();
		for i in 0..4 {
			fs::remove_file(t.path(&format!("f{}.txt", i))).unwrap();
		}

		let result = t.folder.scan().unwrap();
		assert_eq!(result.held_deletions, 4);
		assert_eq!(t.folder.problems().count(), 4);
		assert!(t.folder.is_known(&t.file("f0.txt")));

		// a rescan does not hold the same files twice
		let again = t.folder.scan().unwrap();
		assert_eq!(again.held_deletions, 0);
		assert_eq!(t.folder.held_deletions().len(), 4);

		let committed = t.folder.commit_local_deletions().unwrap();
		assert_eq!(committed.len(), 4);
		assert!(!t.folder.is_known(&t.file("f0.txt")));
	}

	#[test]
	fn test_filename_problems_found_and_cleared() {
		let t = TestFolder::new();
		t.write("what?.txt", "x");
		t.write("aux.txt", "x");
		t.folder.scan().unwrap();
		assert_eq!(t.folder.problems().count(), 2);

		fs::remove_file(t.path("aux.txt")).unwrap();
		t.folder.scan().unwrap();
		assert_eq!(t.folder.problems().count(), 1);
	}

	#[test]
	fn test_missing_base_is_disconnected_device() {
		let t = TestFolder::new();
		let base = t.folder.local_base().to_path_buf();
		fs::remove_dir_all(&base).unwrap();
		assert!(t.folder.scan().is_err());
		assert_eq!(t.folder.problems().problems()[0].tag(), ProblemTag::DeviceDisconnected);

		fs::create_dir_all(&base).unwrap();
		t.folder.scan().unwrap();
		assert!(t.folder.problems().is_empty());
	}

	#[test]
	fn test_corrupt_database_raises_problem_and_rebuild_fixes() {
		let t = TestFolder::new();
		t.write("a.txt", "x");
		t.folder.database().put_raw("a.txt", b"garbage{").unwrap();

		assert!(t.folder.scan().is_err());
		assert_eq!(t.folder.problems().problems()[0].tag(), ProblemTag::FolderDatabaseCorrupt);

		t.folder.rebuild_database().unwrap();
		assert!(t.folder.database().records().is_ok());
		assert!(t.folder.is_known(&t.file("a.txt")));
	}

	#[test]
	fn test_content_hash() {
		let t = TestFolder::with_config(Config { hash_contents: true, ..Config::default() });
		t.write("a.txt", "hello");
		t.folder.scan().unwrap();
		let record = t.folder.database().get("a.txt").unwrap().unwrap();
		assert_eq!(record.content_hash.unwrap(), blake3::hash(b"hello").to_hex().to_string());
	}

	#[test]
	fn test_listeners_see_scan() {
		struct Count(Mutex<Vec<FolderEventKind>>);
		impl FolderListener for Count {
			fn folder_changed(&self, event: &FolderEvent) {
				self.0.lock().unwrap().push(event.kind.clone());
			}
		}

		let t = TestFolder::new();
		let count = Arc::new(Count(Mutex::new(Vec::new())));
		let id = t.folder.add_folder_listener(count.clone());
		t.folder.scan().unwrap();
		t.write("a.txt", "x");
		t.folder.scan().unwrap();
		t.folder.remove_folder_listener(id);
		t.folder.scan().unwrap();

		let events = count.0.lock().unwrap();
		assert_eq!(
			*events,
			vec![
				FolderEventKind::ScanCommitted { changes: false },
				FolderEventKind::ScanCommitted { changes: true }
			]
		);
	}

	#[test]
	fn test_default_db_path_is_stable() {
		let config = Config::default();
		let a = default_db_path(&config, Path::new("/nonexistent/x"));
		let b = default_db_path(&config, Path::new("/nonexistent/x"));
		assert_eq!(a, b);
		assert!(a.starts_with(config.profile_dir()));
	}
}

// vim: ts=4
