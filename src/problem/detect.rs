//! Detectors that turn observations into problems

use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use super::{Problem, ProblemKey, ProblemKind, ProblemRegistry, ProblemTag, Subject};
use crate::config::Config;
use crate::error::HealError;
use crate::filename;
use crate::types::{FileInfo, FolderInfo};

/// Every filename problem of `file` on any supported platform.
///
/// Returns nothing when filename checks are disabled in `config`.
pub fn filename_problems(file: &FileInfo, config: &Config) -> Vec<Problem> {
	if !config.filename_check {
		return Vec::new();
	}
	let name = file.filename_only();
	let mut kinds = Vec::new();

	if filename::contains_illegal_windows_chars(name) {
		kinds.push(ProblemKind::IllegalChars { file: file.clone() });
	}
	if filename::contains_illegal_macosx_chars(name) {
		kinds.push(ProblemKind::IllegalMacChars { file: file.clone() });
	}
	if filename::ends_with_illegal_windows_char(name) {
		kinds.push(ProblemKind::IllegalEnding { file: file.clone() });
	}
	if filename::is_reserved_windows_filename(name) {
		kinds.push(ProblemKind::ReservedWindowsName { file: file.clone() });
	}
	if filename::is_too_long(name) {
		kinds.push(ProblemKind::TooLongFilename { file: file.clone() });
	}

	kinds.into_iter().filter_map(|kind| Problem::new(kind).ok()).collect()
}

/// Mass deletion protection for local scans
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionGuard {
	pub enabled: bool,

	/// Share of known files (percent) a scan may delete before it is held back
	pub threshold_percent: u8,
}

impl DeletionGuard {
	pub fn new(threshold_percent: u8) -> Self {
		DeletionGuard { enabled: true, threshold_percent: threshold_percent.min(100) }
	}

	pub fn disabled() -> Self {
		DeletionGuard { enabled: false, threshold_percent: 100 }
	}

	pub fn from_config(config: &Config) -> Self {
		if config.mass_delete_protection {
			Self::new(config.mass_delete_threshold)
		} else {
			Self::disabled()
		}
	}

	/// Check if a scan may delete `delete_count` of `known_files` files.
	///
	/// Ok(()) if deletion is allowed, Err with reason if not
	pub fn check_allowed(&self, delete_count: usize, known_files: usize) -> Result<(), String> {
		if !self.enabled || delete_count == 0 || known_files == 0 {
			return Ok(());
		}

		let delete_percent = (delete_count * 100) / known_files;
		if delete_percent >= self.threshold_percent as usize {
			return Err(format!(
				"Mass deletion: {}% of files deleted ({} of {}), limit is {}%",
				delete_percent, delete_count, known_files, self.threshold_percent
			));
		}
		Ok(())
	}

	/// Problems registering held back deletions, one per deleted file
	pub fn problems_for(&self, folder: &FolderInfo, deleted: &[FileInfo]) -> Vec<Problem> {
		deleted
			.iter()
			.filter_map(|file| {
				Problem::new(ProblemKind::LocalDeletionMassDelete {
					folder: folder.clone(),
					file: file.clone(),
				})
				.map_err(|e| warn!("Skipping deletion of {}: {}", file.relative_name, e))
				.ok()
			})
			.collect()
	}
}

impl Default for DeletionGuard {
	fn default() -> Self {
		Self::new(95)
	}
}

/// What the folder is doing right now, as far as syncing goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncActivity {
	/// Some other member holds a complete copy
	pub peers_in_sync: bool,
	/// Files are currently being transferred
	pub transferring: bool,
}

impl SyncActivity {
	/// Nothing is happening
	pub fn idle() -> Self {
		Self::default()
	}

	/// Catching up with an in-sync peer; being behind is expected then
	pub fn catching_up(&self) -> bool {
		self.peers_in_sync && self.transferring
	}
}

/// Raise or clear the "not in sync for too long" problem of a folder.
///
/// Returns whether the problem is registered afterwards. A folder that never
/// synced, or a `warn_secs` of zero, never warns. While the folder catches up
/// with an in-sync peer no new problem is raised, but one already registered
/// stays.
pub fn check_sync(
	registry: &ProblemRegistry,
	folder: &FolderInfo,
	last_sync: Option<SystemTime>,
	activity: SyncActivity,
	now: SystemTime,
	warn_secs: u64,
) -> Result<bool, HealError> {
	let key = ProblemKey {
		tag: ProblemTag::UnsynchronizedFolder,
		subject: Subject::Folder(folder.id.clone()),
	};

	let last_sync = match last_sync {
		Some(t) if warn_secs > 0 => t,
		_ => {
			registry.remove_key(&key);
			return Ok(false);
		}
	};

	let elapsed = match now.duration_since(last_sync) {
		Ok(elapsed) => elapsed,
		Err(e) => {
			warn!("Last sync of folder {} is {}s in the future", folder.name, e.duration().as_secs());
			Duration::ZERO
		}
	};
	if elapsed <= Duration::from_secs(warn_secs) {
		if registry.remove_key(&key) {
			debug!("Folder {} is in sync again", folder.name);
		}
		return Ok(false);
	}

	if activity.catching_up() {
		debug!("Folder {} is behind but transferring from an in-sync peer", folder.name);
		return Ok(registry.get(&key).is_some());
	}

	if let Some(existing) = registry.get(&key) {
		if let ProblemKind::UnsynchronizedFolder { last_sync: known, .. } = existing.kind() {
			if *known == last_sync {
				return Ok(true);
			}
		}
		registry.remove_key(&key);
	}
	registry.add(Problem::new(ProblemKind::UnsynchronizedFolder {
		folder: folder.clone(),
		last_sync,
	})?)?;
	Ok(true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::FolderId;
	use std::io;
	use std::sync::{Arc, Mutex};

	fn file(name: &str) -> FileInfo {
		FileInfo::new(FolderId::new("f1").unwrap(), name).unwrap()
	}

	fn count(name: &str) -> usize {
		filename_problems(&file(name), &Config::default()).len()
	}

	#[test]
	fn test_problem_counts() {
		assert_eq!(count("ddd:d"), 2);
		assert_eq!(count("dddd."), 1);
		assert_eq!(count("aux"), 1);
		assert_eq!(count("aux.txt"), 1);
		assert_eq!(count(&"x".repeat(256)), 1);
		assert_eq!(count("fine.txt"), 0);
	}

	#[test]
	fn test_only_last_segment_is_checked() {
		assert_eq!(count("aux/fine.txt"), 0);
		assert_eq!(count("dir/what?.txt"), 1);
	}

	#[test]
	fn test_disabled_check() {
		let config = Config { filename_check: false, ..Config::default() };
		assert!(filename_problems(&file("a:b"), &config).is_empty());
	}

	#[test]
	fn test_guard_threshold() {
		let guard = DeletionGuard::new(95);
		assert!(guard.check_allowed(94, 100).is_ok());
		assert!(guard.check_allowed(95, 100).is_err());
		assert!(guard.check_allowed(0, 0).is_ok());
		assert!(DeletionGuard::disabled().check_allowed(100, 100).is_ok());
	}

	#[test]
	fn test_check_sync() {
		let folder = FolderInfo::new(FolderId::new("f1").unwrap(), "Docs");
		let registry = ProblemRegistry::for_folder(folder.id.clone());
		let now = SystemTime::now();
		let day = Duration::from_secs(86_400);
		let idle = SyncActivity::idle();

		assert!(!check_sync(&registry, &folder, Some(now - day), idle, now, 864_000).unwrap());
		assert!(check_sync(&registry, &folder, Some(now - day * 11), idle, now, 864_000).unwrap());
		assert!(check_sync(&registry, &folder, Some(now - day * 12), idle, now, 864_000).unwrap());
		assert_eq!(registry.count(), 1);
		assert!(registry.problems()[0].description_at(now).contains("12 days"));

		assert!(!check_sync(&registry, &folder, Some(now), idle, now, 864_000).unwrap());
		assert!(registry.is_empty());
		assert!(!check_sync(&registry, &folder, None, idle, now, 864_000).unwrap());
	}

	#[test]
	fn test_no_warning_while_catching_up() {
		let folder = FolderInfo::new(FolderId::new("f1").unwrap(), "Docs");
		let registry = ProblemRegistry::for_folder(folder.id.clone());
		let now = SystemTime::now();
		let stale = Some(now - Duration::from_secs(86_400 * 11));
		let catching_up = SyncActivity { peers_in_sync: true, transferring: true };

		assert!(!check_sync(&registry, &folder, stale, catching_up, now, 864_000).unwrap());
		assert!(registry.is_empty());

		// either condition alone is not enough
		let idle_peers = SyncActivity { peers_in_sync: true, transferring: false };
		assert!(check_sync(&registry, &folder, stale, idle_peers, now, 864_000).unwrap());
		let lone_transfer = SyncActivity { peers_in_sync: false, transferring: true };
		assert!(check_sync(&registry, &folder, stale, lone_transfer, now, 864_000).unwrap());

		// an existing problem is kept while catching up
		assert!(check_sync(&registry, &folder, stale, catching_up, now, 864_000).unwrap());
		assert_eq!(registry.count(), 1);
	}

	#[derive(Clone, Default)]
	struct LogBuffer(Arc<Mutex<Vec<u8>>>);

	impl io::Write for LogBuffer {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn test_future_last_sync_is_logged() {
		let folder = FolderInfo::new(FolderId::new("f1").unwrap(), "Docs");
		let registry = ProblemRegistry::for_folder(folder.id.clone());
		let now = SystemTime::now();
		let future = Some(now + Duration::from_secs(3600));

		let buffer = LogBuffer::default();
		let writer = buffer.clone();
		let subscriber = tracing_subscriber::fmt()
			.with_max_level(tracing::Level::TRACE)
			.with_ansi(false)
			.with_writer(move || writer.clone())
			.finish();
		let registered = tracing::subscriber::with_default(subscriber, || {
			check_sync(&registry, &folder, future, SyncActivity::idle(), now, 864_000).unwrap()
		});

		assert!(!registered);
		assert!(registry.is_empty());
		let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
		assert!(log.contains("WARN"), "no warning in {:?}", log);
		assert!(log.contains("Last sync of folder Docs"));
	}
}

// vim: ts=4
