//! Synchronization anomalies ("problems") and their fixes
//!
//! Every detected anomaly is one [`Problem`]: a timestamp plus a
//! [`ProblemKind`] carrying the identity of what is affected. Problems are
//! immutable; a problem goes away only when its registry drops it.
//!
//! Equality and hashing use [`ProblemKey`], the variant plus the payload's
//! identity. Detecting the same anomaly twice therefore yields equal problems.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::error::HealError;
use crate::types::{FileInfo, FileKey, FolderId, FolderInfo, MemberInfo};

pub mod detect;
pub mod registry;
pub mod resolution;

pub use registry::{ProblemListener, ProblemRegistry};
pub use resolution::{Action, MassDeleteChoice};

/// The closed set of anomalies
#[derive(Debug, Clone, PartialEq)]
pub enum ProblemKind {
	/// The folder's directory cannot be read
	AccessDenied { folder: FolderInfo },

	/// The device holding the folder is gone
	DeviceDisconnected { folder: FolderInfo },

	/// Two files differ only in a way some platform cannot represent
	DuplicateFilename { file: FileInfo },

	/// Concurrent edits that need a human decision
	FileConflict { file: FileInfo },

	/// The folder's metadata database is unreadable
	FolderDatabaseCorrupt { folder: FolderInfo },

	/// Local changes in a read-only location were reverted or refused
	FolderReadOnly { path: PathBuf, reverted_only: bool },

	/// Name contains characters illegal on Windows (superset of Linux)
	IllegalChars { file: FileInfo },

	/// Name contains characters illegal on macOS
	IllegalMacChars { file: FileInfo },

	/// Name ends with a dot or space
	IllegalEnding { file: FileInfo },

	/// Name is a reserved Windows device name
	ReservedWindowsName { file: FileInfo },

	/// Name longer than 255 code units
	TooLongFilename { file: FileInfo },

	/// A local scan would delete a large share of the folder
	LocalDeletionMassDelete { folder: FolderInfo, file: FileInfo },

	/// No common version history with the source of this file
	NoConflictDetectionPossible { file: FileInfo, prior_source: MemberInfo },

	/// The folder has no owner on the server
	NoOwner { folder: FolderInfo },

	/// Disk holding the folder is full
	NoSpaceOnFileStore { folder: FolderInfo },

	/// The folder has not been in sync for a long time
	UnsynchronizedFolder { folder: FolderInfo, last_sync: SystemTime },
}

/// Variant discriminant, used in keys and for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProblemTag {
	AccessDenied,
	DeviceDisconnected,
	DuplicateFilename,
	FileConflict,
	FolderDatabaseCorrupt,
	FolderReadOnly,
	IllegalChars,
	IllegalMacChars,
	IllegalEnding,
	ReservedWindowsName,
	TooLongFilename,
	LocalDeletionMassDelete,
	NoConflictDetectionPossible,
	NoOwner,
	NoSpaceOnFileStore,
	UnsynchronizedFolder,
}

impl fmt::Display for ProblemTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// What a problem is about
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subject {
	Folder(FolderId),
	File(FileKey),
	Path(PathBuf),
}

/// Structural identity of a problem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProblemKey {
	pub tag: ProblemTag,
	pub subject: Subject,
}

impl ProblemKind {
	pub fn tag(&self) -> ProblemTag {
		match self {
			ProblemKind::AccessDenied { .. } => ProblemTag::AccessDenied,
			ProblemKind::DeviceDisconnected { .. } => ProblemTag::DeviceDisconnected,
			ProblemKind::DuplicateFilename { .. } => ProblemTag::DuplicateFilename,
			ProblemKind::FileConflict { .. } => ProblemTag::FileConflict,
			ProblemKind::FolderDatabaseCorrupt { .. } => ProblemTag::FolderDatabaseCorrupt,
			ProblemKind::FolderReadOnly { .. } => ProblemTag::FolderReadOnly,
			ProblemKind::IllegalChars { .. } => ProblemTag::IllegalChars,
			ProblemKind::IllegalMacChars { .. } => ProblemTag::IllegalMacChars,
			ProblemKind::IllegalEnding { .. } => ProblemTag::IllegalEnding,
			ProblemKind::ReservedWindowsName { .. } => ProblemTag::ReservedWindowsName,
			ProblemKind::TooLongFilename { .. } => ProblemTag::TooLongFilename,
			ProblemKind::LocalDeletionMassDelete { .. } => ProblemTag::LocalDeletionMassDelete,
			ProblemKind::NoConflictDetectionPossible { .. } => {
				ProblemTag::NoConflictDetectionPossible
			}
			ProblemKind::NoOwner { .. } => ProblemTag::NoOwner,
			ProblemKind::NoSpaceOnFileStore { .. } => ProblemTag::NoSpaceOnFileStore,
			ProblemKind::UnsynchronizedFolder { .. } => ProblemTag::UnsynchronizedFolder,
		}
	}

	pub fn subject(&self) -> Subject {
		match self {
			ProblemKind::AccessDenied { folder }
			| ProblemKind::DeviceDisconnected { folder }
			| ProblemKind::FolderDatabaseCorrupt { folder }
			| ProblemKind::NoOwner { folder }
			| ProblemKind::NoSpaceOnFileStore { folder }
			| ProblemKind::UnsynchronizedFolder { folder, .. } => Subject::Folder(folder.id.clone()),
			ProblemKind::DuplicateFilename { file }
			| ProblemKind::FileConflict { file }
			| ProblemKind::IllegalChars { file }
			| ProblemKind::IllegalMacChars { file }
			| ProblemKind::IllegalEnding { file }
			| ProblemKind::ReservedWindowsName { file }
			| ProblemKind::TooLongFilename { file }
			| ProblemKind::LocalDeletionMassDelete { file, .. }
			| ProblemKind::NoConflictDetectionPossible { file, .. } => Subject::File(file.key()),
			ProblemKind::FolderReadOnly { path, .. } => Subject::Path(path.clone()),
		}
	}

	/// The file a problem is about, if it is about one
	pub fn file(&self) -> Option<&FileInfo> {
		match self {
			ProblemKind::DuplicateFilename { file }
			| ProblemKind::FileConflict { file }
			| ProblemKind::IllegalChars { file }
			| ProblemKind::IllegalMacChars { file }
			| ProblemKind::IllegalEnding { file }
			| ProblemKind::ReservedWindowsName { file }
			| ProblemKind::TooLongFilename { file }
			| ProblemKind::LocalDeletionMassDelete { file, .. }
			| ProblemKind::NoConflictDetectionPossible { file, .. } => Some(file),
			_ => None,
		}
	}

	/// Folder the problem belongs to. `FolderReadOnly` only knows a path.
	pub fn folder_id(&self) -> Option<&FolderId> {
		match self {
			ProblemKind::AccessDenied { folder }
			| ProblemKind::DeviceDisconnected { folder }
			| ProblemKind::FolderDatabaseCorrupt { folder }
			| ProblemKind::NoOwner { folder }
			| ProblemKind::NoSpaceOnFileStore { folder }
			| ProblemKind::UnsynchronizedFolder { folder, .. }
			| ProblemKind::LocalDeletionMassDelete { folder, .. } => Some(&folder.id),
			ProblemKind::FolderReadOnly { .. } => None,
			other => other.file().map(|f| &f.folder),
		}
	}

	fn validate(&self) -> Result<(), HealError> {
		if let Some(id) = self.folder_id() {
			if id.as_str().trim().is_empty() {
				return Err(HealError::invalid(format!("{}: folder id is missing", self.tag())));
			}
		}
		if let Some(file) = self.file() {
			if file.relative_name.is_empty() {
				return Err(HealError::invalid(format!("{}: file name is missing", self.tag())));
			}
		}
		match self {
			ProblemKind::FolderReadOnly { path, .. } if path.as_os_str().is_empty() => {
				Err(HealError::invalid("FolderReadOnly: path is missing"))
			}
			ProblemKind::LocalDeletionMassDelete { folder, file } if folder.id != file.folder => {
				Err(HealError::invalid(format!(
					"LocalDeletionMassDelete: {} is not in folder {}",
					file.relative_name, folder.name
				)))
			}
			_ => Ok(()),
		}
	}
}

/// A detected anomaly
#[derive(Debug, Clone)]
pub struct Problem {
	created_at: SystemTime,
	kind: ProblemKind,
}

impl Problem {
	/// Create a problem detected now. Fails only if the payload lacks identity.
	pub fn new(kind: ProblemKind) -> Result<Self, HealError> {
		Self::new_at(kind, SystemTime::now())
	}

	/// Create a problem with an explicit detection time
	pub fn new_at(kind: ProblemKind, created_at: SystemTime) -> Result<Self, HealError> {
		kind.validate()?;
		Ok(Problem { created_at, kind })
	}

	pub fn created_at(&self) -> SystemTime {
		self.created_at
	}

	pub fn kind(&self) -> &ProblemKind {
		&self.kind
	}

	pub fn tag(&self) -> ProblemTag {
		self.kind.tag()
	}

	pub fn key(&self) -> ProblemKey {
		ProblemKey { tag: self.kind.tag(), subject: self.kind.subject() }
	}

	pub fn folder_id(&self) -> Option<&FolderId> {
		self.kind.folder_id()
	}

	/// Human readable description
	pub fn description(&self) -> String {
		self.description_at(SystemTime::now())
	}

	/// Description as it reads at `now` (only time-dependent variants care)
	pub fn description_at(&self, now: SystemTime) -> String {
		match &self.kind {
			ProblemKind::AccessDenied { folder } => {
				format!("Access to the directory of folder '{}' was denied.", folder.name)
			}
			ProblemKind::DeviceDisconnected { folder } => format!(
				"The device holding folder '{}' is disconnected. Reconnect it to continue syncing.",
				folder.name
			),
			ProblemKind::DuplicateFilename { file } => format!(
				"The name of '{}' clashes with another file on case-insensitive systems.",
				file.relative_name
			),
			ProblemKind::FileConflict { file } => format!(
				"'{}' was changed on several computers at the same time. Decide which version to keep.",
				file.relative_name
			),
			ProblemKind::FolderDatabaseCorrupt { folder } => {
				format!("The file database of folder '{}' is damaged.", folder.name)
			}
			ProblemKind::FolderReadOnly { path, reverted_only } => {
				if *reverted_only {
					format!("Changes in '{}' were reverted because it is read-only.", path.display())
				} else {
					format!("'{}' is read-only. Local changes cannot be synchronized.", path.display())
				}
			}
			ProblemKind::IllegalChars { file } => format!(
				"'{}' contains characters that are not allowed on Windows (|\\?\"*<:>/).",
				file.filename_only()
			),
			ProblemKind::IllegalMacChars { file } => format!(
				"'{}' contains characters that are not allowed on macOS (: or /).",
				file.filename_only()
			),
			ProblemKind::IllegalEnding { file } => format!(
				"'{}' ends with a dot or a space, which is not allowed on Windows.",
				file.filename_only()
			),
			ProblemKind::ReservedWindowsName { file } => format!(
				"'{}' is a reserved device name on Windows.",
				file.filename_only()
			),
			ProblemKind::TooLongFilename { file } => format!(
				"The name of '{}' is longer than {} characters.",
				file.relative_name,
				crate::filename::MAX_FILENAME_LENGTH
			),
			ProblemKind::LocalDeletionMassDelete { folder, file } => format!(
				"'{}' and many other files were deleted from folder '{}'.",
				file.relative_name, folder.name
			),
			ProblemKind::NoConflictDetectionPossible { file, prior_source } => format!(
				"'{}' was received from {}, which does not track versions. Conflicts cannot be detected.",
				file.relative_name, prior_source.nick
			),
			ProblemKind::NoOwner { folder } => {
				format!("Folder '{}' has no owner.", folder.name)
			}
			ProblemKind::NoSpaceOnFileStore { folder } => {
				format!("There is no free space left on the disk of folder '{}'.", folder.name)
			}
			ProblemKind::UnsynchronizedFolder { folder, last_sync } => format!(
				"Folder '{}' has not been synchronized for {}.",
				folder.name,
				elapsed_text(now.duration_since(*last_sync).unwrap_or(Duration::ZERO))
			),
		}
	}

	/// Opaque key of the help page for this problem
	pub fn documentation_reference(&self) -> Option<&'static str> {
		match self.kind.tag() {
			ProblemTag::AccessDenied => Some("problems/access-denied"),
			ProblemTag::DeviceDisconnected => Some("problems/device-disconnected"),
			ProblemTag::FileConflict => Some("problems/file-conflict"),
			ProblemTag::FolderDatabaseCorrupt => Some("problems/folder-database"),
			ProblemTag::FolderReadOnly => Some("problems/read-only"),
			ProblemTag::IllegalChars
			| ProblemTag::IllegalMacChars
			| ProblemTag::IllegalEnding
			| ProblemTag::ReservedWindowsName
			| ProblemTag::TooLongFilename => Some("problems/filenames"),
			ProblemTag::LocalDeletionMassDelete => Some("problems/mass-deletion"),
			ProblemTag::NoOwner => Some("problems/no-owner"),
			ProblemTag::UnsynchronizedFolder => Some("problems/unsynchronized"),
			ProblemTag::DuplicateFilename
			| ProblemTag::NoConflictDetectionPossible
			| ProblemTag::NoSpaceOnFileStore => None,
		}
	}
}

impl PartialEq for Problem {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for Problem {}

impl Hash for Problem {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key().hash(state);
	}
}

impl fmt::Display for Problem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.tag(), self.description())
	}
}

/// "45 minutes", "3 hours", "2 days"; each step truncates
pub fn elapsed_text(elapsed: Duration) -> String {
	let minutes = elapsed.as_secs() / 60;
	if minutes <= 59 {
		return plural(minutes, "minute");
	}
	let hours = minutes / 60;
	if hours <= 23 {
		return plural(hours, "hour");
	}
	plural(hours / 24, "day")
}

fn plural(n: u64, unit: &str) -> String {
	if n == 1 {
		format!("1 {}", unit)
	} else {
		format!("{} {}s", n, unit)
	}
}


// vim: ts=4
