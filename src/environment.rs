//! Contracts of the collaborators this core runs inside of
//!
//! The folder repository, the peer transport, the access-control service and
//! the UI all live outside this crate. They are reached only through the
//! traits below.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::HealError;
use crate::executor::TaskExecutor;
use crate::filter::model::DirectoryTree;
use crate::problem::registry::ProblemRegistry;
use crate::problem::resolution::MassDeleteChoice;
use crate::types::{FileInfo, FolderId, FolderInfo, MemberInfo};

/// Handle returned when subscribing to folder events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// What happened inside a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEventKind {
	/// A single file was added or changed
	FileChanged,

	/// Files were deleted
	FilesDeleted,

	/// A peer sent new file list contents
	RemoteContentsChanged {
		/// Whether the peer's file list for this folder is now complete
		complete: bool,
	},

	/// A local scan was committed to the folder database
	ScanCommitted {
		/// Whether the scan found any change
		changes: bool,
	},
}

/// Folder change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEvent {
	pub folder: FolderId,
	pub kind: FolderEventKind,
}

impl FolderEvent {
	pub fn new(folder: FolderId, kind: FolderEventKind) -> Self {
		FolderEvent { folder, kind }
	}
}

/// Receiver of folder change notifications
pub trait FolderListener: Send + Sync {
	fn folder_changed(&self, event: &FolderEvent);
}

/// Message broadcast to the peers of a folder
#[derive(Debug, Clone, PartialEq)]
pub enum FolderMessage {
	/// Maintenance command: peers should rebuild their metadata database
	RebuildDatabase,

	/// Local deletions that peers should apply
	Deletions { files: Vec<FileInfo> },

	/// Ask peers to send the given files again
	RequestFiles { files: Vec<FileInfo> },
}

/// One shared folder as seen by this core
pub trait Folder: Send + Sync {
	fn info(&self) -> &FolderInfo;

	/// Root of the folder on local disk
	fn local_base(&self) -> &Path;

	/// Location of `file` on local disk
	fn disk_file(&self, file: &FileInfo) -> PathBuf {
		file.disk_path(self.local_base())
	}

	/// Whether the folder database has a live (non deleted) record of `file`
	fn is_known(&self, file: &FileInfo) -> bool;

	/// Drop the local records of `files`
	fn remove_files_local(&self, files: &[FileInfo]) -> Result<(), HealError>;

	/// Register a file that appeared on disk and rescan it
	fn scan_new_file(&self, file: FileInfo) -> Result<(), HealError>;

	/// Throw away the metadata database and build it again from disk
	fn rebuild_database(&self) -> Result<(), HealError>;

	/// Send a message to every connected peer of the folder
	fn broadcast(&self, message: FolderMessage) -> Result<(), HealError>;

	/// Commit deletions that were held back by mass-deletion protection
	fn commit_local_deletions(&self) -> Result<Vec<FileInfo>, HealError>;

	/// Forget deletions that were held back by mass-deletion protection
	fn discard_local_deletions(&self) -> Result<Vec<FileInfo>, HealError>;

	/// Current directory tree, including per-file sync state
	fn snapshot(&self) -> DirectoryTree;

	/// Number of files in the folder's recycle bin
	fn recycled_count(&self) -> usize {
		0
	}

	/// Problems detected in this folder
	fn problems(&self) -> &ProblemRegistry;

	fn add_folder_listener(&self, listener: Arc<dyn FolderListener>) -> ListenerId;

	fn remove_folder_listener(&self, id: ListenerId);
}

/// An authenticated server session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	pub account_id: String,
}

/// Request to make the session's account owner of a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantOwnershipTask {
	pub folder: FolderInfo,
	pub account_id: String,
}

/// Access-control subsystem
pub trait AccessControl: Send + Sync {
	/// Currently authenticated session, if any
	fn session(&self) -> Option<Session>;

	/// Queue an ownership grant
	fn schedule_grant(&self, task: GrantOwnershipTask) -> Result<(), HealError>;
}

/// Everything a resolution may reach out to
pub trait Environment: Send + Sync {
	fn folder(&self, id: &FolderId) -> Option<Arc<dyn Folder>>;

	/// The local peer
	fn my_self(&self) -> MemberInfo;

	/// Stop syncing a folder and forget it
	fn remove_folder(&self, folder: &FolderInfo) -> Result<(), HealError>;

	/// Show a directory to the user (file browser)
	fn open_directory(&self, path: &Path) -> Result<(), HealError>;

	/// Show the files of a folder that are not yet in sync
	fn show_unsynchronized_files(&self, folder: &FolderInfo) -> Result<(), HealError>;

	/// Ask the user what to do about held back mass deletions
	fn decide_mass_delete(&self, folder: &FolderInfo, file: &FileInfo)
		-> Option<MassDeleteChoice>;

	fn access_control(&self) -> &dyn AccessControl;

	/// Executor for resolution actions that touch the disk
	fn io_executor(&self) -> Arc<dyn TaskExecutor>;

	/// Look up a folder or fail
	fn require_folder(&self, id: &FolderId) -> Result<Arc<dyn Folder>, HealError> {
		self.folder(id).ok_or_else(|| HealError::FolderNotFound { id: id.to_string() })
	}
}

// vim: ts=4
