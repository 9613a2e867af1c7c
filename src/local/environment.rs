//! Environment for folders on this machine without a server connection

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

use super::LocalFolder;
use crate::environment::{AccessControl, Environment, Folder, GrantOwnershipTask, Session};
use crate::error::HealError;
use crate::executor::TaskExecutor;
use crate::problem::MassDeleteChoice;
use crate::types::{FileInfo, FolderId, FolderInfo, MemberInfo};

/// Access control without a server: nobody is ever logged in
#[derive(Debug, Default)]
pub struct OfflineAccessControl;

impl AccessControl for OfflineAccessControl {
	fn session(&self) -> Option<Session> {
		None
	}

	fn schedule_grant(&self, task: GrantOwnershipTask) -> Result<(), HealError> {
		info!("Cannot grant ownership of {} while offline", task.folder.name);
		Err(HealError::NotLoggedIn)
	}
}

/// Registry of local folders plus the answers a user would give
pub struct LocalEnvironment {
	me: MemberInfo,
	executor: Arc<dyn TaskExecutor>,
	access: Box<dyn AccessControl>,
	folders: RwLock<BTreeMap<FolderId, Arc<LocalFolder>>>,
	mass_delete_choice: Option<MassDeleteChoice>,
	opened: Mutex<Vec<PathBuf>>,
}

impl LocalEnvironment {
	pub fn new(me: MemberInfo, executor: Arc<dyn TaskExecutor>) -> Self {
		LocalEnvironment {
			me,
			executor,
			access: Box::new(OfflineAccessControl),
			folders: RwLock::new(BTreeMap::new()),
			mass_delete_choice: None,
			opened: Mutex::new(Vec::new()),
		}
	}

	/// Answer mass deletion questions with `choice` (None = decline)
	pub fn with_mass_delete_choice(mut self, choice: Option<MassDeleteChoice>) -> Self {
		self.mass_delete_choice = choice;
		self
	}

	pub fn with_access_control(mut self, access: Box<dyn AccessControl>) -> Self {
		self.access = access;
		self
	}

	pub fn add_folder(&self, folder: Arc<LocalFolder>) {
		let id = folder.info().id.clone();
		self.folders.write().unwrap_or_else(|e| e.into_inner()).insert(id, folder);
	}

	pub fn local_folder(&self, id: &FolderId) -> Option<Arc<LocalFolder>> {
		self.folders.read().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
	}

	pub fn folders(&self) -> Vec<Arc<LocalFolder>> {
		self.folders.read().unwrap_or_else(|e| e.into_inner()).values().cloned().collect()
	}

	/// Directories shown to the user so far
	pub fn opened_directories(&self) -> Vec<PathBuf> {
		self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}
}

impl Environment for LocalEnvironment {
	fn folder(&self, id: &FolderId) -> Option<Arc<dyn Folder>> {
		self.local_folder(id).map(|f| f as Arc<dyn Folder>)
	}

	fn my_self(&self) -> MemberInfo {
		self.me.clone()
	}

	fn remove_folder(&self, folder: &FolderInfo) -> Result<(), HealError> {
		let removed = self.folders.write().unwrap_or_else(|e| e.into_inner()).remove(&folder.id);
		match removed {
			Some(local) => {
				local.problems().remove_all();
				info!("Removed folder {}", folder.name);
				Ok(())
			}
			None => Err(HealError::FolderNotFound { id: folder.id.to_string() }),
		}
	}

	fn open_directory(&self, path: &Path) -> Result<(), HealError> {
		info!("Open directory: {}", path.display());
		self.opened.lock().unwrap_or_else(|e| e.into_inner()).push(path.to_path_buf());
		Ok(())
	}

	fn show_unsynchronized_files(&self, folder: &FolderInfo) -> Result<(), HealError> {
		let local = self
			.local_folder(&folder.id)
			.ok_or_else(|| HealError::FolderNotFound { id: folder.id.to_string() })?;
		let held = local.held_deletions();
		info!("{} files of folder {} are not in sync", held.len(), folder.name);
		for file in held {
			info!("  {}", file.relative_name);
		}
		Ok(())
	}

	fn decide_mass_delete(&self, folder: &FolderInfo, file: &FileInfo) -> Option<MassDeleteChoice> {
		info!(
			"Mass deletion in {} (e.g. {}): {:?}",
			folder.name, file.relative_name, self.mass_delete_choice
		);
		self.mass_delete_choice
	}

	fn access_control(&self) -> &dyn AccessControl {
		self.access.as_ref()
	}

	fn io_executor(&self) -> Arc<dyn TaskExecutor> {
		Arc::clone(&self.executor)
	}
}

// vim: ts=4
