//! Automatic fixes for problems
//!
//! A resolution is a deferred [`Action`] built from the problem's identity.
//! Actions that touch the disk are meant to run on the environment's I/O
//! executor, see [`Problem::submit_resolution`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Problem, ProblemKind, ProblemTag};
use crate::environment::{Environment, FolderMessage, GrantOwnershipTask};
use crate::error::HealError;
use crate::filename::{self, unique};
use crate::types::{FileInfo, FolderInfo};

type ActionFn = Box<dyn FnOnce() -> Result<(), HealError> + Send + 'static>;

/// Deferred, one-shot resolution of a problem
pub struct Action {
	label: String,
	run: ActionFn,
}

impl Action {
	pub fn new<F>(label: impl Into<String>, run: F) -> Self
	where
		F: FnOnce() -> Result<(), HealError> + Send + 'static,
	{
		Action { label: label.into(), run: Box::new(run) }
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// Run on the calling thread
	pub fn run(self) -> Result<(), HealError> {
		debug!("Running resolution: {}", self.label);
		(self.run)()
	}

	/// Queue on `executor`. Failures of the action itself are only logged.
	pub fn submit(self, executor: &dyn crate::executor::TaskExecutor) -> Result<(), HealError> {
		executor.execute(Box::new(move || {
			let label = self.label.clone();
			if let Err(e) = self.run() {
				warn!("Resolution '{}' failed: {}", label, e);
			}
		}))
	}
}

impl fmt::Debug for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Action").field("label", &self.label).finish()
	}
}

/// Answer to "what to do about held back mass deletions"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassDeleteChoice {
	/// Delete the files on all peers too
	Propagate,
	/// Keep the deletions local and fetch the files back from peers
	RestoreFromPeers,
}

impl Problem {
	/// Whether an automatic fix exists
	pub fn is_resolvable(&self) -> bool {
		self.resolution_description().is_some()
	}

	/// Short label of the automatic fix
	pub fn resolution_description(&self) -> Option<&'static str> {
		match self.tag() {
			ProblemTag::AccessDenied => Some("Remove the folder"),
			ProblemTag::FolderDatabaseCorrupt => Some("Rebuild the folder database"),
			ProblemTag::FolderReadOnly => Some("Open the directory"),
			ProblemTag::IllegalChars | ProblemTag::IllegalMacChars => {
				Some("Remove the illegal characters")
			}
			ProblemTag::IllegalEnding => Some("Remove the trailing dots and spaces"),
			ProblemTag::ReservedWindowsName => Some("Rename the file"),
			ProblemTag::TooLongFilename => Some("Shorten the name"),
			ProblemTag::LocalDeletionMassDelete => Some("Decide about the deletions"),
			ProblemTag::NoOwner => Some("Become owner of the folder"),
			ProblemTag::UnsynchronizedFolder => Some("Show unsynchronized files"),
			ProblemTag::DeviceDisconnected
			| ProblemTag::DuplicateFilename
			| ProblemTag::FileConflict
			| ProblemTag::NoConflictDetectionPossible
			| ProblemTag::NoSpaceOnFileStore => None,
		}
	}

	/// Build the fix for this problem, or `None` if it has no automatic fix
	pub fn resolution(&self, env: Arc<dyn Environment>) -> Option<Action> {
		let label = self.resolution_description()?;
		let problem = self.clone();
		let kind = self.kind.clone();

		let run: ActionFn = match kind {
			ProblemKind::IllegalChars { file } => Box::new(move || {
				rename_with(&*env, &file, &problem, |folder, file| {
					let cleaned =
						filename::remove_chars(file.filename_only(), filename::ILLEGAL_WINDOWS_CHARS);
					unique::unique_or_suffixed(folder, file, &cleaned)
				})
			}),
			ProblemKind::IllegalMacChars { file } => Box::new(move || {
				rename_with(&*env, &file, &problem, |folder, file| {
					let cleaned =
						filename::remove_chars(file.filename_only(), filename::ILLEGAL_MACOSX_CHARS);
					unique::unique_or_suffixed(folder, file, &cleaned)
				})
			}),
			ProblemKind::IllegalEnding { file } => Box::new(move || {
				rename_with(&*env, &file, &problem, |folder, file| {
					let trimmed = filename::trim_illegal_endings(file.filename_only());
					unique::unique_or_suffixed(folder, file, trimmed)
				})
			}),
			ProblemKind::ReservedWindowsName { file } => Box::new(move || {
				rename_with(&*env, &file, &problem, unique::make_unique)
			}),
			ProblemKind::TooLongFilename { file } => Box::new(move || {
				rename_with(&*env, &file, &problem, unique::get_shorter_filename)
			}),
			ProblemKind::FolderDatabaseCorrupt { folder } => Box::new(move || {
				let local = env.require_folder(&folder.id)?;
				local.rebuild_database()?;
				local.broadcast(FolderMessage::RebuildDatabase)?;
				local.problems().remove(&problem);
				info!("Rebuilt database of folder {}", folder.name);
				Ok(())
			}),
			ProblemKind::AccessDenied { folder } => Box::new(move || {
				env.remove_folder(&folder)?;
				if let Some(local) = env.folder(&folder.id) {
					local.problems().remove(&problem);
				}
				Ok(())
			}),
			ProblemKind::FolderReadOnly { path, .. } => Box::new(move || {
				let dir = if path.is_dir() {
					path.as_path()
				} else {
					path.parent().unwrap_or_else(|| Path::new("/"))
				};
				env.open_directory(dir)
			}),
			ProblemKind::NoOwner { folder } => Box::new(move || {
				let session = env.access_control().session().ok_or(HealError::NotLoggedIn)?;
				env.access_control().schedule_grant(GrantOwnershipTask {
					folder,
					account_id: session.account_id,
				})
			}),
			ProblemKind::UnsynchronizedFolder { folder, .. } => {
				Box::new(move || env.show_unsynchronized_files(&folder))
			}
			ProblemKind::LocalDeletionMassDelete { folder, file } => Box::new(move || {
				let choice =
					env.decide_mass_delete(&folder, &file).ok_or(HealError::Cancelled)?;
				apply_mass_delete(&*env, &folder, choice)
			}),
			_ => return None,
		};

		Some(Action { label: label.to_string(), run })
	}

	/// Build the fix and queue it on the environment's I/O executor.
	///
	/// Returns `Ok(false)` when there is nothing to run.
	pub fn submit_resolution(&self, env: Arc<dyn Environment>) -> Result<bool, HealError> {
		let executor = env.io_executor();
		match self.resolution(env) {
			Some(action) => {
				action.submit(&*executor)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}
}

fn rename_with<F>(
	env: &dyn Environment,
	file: &FileInfo,
	problem: &Problem,
	new_name: F,
) -> Result<(), HealError>
where
	F: FnOnce(&dyn crate::environment::Folder, &FileInfo) -> Result<String, HealError>,
{
	let folder = match env.folder(&file.folder) {
		Some(folder) => folder,
		None => return Ok(()),
	};
	let name = new_name(&*folder, file)?;
	unique::resolve(env, file, &name, problem)
}

/// Carry out the user's decision for every held back deletion of a folder
pub fn apply_mass_delete(
	env: &dyn Environment,
	folder: &FolderInfo,
	choice: MassDeleteChoice,
) -> Result<(), HealError> {
	let local = env.require_folder(&folder.id)?;
	match choice {
		MassDeleteChoice::Propagate => {
			let files = local.commit_local_deletions()?;
			info!("Propagating {} deletions in folder {}", files.len(), folder.name);
			local.broadcast(FolderMessage::Deletions { files })?;
		}
		MassDeleteChoice::RestoreFromPeers => {
			let files = local.discard_local_deletions()?;
			info!("Requesting {} deleted files of folder {} from peers", files.len(), folder.name);
			local.broadcast(FolderMessage::RequestFiles { files })?;
		}
	}
	let removed = local
		.problems()
		.remove_where(|p| p.tag() == ProblemTag::LocalDeletionMassDelete);
	debug!("Cleared {} mass deletion problems", removed);
	Ok(())
}

// vim: ts=4
