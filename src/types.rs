//! Identity and metadata records shared by every subsystem

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::HealError;

/// Identifier of a shared folder, stable across peers
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FolderId(String);

impl FolderId {
	/// Create a folder id. Rejects an empty id.
	pub fn new(id: impl Into<String>) -> Result<Self, HealError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(HealError::invalid("folder id must not be empty"));
		}
		Ok(FolderId(id))
	}

	/// Generate a fresh random folder id
	pub fn generate() -> Self {
		FolderId(uuid::Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for FolderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Identity of a folder: id plus human readable name
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FolderInfo {
	pub id: FolderId,
	pub name: String,
}

impl FolderInfo {
	pub fn new(id: FolderId, name: impl Into<String>) -> Self {
		FolderInfo { id, name: name.into() }
	}
}

/// A peer, as far as file records are concerned
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
	pub id: String,
	pub nick: String,
}

impl MemberInfo {
	pub fn new(id: impl Into<String>, nick: impl Into<String>) -> Self {
		MemberInfo { id: id.into(), nick: nick.into() }
	}
}

/// Structural identity of a file: folder + relative name.
///
/// Size, version and timestamps are deliberately not part of it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FileKey {
	pub folder: FolderId,
	pub relative_name: String,
}

/// Metadata record for one file inside a folder's shared namespace.
///
/// Relative names always use `/` as separator regardless of platform.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	pub folder: FolderId,
	pub relative_name: String,
	pub size: u64,
	pub modified: SystemTime,
	pub version: u32,
	pub deleted: bool,
	pub modified_by: Option<MemberInfo>,
	/// Content identity (hex blake3) when known
	pub content_hash: Option<String>,
}

impl FileInfo {
	/// Minimal record for a file. Rejects an empty relative name.
	pub fn new(folder: FolderId, relative_name: impl Into<String>) -> Result<Self, HealError> {
		let relative_name = normalize_relative(&relative_name.into());
		if relative_name.is_empty() {
			return Err(HealError::invalid("file name must not be empty"));
		}
		Ok(FileInfo {
			folder,
			relative_name,
			size: 0,
			modified: SystemTime::UNIX_EPOCH,
			version: 0,
			deleted: false,
			modified_by: None,
			content_hash: None,
		})
	}

	pub fn with_size(mut self, size: u64) -> Self {
		self.size = size;
		self
	}

	pub fn with_modified(mut self, modified: SystemTime) -> Self {
		self.modified = modified;
		self
	}

	pub fn with_version(mut self, version: u32) -> Self {
		self.version = version;
		self
	}

	pub fn with_deleted(mut self, deleted: bool) -> Self {
		self.deleted = deleted;
		self
	}

	pub fn with_modified_by(mut self, member: MemberInfo) -> Self {
		self.modified_by = Some(member);
		self
	}

	pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
		self.content_hash = Some(hash.into());
		self
	}

	pub fn key(&self) -> FileKey {
		FileKey { folder: self.folder.clone(), relative_name: self.relative_name.clone() }
	}

	/// Last path component
	pub fn filename_only(&self) -> &str {
		match self.relative_name.rfind('/') {
			Some(idx) => &self.relative_name[idx + 1..],
			None => &self.relative_name,
		}
	}

	/// Directory part of the relative name, empty for files at the folder root
	pub fn location_in_folder(&self) -> &str {
		match self.relative_name.rfind('/') {
			Some(idx) => &self.relative_name[..idx],
			None => "",
		}
	}

	/// Relative name of a sibling called `name`
	pub fn sibling_name(&self, name: &str) -> String {
		let dir = self.location_in_folder();
		if dir.is_empty() {
			name.to_string()
		} else {
			format!("{}/{}", dir, name)
		}
	}

	/// Location of this file below `base` on disk
	pub fn disk_path(&self, base: &Path) -> PathBuf {
		disk_path(base, &self.relative_name)
	}

	/// Record for the same content after a local rename.
	///
	/// Size, timestamp and content identity carry over; the version history
	/// starts over under the new name.
	pub fn renamed(&self, new_relative_name: &str, by: MemberInfo) -> FileInfo {
		FileInfo {
			folder: self.folder.clone(),
			relative_name: normalize_relative(new_relative_name),
			size: self.size,
			modified: self.modified,
			version: 0,
			deleted: false,
			modified_by: Some(by),
			content_hash: self.content_hash.clone(),
		}
	}

	/// Nickname of the last modifier, if known
	pub fn modifier_nick(&self) -> Option<&str> {
		self.modified_by.as_ref().map(|m| m.nick.as_str())
	}
}

/// Join a `/`-separated relative name onto a base directory
pub fn disk_path(base: &Path, relative_name: &str) -> PathBuf {
	let mut path = base.to_path_buf();
	for part in relative_name.split('/').filter(|p| !p.is_empty()) {
		path.push(part);
	}
	path
}

fn normalize_relative(name: &str) -> String {
	name.trim_matches('/').to_string()
}


// vim: ts=4
