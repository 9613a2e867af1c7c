//! Fixtures shared by unit tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::config::Config;
use crate::environment::Folder;
use crate::local::LocalFolder;
use crate::types::{disk_path, FileInfo, MemberInfo};

/// A [`LocalFolder`] in a temporary directory, removed on drop
pub(crate) struct TestFolder {
	_dir: TempDir,
	pub folder: LocalFolder,
}

impl TestFolder {
	pub fn new() -> Self {
		Self::with_config(Config::default())
	}

	pub fn with_config(mut config: Config) -> Self {
		let dir = TempDir::new().unwrap();
		let base = dir.path().join("data");
		fs::create_dir_all(&base).unwrap();
		config.state_dir = dir.path().join("state");
		let db_path = config.profile_dir().join("folder.db");
		let folder = LocalFolder::open(&base, &db_path, config, MemberInfo::new("m1", "tester")).unwrap();
		TestFolder { _dir: dir, folder }
	}

	pub fn path(&self, rel: &str) -> PathBuf {
		disk_path(self.folder.local_base(), rel)
	}

	pub fn write(&self, rel: &str, contents: &str) {
		let path = self.path(rel);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(path, contents).unwrap();
	}

	pub fn touch(&self, rel: &str) {
		self.write(rel, "");
	}

	pub fn file(&self, rel: &str) -> FileInfo {
		FileInfo::new(self.folder.info().id.clone(), rel).unwrap()
	}
}

// vim: ts=4
