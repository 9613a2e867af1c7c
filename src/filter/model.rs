//! Directory trees: the folder snapshot going in, the filtered view coming out

use crate::types::FileInfo;

/// One file of a folder snapshot with its sync state
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
	pub info: FileInfo,

	/// A newer remote version is available but not yet downloaded
	pub incoming: bool,

	/// Recently downloaded and not yet looked at
	pub new_download: bool,

	pub hidden: bool,
}

impl FileEntry {
	pub fn new(info: FileInfo) -> Self {
		let hidden = info.filename_only().starts_with('.');
		FileEntry { info, incoming: false, new_download: false, hidden }
	}

	pub fn incoming(mut self, incoming: bool) -> Self {
		self.incoming = incoming;
		self
	}

	pub fn new_download(mut self, new_download: bool) -> Self {
		self.new_download = new_download;
		self
	}
}

/// Snapshot of a folder's directory structure
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectoryTree {
	pub name: String,

	/// Relative path, empty for the folder root
	pub path: String,

	pub hidden: bool,
	pub files: Vec<FileEntry>,
	pub subdirectories: Vec<DirectoryTree>,
}

impl DirectoryTree {
	pub fn root(name: impl Into<String>) -> Self {
		DirectoryTree { name: name.into(), ..Default::default() }
	}

	/// Build a tree from flat entries, creating directories along the way.
	///
	/// Files and directories end up sorted by name.
	pub fn from_entries(name: impl Into<String>, entries: impl IntoIterator<Item = FileEntry>) -> Self {
		let mut root = Self::root(name);
		for entry in entries {
			let location = entry.info.location_in_folder().to_string();
			root.directory_mut(&location).files.push(entry);
		}
		root.sort();
		root
	}

	/// Directory at `path`, created if missing
	pub fn directory_mut(&mut self, path: &str) -> &mut DirectoryTree {
		let mut current = self;
		for segment in path.split('/').filter(|s| !s.is_empty()) {
			let idx = match current.subdirectories.iter().position(|d| d.name == segment) {
				Some(idx) => idx,
				None => {
					let sub_path = if current.path.is_empty() {
						segment.to_string()
					} else {
						format!("{}/{}", current.path, segment)
					};
					current.subdirectories.push(DirectoryTree {
						name: segment.to_string(),
						path: sub_path,
						hidden: segment.starts_with('.'),
						..Default::default()
					});
					current.subdirectories.len() - 1
				}
			};
			current = &mut current.subdirectories[idx];
		}
		current
	}

	/// Number of files in this directory and below
	pub fn total_files(&self) -> usize {
		self.files.len() + self.subdirectories.iter().map(|d| d.total_files()).sum::<usize>()
	}

	fn sort(&mut self) {
		self.files.sort_by(|a, b| a.info.relative_name.cmp(&b.info.relative_name));
		self.subdirectories.sort_by(|a, b| a.name.cmp(&b.name));
		for sub in &mut self.subdirectories {
			sub.sort();
		}
	}
}

/// Filtered view of a directory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredDirectoryModel {
	pub name: String,
	pub path: String,
	pub files: Vec<FileInfo>,
	pub subdirectories: Vec<FilteredDirectoryModel>,

	/// Some file shown in this directory or below is a new download
	pub has_new_files: bool,
}

impl FilteredDirectoryModel {
	pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
		FilteredDirectoryModel { name: name.into(), path: path.into(), ..Default::default() }
	}

	/// Whether any file is shown here or below
	pub fn has_files_deep(&self) -> bool {
		!self.files.is_empty() || self.subdirectories.iter().any(|d| d.has_files_deep())
	}

	pub fn file_count_deep(&self) -> usize {
		self.files.len() + self.subdirectories.iter().map(|d| d.file_count_deep()).sum::<usize>()
	}

	/// Copy without directories that show no file at any depth
	pub fn pruned(&self) -> FilteredDirectoryModel {
		FilteredDirectoryModel {
			name: self.name.clone(),
			path: self.path.clone(),
			files: self.files.clone(),
			subdirectories: self
				.subdirectories
				.iter()
				.filter(|d| d.has_files_deep())
				.map(|d| d.pruned())
				.collect(),
			has_new_files: self.has_new_files,
		}
	}

	/// Every shown file, depth first
	pub fn flatten(&self) -> Vec<FileInfo> {
		let mut out = Vec::with_capacity(self.file_count_deep());
		self.collect_files(&mut out);
		out
	}

	fn collect_files(&self, out: &mut Vec<FileInfo>) {
		out.extend(self.files.iter().cloned());
		for sub in &self.subdirectories {
			sub.collect_files(out);
		}
	}

	/// Subdirectory at a relative path
	pub fn find(&self, path: &str) -> Option<&FilteredDirectoryModel> {
		let mut current = self;
		for segment in path.split('/').filter(|s| !s.is_empty()) {
			current = current.subdirectories.iter().find(|d| d.name == segment)?;
		}
		Some(current)
	}
}


// vim: ts=4
