//! Legal, collision-free replacement names
//!
//! Uniqueness is checked against the disk at call time. A write by someone
//! else between the check and the rename can still collide; `resolve` refuses
//! to overwrite in that case.

use std::fs;
use std::io;
use tracing::{debug, info, warn};

use super::{name_length, split_extension, truncate_to_length, MAX_FILENAME_LENGTH};
use crate::environment::{Environment, Folder};
use crate::error::HealError;
use crate::problem::Problem;
use crate::types::{disk_path, FileInfo};

/// Suffixes tried by `make_unique` before giving up
pub const MAX_UNIQUE_ATTEMPTS: usize = 1000;

/// Unique if nothing exists at `<dir of file>/<new_name>`
pub fn is_unique(folder: &dyn Folder, new_name: &str, file: &FileInfo) -> bool {
	let candidate = disk_path(folder.local_base(), &file.sibling_name(new_name));
	fs::symlink_metadata(candidate).is_err()
}

/// Append `-1`, `-2`, ... to the stem of the file's name until it is unique.
///
/// `song.mp3` next to `song-1.mp3` and `song-2.mp3` becomes `song-3.mp3`.
pub fn make_unique(folder: &dyn Folder, file: &FileInfo) -> Result<String, HealError> {
	make_unique_name(folder, file, file.filename_only())
}

/// Like [`make_unique`], but starting from an arbitrary candidate name
pub fn make_unique_name(
	folder: &dyn Folder,
	file: &FileInfo,
	name: &str,
) -> Result<String, HealError> {
	let (stem, extension) = split_extension(name);
	for count in 1..=MAX_UNIQUE_ATTEMPTS {
		let candidate = format!("{}-{}{}", stem, count, extension);
		if is_unique(folder, &candidate, file) {
			return Ok(candidate);
		}
	}
	Err(HealError::internal(format!(
		"No unique name for {} after {} attempts",
		file.relative_name, MAX_UNIQUE_ATTEMPTS
	)))
}

/// Use `name` if it is free, otherwise make it unique
pub fn unique_or_suffixed(
	folder: &dyn Folder,
	file: &FileInfo,
	name: &str,
) -> Result<String, HealError> {
	if !name.is_empty() && is_unique(folder, name, file) {
		Ok(name.to_string())
	} else {
		make_unique_name(folder, file, name)
	}
}

/// Longest prefix of the file's name (at most 255 units) that is unique
pub fn get_shorter_filename(folder: &dyn Folder, file: &FileInfo) -> Result<String, HealError> {
	let name = file.filename_only();
	let mut length = MAX_FILENAME_LENGTH.min(name_length(name));

	loop {
		let candidate = truncate_to_length(name, length);
		// a surrogate pair may make the prefix shorter than asked for
		if !candidate.is_empty() && is_unique(folder, candidate, file) {
			return Ok(candidate.to_string());
		}
		if length <= 1 {
			return Err(HealError::internal(format!(
				"Length too small when shortening {}",
				name
			)));
		}
		length -= 1;
	}
}

/// Rename the file to `new_name` and update the folder's records.
///
/// If the file is already gone there is nothing to fix; the problem is
/// dropped without renaming. A failed rename leaves the problem registered.
pub fn resolve(
	env: &dyn Environment,
	file: &FileInfo,
	new_name: &str,
	problem: &Problem,
) -> Result<(), HealError> {
	let folder = match env.folder(&file.folder) {
		Some(folder) => folder,
		None => {
			debug!("Folder {} is gone, not renaming {}", file.folder, file.relative_name);
			return Ok(());
		}
	};

	let source = folder.disk_file(file);
	if fs::symlink_metadata(&source).is_err() {
		debug!("{} no longer exists, nothing to rename", source.display());
		folder.problems().remove(problem);
		return Ok(());
	}

	let new_relative = file.sibling_name(new_name);
	let target = disk_path(folder.local_base(), &new_relative);
	if fs::symlink_metadata(&target).is_ok() {
		warn!("Not renaming {}: {} appeared meanwhile", source.display(), target.display());
		return Err(HealError::Io(io::Error::new(
			io::ErrorKind::AlreadyExists,
			format!("{} already exists", target.display()),
		)));
	}

	if let Err(e) = fs::rename(&source, &target) {
		warn!("Failed to rename {} to {}: {}", source.display(), target.display(), e);
		return Err(e.into());
	}
	info!("Renamed {} to {}", file.relative_name, new_relative);

	let renamed = file.renamed(&new_relative, env.my_self());
	if folder.is_known(file) {
		folder.remove_files_local(std::slice::from_ref(file))?;
	}
	folder.scan_new_file(renamed)?;
	folder.problems().remove(problem);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testutil::TestFolder;

	#[test]
	fn test_make_unique_skips_existing() {
		let t = TestFolder::new();
		t.touch("song.mp3");
		t.touch("song-1.mp3");
		t.touch("song-2.mp3");
		let file = t.file("song.mp3");
		assert_eq!(make_unique(&t.folder, &file).unwrap(), "song-3.mp3");
	}

	#[test]
	fn test_make_unique_without_extension() {
		let t = TestFolder::new();
		t.touch("abcd");
		t.touch("abcd-1");
		let file = t.file("abcd");
		assert_eq!(make_unique(&t.folder, &file).unwrap(), "abcd-2");
	}

	#[test]
	fn test_make_unique_looks_in_own_directory() {
		let t = TestFolder::new();
		t.touch("sub/abcd.txt");
		t.touch("sub/abcd-1.txt");
		t.touch("abcd-2.txt");
		let file = t.file("sub/abcd.txt");
		assert_eq!(make_unique(&t.folder, &file).unwrap(), "abcd-2.txt");
	}

	#[test]
	fn test_shorter_filename() {
		let t = TestFolder::new();
		t.touch("abcd");
		t.touch("abcde");
		t.touch("abcdef");
		let s = get_shorter_filename(&t.folder, &t.file("abcdef")).unwrap();
		assert_eq!(s, "abc");

		let s = get_shorter_filename(&t.folder, &t.file("other")).unwrap();
		assert_eq!(s, "other");
	}

	#[test]
	fn test_shorter_filename_caps_length() {
		let t = TestFolder::new();
		let long = "abcdefghijklmnopqrstuvwxyz".repeat(12);
		let s = get_shorter_filename(&t.folder, &t.file(&long)).unwrap();
		assert_eq!(s.len(), 255);
		assert!(long.starts_with(&s));
	}

	#[test]
	fn test_shorter_filename_exhausted() {
		let t = TestFolder::new();
		t.touch("a");
		t.touch("ab");
		let result = get_shorter_filename(&t.folder, &t.file("ab"));
		assert!(matches!(result, Err(HealError::Internal { .. })));
	}

	#[test]
	fn test_unique_or_suffixed() {
		let t = TestFolder::new();
		let file = t.file("what?.txt");
		assert_eq!(unique_or_suffixed(&t.folder, &file, "what.txt").unwrap(), "what.txt");
		t.touch("what.txt");
		assert_eq!(unique_or_suffixed(&t.folder, &file, "what.txt").unwrap(), "what-1.txt");
		assert_eq!(unique_or_suffixed(&t.folder, &file, "").unwrap(), "-1");
	}
}

// vim: ts=4
