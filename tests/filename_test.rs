/// Filename legality and unique name generation on real directories
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use syncheal::filename::{self, get_shorter_filename, make_unique};
use syncheal::{Config, FileInfo, Folder, LocalFolder, MemberInfo};

fn open(root: &TempDir) -> LocalFolder {
	let base = root.path().join("data");
	fs::create_dir_all(&base).unwrap();
	let config = Config { state_dir: root.path().join("state"), ..Config::default() };
	let db = syncheal::local::default_db_path(&config, &base);
	LocalFolder::open(&base, &db, config, MemberInfo::new("m1", "alice")).unwrap()
}

fn touch(base: &Path, name: &str) {
	fs::write(base.join(name), "").unwrap();
}

#[test]
fn test_has_problems() {
	assert!(filename::has_problems("CON.txt"));
	assert!(filename::has_problems(&format!("a{}", "x".repeat(260))));
	assert!(filename::has_problems("a/b"));
	assert!(filename::has_problems("file."));
	assert!(filename::has_problems("file "));
	assert!(!filename::has_problems("a valid filename.whatever"));
	assert!(!filename::has_problems("日本語でのテスト"));
}

#[test]
fn test_make_unique_song() {
	let root = TempDir::new().unwrap();
	let folder = open(&root);
	for name in &["song.mp3", "song-1.mp3", "song-2.mp3"] {
		touch(folder.local_base(), name);
	}
	let file = FileInfo::new(folder.info().id.clone(), "song.mp3").unwrap();
	assert_eq!(make_unique(&folder, &file).unwrap(), "song-3.mp3");
}

#[test]
fn test_make_unique_keeps_extension() {
	let root = TempDir::new().unwrap();
	let folder = open(&root);
	touch(folder.local_base(), "abcd.txt");
	touch(folder.local_base(), "abcd-1.txt");
	let file = FileInfo::new(folder.info().id.clone(), "abcd.txt").unwrap();
	assert_eq!(make_unique(&folder, &file).unwrap(), "abcd-2.txt");
}

#[test]
fn test_shorter_filename_of_long_name() {
	let root = TempDir::new().unwrap();
	let folder = open(&root);
	let long: String = (0..300).map(|i| (b'a' + (i % 26) as u8) as char).collect();
	let file = FileInfo::new(folder.info().id.clone(), long.as_str()).unwrap();

	let shorter = get_shorter_filename(&folder, &file).unwrap();
	assert_eq!(shorter, &long[..255]);

	// the 255 prefix is taken, so the next shorter one wins
	touch(folder.local_base(), &long[..255]);
	let shorter = get_shorter_filename(&folder, &file).unwrap();
	assert_eq!(shorter, &long[..254]);
}

#[test]
fn test_shorter_filename_keeps_short_names() {
	let root = TempDir::new().unwrap();
	let folder = open(&root);
	for name in &["abcd", "abcde", "abcdef"] {
		touch(folder.local_base(), name);
	}
	let id = folder.info().id.clone();
	let shorter = get_shorter_filename(&folder, &FileInfo::new(id.clone(), "abcdef").unwrap());
	assert_eq!(shorter.unwrap(), "abc");
	let shorter = get_shorter_filename(&folder, &FileInfo::new(id, "other").unwrap());
	assert_eq!(shorter.unwrap(), "other");
}

// vim: ts=4
