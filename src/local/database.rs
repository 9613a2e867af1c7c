//! Folder metadata database
//!
//! Stores one [`FileInfo`] record per relative name, json5 encoded, plus a
//! few folder level values (folder id, last sync time).

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::HealError;
use crate::types::{FileInfo, FolderId};

/// Key: relative file name
/// Value: serialized FileInfo (bytes)
const FILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Key: setting name
/// Value: setting value
const META_TABLE: TableDefinition<&str, &str> = TableDefinition::new("meta");

const META_FOLDER_ID: &str = "folder_id";
const META_LAST_SYNC: &str = "last_sync";

/// Metadata database of one folder, backed by redb
pub struct FolderDatabase {
	db: redb::Database,
	db_path: PathBuf,
}

impl FolderDatabase {
	/// Open or create a folder database
	pub fn open(db_path: &Path) -> Result<Self, HealError> {
		if let Some(parent) = db_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let db = redb::Database::create(db_path)?;
		// Ensure both tables exist
		{
			let write_txn = db.begin_write()?;
			let _ = write_txn.open_table(FILES_TABLE)?;
			let _ = write_txn.open_table(META_TABLE)?;
			write_txn.commit()?;
		}
		Ok(FolderDatabase { db, db_path: db_path.to_path_buf() })
	}

	pub fn path(&self) -> &Path {
		&self.db_path
	}

	pub fn folder_id(&self) -> Result<Option<FolderId>, HealError> {
		match self.meta(META_FOLDER_ID)? {
			Some(id) => Ok(Some(FolderId::new(id)?)),
			None => Ok(None),
		}
	}

	pub fn set_folder_id(&self, id: &FolderId) -> Result<(), HealError> {
		self.set_meta(META_FOLDER_ID, id.as_str())
	}

	pub fn last_sync(&self) -> Result<Option<SystemTime>, HealError> {
		match self.meta(META_LAST_SYNC)? {
			Some(secs) => {
				let secs: u64 = secs.parse().map_err(|_| HealError::Database {
					message: format!("Bad last sync time: {}", secs),
				})?;
				Ok(Some(UNIX_EPOCH + Duration::from_secs(secs)))
			}
			None => Ok(None),
		}
	}

	pub fn set_last_sync(&self, time: SystemTime) -> Result<(), HealError> {
		let secs = time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
		self.set_meta(META_LAST_SYNC, &secs.to_string())
	}

	/// Record for a relative name
	pub fn get(&self, relative_name: &str) -> Result<Option<FileInfo>, HealError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FILES_TABLE)?;

		match table.get(relative_name)? {
			Some(entry) => {
				let bytes = entry.value().to_vec();
				Ok(Some(decode(relative_name, &bytes)?))
			}
			None => Ok(None),
		}
	}

	/// Store one record
	pub fn put(&self, file: &FileInfo) -> Result<(), HealError> {
		self.put_all(std::slice::from_ref(file))
	}

	/// Store many records in one transaction
	pub fn put_all(&self, files: &[FileInfo]) -> Result<(), HealError> {
		if files.is_empty() {
			return Ok(());
		}
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(FILES_TABLE)?;
			for file in files {
				let encoded = json5::to_string(file)?;
				table.insert(file.relative_name.as_str(), encoded.as_bytes())?;
			}
		}
		write_txn.commit()?;
		Ok(())
	}

	/// Drop records. Returns how many existed.
	pub fn remove_all(&self, relative_names: &[&str]) -> Result<usize, HealError> {
		let write_txn = self.db.begin_write()?;
		let mut removed = 0;
		{
			let mut table = write_txn.open_table(FILES_TABLE)?;
			for name in relative_names {
				if table.remove(*name)?.is_some() {
					removed += 1;
				}
			}
		}
		write_txn.commit()?;
		Ok(removed)
	}

	/// Every record, ordered by relative name. Fails on the first unreadable record.
	pub fn records(&self) -> Result<Vec<FileInfo>, HealError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FILES_TABLE)?;

		let mut out = Vec::new();
		for item in table.iter()? {
			let (key, value) = item?;
			let bytes = value.value().to_vec();
			out.push(decode(key.value(), &bytes)?);
		}
		Ok(out)
	}

	/// Relative names of records that cannot be decoded
	pub fn corrupt_records(&self) -> Result<Vec<String>, HealError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FILES_TABLE)?;

		let mut out = Vec::new();
		for item in table.iter()? {
			let (key, value) = item?;
			let bytes = value.value().to_vec();
			if decode(key.value(), &bytes).is_err() {
				out.push(key.value().to_string());
			}
		}
		Ok(out)
	}

	/// Drop every file record; folder level values stay
	pub fn clear(&self) -> Result<(), HealError> {
		let keys: Vec<String> = {
			let read_txn = self.db.begin_read()?;
			let table = read_txn.open_table(FILES_TABLE)?;
			let mut keys = Vec::new();
			for item in table.iter()? {
				let (key, _) = item?;
				keys.push(key.value().to_string());
			}
			keys
		};
		let names: Vec<&str> = keys.iter().map(String::as_str).collect();
		self.remove_all(&names)?;
		Ok(())
	}

	#[cfg(test)]
	pub(crate) fn put_raw(&self, relative_name: &str, bytes: &[u8]) -> Result<(), HealError> {
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(FILES_TABLE)?;
			table.insert(relative_name, bytes)?;
		}
		write_txn.commit()?;
		Ok(())
	}

	fn meta(&self, key: &str) -> Result<Option<String>, HealError> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(META_TABLE)?;
		let value = table.get(key)?.map(|v| v.value().to_string());
		Ok(value)
	}

	fn set_meta(&self, key: &str, value: &str) -> Result<(), HealError> {
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(META_TABLE)?;
			table.insert(key, value)?;
		}
		write_txn.commit()?;
		Ok(())
	}
}

fn decode(relative_name: &str, bytes: &[u8]) -> Result<FileInfo, HealError> {
	let text = std::str::from_utf8(bytes).map_err(|e| HealError::Database {
		message: format!("Record {} is not UTF-8: {}", relative_name, e),
	})?;
	json5::from_str(text).map_err(|e| HealError::Database {
		message: format!("Record {} is unreadable: {}", relative_name, e),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn open() -> (TempDir, FolderDatabase) {
		let dir = TempDir::new().unwrap();
		let db = FolderDatabase::open(&dir.path().join("state/folder.db")).unwrap();
		(dir, db)
	}

	fn file(name: &str) -> FileInfo {
		FileInfo::new(FolderId::new("f1").unwrap(), name).unwrap().with_size(12).with_version(2)
	}

	#[test]
	fn test_put_get_remove() {
		let (_dir, db) = open();
		db.put(&file("a.txt")).unwrap();
		db.put_all(&[file("b/c.txt"), file("b/d.txt")]).unwrap();

		let got = db.get("a.txt").unwrap().unwrap();
		assert_eq!(got, file("a.txt"));
		assert_eq!(db.records().unwrap().len(), 3);

		assert_eq!(db.remove_all(&["a.txt", "missing"]).unwrap(), 1);
		assert!(db.get("a.txt").unwrap().is_none());

		db.clear().unwrap();
		assert!(db.records().unwrap().is_empty());
	}

	#[test]
	fn test_meta_values() {
		let (_dir, db) = open();
		assert!(db.folder_id().unwrap().is_none());
		let id = FolderId::generate();
		db.set_folder_id(&id).unwrap();
		assert_eq!(db.folder_id().unwrap(), Some(id));

		let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
		db.set_last_sync(t).unwrap();
		assert_eq!(db.last_sync().unwrap(), Some(t));
	}

	#[test]
	fn test_corrupt_record_detected() {
		let (_dir, db) = open();
		db.put(&file("ok.txt")).unwrap();
		db.put_raw("broken.txt", b"{not json5").unwrap();

		assert!(matches!(db.records(), Err(HealError::Database { .. })));
		assert_eq!(db.corrupt_records().unwrap(), vec!["broken.txt".to_string()]);
	}
}

// vim: ts=4
