//! Error types for syncheal operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for integrity checks and problem resolution
#[derive(Debug)]
pub enum HealError {
	/// A required identity (folder id, file path, ...) was missing
	InvalidArgument { message: String },

	/// I/O error
	Io(io::Error),

	/// Internal consistency failure (e.g. a namespace that cannot be made unique)
	Internal { message: String },

	/// A background executor refused to accept a task
	Rejected { message: String },

	/// Operation requires an authenticated session
	NotLoggedIn,

	/// Folder is not known to the environment
	FolderNotFound { id: String },

	/// Folder metadata database failure
	Database { message: String },

	/// Invalid configuration
	Config { message: String },

	/// User declined a decision the operation depends on
	Cancelled,
}

impl HealError {
	/// Shorthand for an invalid-argument error
	pub fn invalid(message: impl Into<String>) -> Self {
		HealError::InvalidArgument { message: message.into() }
	}

	/// Shorthand for an internal consistency error
	pub fn internal(message: impl Into<String>) -> Self {
		HealError::Internal { message: message.into() }
	}

	/// Is this a "file not found" I/O error
	pub fn is_not_found(&self) -> bool {
		matches!(self, HealError::Io(e) if e.kind() == io::ErrorKind::NotFound)
	}
}

impl fmt::Display for HealError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HealError::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
			HealError::Io(e) => write!(f, "I/O error: {}", e),
			HealError::Internal { message } => write!(f, "Internal error: {}", message),
			HealError::Rejected { message } => write!(f, "Task rejected: {}", message),
			HealError::NotLoggedIn => write!(f, "Not logged in to a server account"),
			HealError::FolderNotFound { id } => write!(f, "Folder not found: {}", id),
			HealError::Database { message } => write!(f, "Folder database error: {}", message),
			HealError::Config { message } => write!(f, "Invalid configuration: {}", message),
			HealError::Cancelled => write!(f, "Operation cancelled"),
		}
	}
}

impl Error for HealError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			HealError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for HealError {
	fn from(e: io::Error) -> Self {
		HealError::Io(e)
	}
}

impl From<redb::DatabaseError> for HealError {
	fn from(e: redb::DatabaseError) -> Self {
		HealError::Database { message: e.to_string() }
	}
}

impl From<redb::TransactionError> for HealError {
	fn from(e: redb::TransactionError) -> Self {
		HealError::Database { message: e.to_string() }
	}
}

impl From<redb::TableError> for HealError {
	fn from(e: redb::TableError) -> Self {
		HealError::Database { message: e.to_string() }
	}
}

impl From<redb::StorageError> for HealError {
	fn from(e: redb::StorageError) -> Self {
		HealError::Database { message: e.to_string() }
	}
}

impl From<redb::CommitError> for HealError {
	fn from(e: redb::CommitError) -> Self {
		HealError::Database { message: e.to_string() }
	}
}

impl From<json5::Error> for HealError {
	fn from(e: json5::Error) -> Self {
		HealError::Database { message: format!("Record encoding failed: {}", e) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_messages() {
		assert_eq!(HealError::invalid("folder id").to_string(), "Invalid argument: folder id");
		assert!(HealError::NotLoggedIn.to_string().contains("Not logged in"));
		assert!(HealError::internal("boom").to_string().starts_with("Internal error"));
	}

	#[test]
	fn test_io_conversion_keeps_kind() {
		let err: HealError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
		assert!(err.is_not_found());
		assert!(err.source().is_some());

		let err: HealError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
		assert!(!err.is_not_found());
	}
}

// vim: ts=4
