//! # syncheal - Folder integrity checks and self-healing
//!
//! Detects anomalies in a synchronized folder (illegal or colliding file
//! names, a damaged metadata database, mass deletions, stale replicas),
//! keeps them in a deduplicated [`ProblemRegistry`](problem::ProblemRegistry)
//! and resolves them where an automatic fix exists. A debounced
//! [`DirectoryFilter`](filter::DirectoryFilter) presents a live filtered view
//! of a folder.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use syncheal::{Config, LocalEnvironment, LocalFolder, MemberInfo, TokioExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let me = MemberInfo::new("local", "alice");
//!     let base = std::path::Path::new("./music");
//!     let db = syncheal::local::default_db_path(&config, base);
//!     let folder = Arc::new(LocalFolder::open(base, &db, config, me.clone())?);
//!     folder.scan()?;
//!
//!     let env = Arc::new(LocalEnvironment::new(me, Arc::new(TokioExecutor::current()?)));
//!     env.add_folder(folder.clone());
//!     for problem in folder.problems().problems() {
//!         problem.submit_resolution(env.clone())?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod filename;
pub mod filter;
pub mod local;
pub mod logging;
pub mod problem;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-export commonly used types and functions
pub use config::Config;
pub use environment::{Environment, Folder, FolderEvent, FolderListener};
pub use error::HealError;
pub use executor::{TaskExecutor, TokioExecutor};
pub use filter::{DirectoryFilter, FilterCriteria, FilterMode, FilteredDirectoryEvent};
pub use local::{LocalEnvironment, LocalFolder};
pub use problem::{Problem, ProblemKind, ProblemRegistry};
pub use types::{FileInfo, FolderId, FolderInfo, MemberInfo};

// vim: ts=4
