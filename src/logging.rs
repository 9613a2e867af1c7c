//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Scanned folder");
//! warn!("Rename failed");
//! ```

pub use tracing::{debug, error, info, warn};

use crate::config::LogFormat;

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence over `default_level`:
///
/// ```bash
/// RUST_LOG=debug syncheal check ./folder
/// RUST_LOG=syncheal::filter=trace syncheal filter ./folder -s report
/// ```
pub fn init_tracing(default_level: &str, format: LogFormat) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

	// try_init: a second call (tests, embedding) must not panic
	let _ = match format {
		LogFormat::Compact => builder.compact().try_init(),
		LogFormat::Pretty => builder.try_init(),
	};
}

// vim: ts=4
