//! Tracing subscriber setup.
//!
//! The terminal belongs to the TUI, so logs always go to a file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// `<data_dir>/navtree/navtree.log`, falling back to the temp dir.
pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("navtree")
        .join("navtree.log")
}

/// Install the global subscriber writing to `log_file_path`.
///
/// `RUST_LOG` selects what is recorded; without it everything at `info` and
/// above is kept.
pub fn init_global(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = File::create(log_file_path)?;
    build_subscriber(log_file).init();
    Ok(())
}

pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
