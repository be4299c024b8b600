//! File logging for jukebox-rs
//!
//! Stdout belongs to the command console, so every log line goes to a daily
//! file under the configured log directory instead.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "jukebox-rs";
const LOG_FILE_SUFFIX: &str = "log";

/// Used when `RUST_LOG` is unset and the config names no filter
pub const DEFAULT_FILTER: &str = "jukebox_rs=debug,rspotify=info,warn";

/// `RUST_LOG` wins over the configured directives
fn build_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber writing to `<dir>/jukebox-rs.YYYY-MM-DD.log`.
///
/// The returned guard flushes buffered lines on drop; keep it alive in `main`.
pub fn init_logging(dir: &Path, filter: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)
        .context("creating log file appender")?;

    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_filter(filter))
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(dir = %dir.display(), "Logging initialized");
    Ok(guard)
}

/// Log the outcome of a provider lookup
#[macro_export]
macro_rules! log_lookup_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "Lookup successful"),
            Err(e) => tracing::warn!(operation = $operation, error = %e, "Lookup failed"),
        }
    };
}

/// Log a provider lookup with additional context
#[macro_export]
macro_rules! log_lookup_request {
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "Lookup started");
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn log_directory_is_created() {
        let dir = std::env::temp_dir().join(format!("jukebox-logs-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        // The global subscriber may already be set by another test
        let _ = init_logging(&dir, DEFAULT_FILTER);

        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
