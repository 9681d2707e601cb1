//! Logging setup.
//!
//! Console output always; with `--log`, the same lines are appended to a
//! plain-text file in the working directory.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// File written by `--log`.
pub const LOG_FILE_NAME: &str = "skytube.log";

fn filter_directive(verbose: bool) -> &'static str {
    if verbose {
        "skytube=debug,warn"
    } else {
        "skytube=info,warn"
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose)))
}

/// Install the global subscriber. The console keeps its colours; `log_file`
/// adds a second sink that gets the same events without ANSI escapes.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false),
        )
        .with(file_layer)
        .with(filter(verbose))
        .init();

    if let Some(path) = log_file {
        tracing::info!(path = %path.display(), "file logging enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_only_our_own_level() {
        assert_eq!(filter_directive(false), "skytube=info,warn");
        assert_eq!(filter_directive(true), "skytube=debug,warn");
    }
}
