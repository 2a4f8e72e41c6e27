use std::io::{self, IsTerminal};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{config::LoggingConfig, infrastructure::directories::ResolvedPaths};

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Installs the global subscriber: a daily log file under the logs directory
/// plus, unless disabled, a console layer. Later calls are no-ops.
///
/// The console layer writes to stderr. stdout belongs to command output such
/// as filtered messages and exports, which are often piped.
pub fn init_tracing(config: &LoggingConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, &config.file_name);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);
        let console_layer = config.console.then(|| {
            let stderr = io::stderr();
            let ansi = stderr.is_terminal();
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_ansi(ansi)
        });

        tracing_subscriber::registry()
            .with(build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level))
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        tracing::info!(
            target: "cli",
            logs = %paths.logs_dir.display(),
            file = %config.file_name,
            console = config.console,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level; anything unparsable falls back
/// to `info`.
fn build_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_takes_precedence() {
        let rendered = build_filter(Some("storage=trace"), "warn").to_string();
        assert!(rendered.contains("storage=trace"), "{rendered}");
        assert!(!rendered.contains("warn"), "{rendered}");
    }

    #[test]
    fn configured_level_accepts_per_target_directives() {
        let filter = build_filter(None, "info,classifier=debug");
        let rendered = filter.to_string();
        assert!(rendered.contains("classifier=debug"), "{rendered}");
    }
}
