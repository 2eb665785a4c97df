use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

pub const LOG_FILE_PREFIX: &str = "aipal-backend.log";

const SERVICE_TARGETS: [&str; 2] = ["aipal_backend", "tower_http"];

/// Keeps the non-blocking file writer alive; dropping it flushes pending lines.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Turns `RUST_LOG` into filter directives.
///
/// A bare level (`debug`) applies to the service and its HTTP traces while
/// dependencies stay at `warn`. Full directive strings pass through untouched;
/// anything unparseable falls back to `info`.
pub fn filter_directives(log_level: &str) -> String {
    let raw = log_level.trim();
    if raw.contains('=') || raw.contains(',') {
        return raw.to_string();
    }

    let level = raw.parse::<Level>().unwrap_or(Level::INFO);
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in SERVICE_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(filter_directives(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")));
    let stdout_layer = fmt::layer().with_target(true);

    let file_writer = config.log_dir.as_deref().and_then(open_log_dir);
    match file_writer {
        Some((writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();
            Some(FileLogGuard { _guard: guard })
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
            None
        }
    }
}

fn open_log_dir(dir: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    // The subscriber is not installed yet, so this can only go to stderr.
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}", dir.display());
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_scopes_to_service_targets() {
        assert_eq!(
            filter_directives("debug"),
            "warn,aipal_backend=debug,tower_http=debug"
        );
        assert_eq!(
            filter_directives(" TRACE "),
            "warn,aipal_backend=trace,tower_http=trace"
        );
    }

    #[test]
    fn directive_strings_pass_through() {
        assert_eq!(filter_directives("sqlx=debug,info"), "sqlx=debug,info");
    }

    #[test]
    fn garbage_falls_back_to_info() {
        assert_eq!(
            filter_directives("loud"),
            "warn,aipal_backend=info,tower_http=info"
        );
        assert_eq!(filter_directives(""), filter_directives("info"));
    }
}
