//! Log setup for the heist engine
//!
//! Heist lifecycle events (`crew_heist::heist::*`) log at the configured
//! level; database driver chatter is held at `warn` unless `RUST_LOG` asks
//! for more.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crates that log every statement or connection at `info`
const QUIET_CRATES: &[&str] = &["sqlx", "sqlx_postgres"];

/// Filter used when `RUST_LOG` is unset.
///
/// Everything else stays at `warn` so a `debug` engine level does not
/// flood the file with dependency output.
pub fn default_directives(level: &str) -> String {
    let mut directives = format!("warn,crew_heist={level}");
    for name in QUIET_CRATES {
        directives.push_str(&format!(",{name}=warn"));
    }
    directives
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber: rolling heist log (text or JSON), plus
/// stdout when writing text.
///
/// Keep the guard alive for the life of the process or buffered lines are
/// lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry().with(build_filter(&config.log_level));

    if config.use_json {
        // Module path tells registry, resolver and recovery events apart.
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    tracing::debug!(
        level = %config.log_level,
        dir = %config.log_dir,
        json = config.use_json,
        "Heist logging initialised"
    );
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_level_follows_config() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("crew_heist=debug"));
        assert!(directives.contains("sqlx=warn"));
        assert!(directives.parse::<EnvFilter>().is_ok());
    }
}
