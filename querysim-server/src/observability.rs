//! Initialization of the logging stack.

use std::env;
use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// Logs are written to stderr in the configured [`LogFormat`]. The level is taken from
/// `RUST_LOG` if it is set, otherwise from the configuration.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(config.logging.level);

    let format = match config.logging.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let fmt_layer = match format {
        LogFormat::Pretty | LogFormat::Auto => fmt_layer.compact().boxed(),
        LogFormat::Simplified => fmt_layer.with_ansi(false).boxed(),
        LogFormat::Json => fmt_layer.json().with_current_span(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(level))
        .with(env_filter)
        .init();
}

/// Resolves the effective level and the maximum verbosity filter.
///
/// `RUST_LOG` is parsed as a simple level if possible. Otherwise, it is used literally as a list
/// of filter directives and the configured `default` level is ignored.
pub fn parse_rust_log(default: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => default,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        tower_http=DEBUG,\
        querysim_server=TRACE,\
        querysim_service=TRACE,\
        ",
    );

    (level, env_filter)
}
