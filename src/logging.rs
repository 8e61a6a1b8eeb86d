use console::Term;
use std::env;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/photo-sync.log";

/// Log to stdout and to `LOG_FILE_PATH`; keep the returned guard alive until exit.
///
/// Escape codes are only written to stdout when it is a terminal and
/// `NO_COLOR` is unset, so redirected output stays plain text.
pub fn init_logger() -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let no_color = env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    let stdout_ansi = use_ansi(Term::stdout().is_term(), no_color);
    if !use_ansi(Term::stderr().is_term(), no_color) {
        colored::control::set_override(false);
    }

    let log_file_path = log_file_path(env::var("LOG_FILE_PATH").ok());
    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(stdout_ansi),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    debug!(stdout_ansi, "Tracing is configured for stdout and file logging.");

    guard
}

fn use_ansi(is_term: bool, no_color: bool) -> bool {
    is_term && !no_color
}

fn log_file_path(configured: Option<String>) -> String {
    configured
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
}
