use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::str::FromStr;

/// Initialize the logger with custom formatting.
///
/// `RUST_LOG` directives, when present, are applied on top of `level`.
/// Returns false if a logger was already installed.
pub fn init_logger(level: LevelFilter) -> bool {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, level)
        // Per-connection chatter from the HTTP server
        .filter_module("actix_server", level.min(LevelFilter::Info));

    if let Ok(directives) = std::env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }

    builder.try_init().is_ok()
}

/// Parse a log level name, case-insensitively
pub fn parse_log_level(level: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(level.trim()).ok()
}

/// Get log level from string, falling back to Info for unknown names
pub fn get_log_level(level: &str) -> LevelFilter {
    parse_log_level(level).unwrap_or(LevelFilter::Info)
}
