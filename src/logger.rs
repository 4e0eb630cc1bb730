//! Centralized logging configuration for mate-solver demos and tests
//!
//! Provides a consistent tracing setup with a default INFO level that can be
//! overridden through the `RUST_LOG` environment variable.

use tracing::Level;

/// Initialize the tracing subscriber with mate-solver's standard configuration
///
/// Default log level: INFO (overrideable via RUST_LOG environment variable)
///
/// # Example
/// ```no_run
/// use mate_solver::init_logger;
///
/// fn main() {
///     init_logger();
///     tracing::info!("assembly loaded");
/// }
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}
