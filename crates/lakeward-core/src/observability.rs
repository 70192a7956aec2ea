//! Observability infrastructure for Lakeward.
//!
//! Structured logging with consistent spans. The scheduler and its
//! logs/metrics are the only consumers of cleaning outcomes, so every
//! per-table operation runs inside a span naming the table.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: controls log levels (e.g., `info`, `lakeward_maintenance=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for per-table maintenance operations.
///
/// # Example
///
/// ```rust
/// use lakeward_core::observability::table_span;
///
/// let span = table_span("orphan_clean", "demo.db.events");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn table_span(operation: &str, table: &str) -> Span {
    tracing::info_span!("maintenance", op = operation, table = table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn table_span_creates_span() {
        let span = table_span("orphan_clean", "demo.db.events");
        let _guard = span.enter();
        tracing::info!("message in span");
    }
}
