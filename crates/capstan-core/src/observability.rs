//! Observability infrastructure for Capstan.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors used across the control
//! plane.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

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
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `capstan_control=debug`)
///
/// # Example
///
/// ```rust
/// use capstan_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
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

/// Creates a span for a control operation with standard fields.
///
/// # Example
///
/// ```rust
/// use capstan_core::observability::control_span;
///
/// let span = control_span("unlock", "01J8ZQ6W9GVXN2J4T0F7R8S5YD");
/// let _guard = span.enter();
/// // ... run the operation
/// ```
#[must_use]
pub fn control_span(operation: &str, task_id: &str) -> Span {
    tracing::info_span!("control", op = operation, task_id = task_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty); // Second call should be no-op
    }

    #[test]
    fn test_span_helper_creates_span() {
        let span = control_span("unlock", "01J8ZQ6W9GVXN2J4T0F7R8S5YD");
        let _guard = span.enter();
        tracing::info!("test message in span");
    }
}
