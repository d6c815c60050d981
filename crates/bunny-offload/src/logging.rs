//! Tracing setup and structured operation logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout stays clean for command output.
/// `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` filters.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bunny=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger for one offload operation (an upload, a deletion).
///
/// Every line carries the operation name and the subject it acts on.
#[derive(Debug, Clone)]
pub struct OperationLogger {
    operation: &'static str,
    subject: String,
}

impl OperationLogger {
    /// Create a logger for one operation.
    ///
    /// # Arguments
    /// * `operation` - Operation name (e.g., "upload_video", "delete_user")
    /// * `subject` - What it acts on: a file path, post id or user id
    pub fn new(operation: &'static str, subject: impl Into<String>) -> Self {
        Self {
            operation,
            subject: subject.into(),
        }
    }

    /// Log the start of the operation.
    pub fn log_start(&self, message: &str) {
        info!(operation = self.operation, subject = %self.subject, "Started: {}", message);
    }

    /// Log a step completed along the way.
    pub fn log_progress(&self, message: &str) {
        info!(operation = self.operation, subject = %self.subject, "Progress: {}", message);
    }

    /// Log a recoverable problem; the operation carries on.
    pub fn log_warning(&self, message: &str) {
        warn!(operation = self.operation, subject = %self.subject, "Warning: {}", message);
    }

    /// Log the failure that ended the operation.
    pub fn log_error(&self, message: &str) {
        error!(operation = self.operation, subject = %self.subject, "Failed: {}", message);
    }

    /// Log successful completion.
    pub fn log_completion(&self, message: &str) {
        info!(operation = self.operation, subject = %self.subject, "Completed: {}", message);
    }

    /// Get the operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Get the subject the operation acts on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Create a tracing span for this operation.
    ///
    /// Instrument the operation's futures with it so nested client spans
    /// inherit the operation and subject fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("offload", operation = self.operation, subject = %self.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_logger() {
        let logger = OperationLogger::new("upload_video", "clip.mp4");
        assert_eq!(logger.operation(), "upload_video");
        assert_eq!(logger.subject(), "clip.mp4");
    }
}
