//! Configuration for query recording.

use std::time::Duration;

/// Configuration options for the query watcher.
///
/// # Example
///
/// ```rust
/// use sea_orm_query_watcher::WatcherConfig;
/// use std::time::Duration;
///
/// let config = WatcherConfig::default()
///     .with_inline_bindings(false)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Whether to record `db.statement` at all.
    /// Default: `true`
    pub record_statements: bool,

    /// Whether to inline bound values into the recorded statement.
    /// When disabled the SQL template is recorded with its placeholders.
    /// Default: `true`
    pub inline_bindings: bool,

    /// Queries slower than this are flagged with `slow_query` and logged at WARN.
    /// Default: 500ms
    pub slow_query_threshold: Duration,

    /// Whether to record `db.duration_ms`.
    /// Default: `true`
    pub record_duration: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            record_statements: true,
            inline_bindings: true,
            slow_query_threshold: Duration::from_millis(500),
            record_duration: true,
        }
    }
}

impl WatcherConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the `db.statement` attribute.
    pub fn with_statement_recording(mut self, enabled: bool) -> Self {
        self.record_statements = enabled;
        self
    }

    /// Enable or disable inlining of bound values.
    ///
    /// **Security Warning**: Bound values often carry user input. Inlined
    /// statements end up verbatim in your traces.
    pub fn with_inline_bindings(mut self, enabled: bool) -> Self {
        self.inline_bindings = enabled;
        self
    }

    /// Set the threshold for slow query warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Enable or disable the `db.duration_ms` attribute.
    pub fn with_duration_recording(mut self, enabled: bool) -> Self {
        self.record_duration = enabled;
        self
    }

    /// Everything recorded, bindings inlined, slow at 100ms.
    pub fn development() -> Self {
        Self {
            record_statements: true,
            inline_bindings: true,
            slow_query_threshold: Duration::from_millis(100),
            record_duration: true,
        }
    }

    /// Statements recorded as templates only, slow at 1s.
    pub fn production() -> Self {
        Self {
            record_statements: true,
            inline_bindings: false,
            slow_query_threshold: Duration::from_secs(1),
            record_duration: true,
        }
    }

    pub(crate) fn is_slow(&self, elapsed_ms: f64) -> bool {
        elapsed_ms.is_finite() && elapsed_ms > self.slow_query_threshold.as_secs_f64() * 1000.0
    }
}
