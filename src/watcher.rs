//! Turns executed queries into spans.

use crate::binding::RawBinding;
use crate::config::WatcherConfig;
use crate::driver::QueryConnection;
use crate::error::RecordError;
use crate::event::QueryExecuted;
use crate::statement::substitute;
use crate::timing::{self, Clock, SystemClock};
use crate::tracer::{attributes, AttributeValue, SpanRecorder, Tracer};

/// Records each [`QueryExecuted`] event as one span.
///
/// The span is named `"{driver} {database}"` and its start is moved back by
/// the query's elapsed time, so it covers the query rather than the moment
/// the event arrived.
///
/// # Example
///
/// ```rust
/// use sea_orm::DbBackend;
/// use sea_orm_query_watcher::{
///     ConnectionInfo, InMemoryTracer, QueryExecuted, QueryWatcher, RawBinding,
/// };
///
/// let watcher = QueryWatcher::new(InMemoryTracer::new());
/// let info = ConnectionInfo::for_backend(DbBackend::MySql, "app");
/// let bindings = [RawBinding::positional(0, 7)];
///
/// watcher
///     .record(&QueryExecuted::new("select * from t where id = ?", &bindings, 1.5, &info))
///     .unwrap();
///
/// let spans = watcher.tracer().finished();
/// assert_eq!(spans[0].name, "mysql app");
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryWatcher<T, K = SystemClock> {
    tracer: T,
    clock: K,
    config: WatcherConfig,
}

impl<T: Tracer> QueryWatcher<T, SystemClock> {
    /// Create a watcher reading the system clock, with default configuration.
    pub fn new(tracer: T) -> Self {
        Self::with_clock(tracer, SystemClock)
    }
}

impl<T: Tracer, K: Clock> QueryWatcher<T, K> {
    pub fn with_clock(tracer: T, clock: K) -> Self {
        Self {
            tracer,
            clock,
            config: WatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Record one executed query.
    ///
    /// The span is always closed. If a binding cannot be quoted, the span is
    /// marked as failed without a statement and the error is returned.
    pub fn record(&self, event: &QueryExecuted<'_>) -> Result<(), RecordError> {
        let connection = event.connection;
        let driver = connection.driver_name();
        let database = connection.database_name();

        let span = self.tracer.start(&span_name(connection));
        let statement = self.statement(event);
        let slow = self.config.is_slow(event.time_ms);

        if slow {
            tracing::warn!(
                db.system = driver,
                db.name = database,
                duration_ms = event.time_ms,
                threshold_ms = self.config.slow_query_threshold.as_millis() as i64,
                "Slow query detected"
            );
        }
        if !event.time_ms.is_finite() {
            tracing::debug!(
                db.system = driver,
                db.name = database,
                duration_ms = event.time_ms,
                "Elapsed time is not finite, span start not backdated"
            );
        }
        if let Err(e) = &statement {
            tracing::error!(
                db.system = driver,
                db.name = database,
                error = %e,
                "Failed to render query statement"
            );
        }

        self.tracer.stop(span, |span| {
            span.set_attribute(attributes::DB_SYSTEM, driver.into());
            span.set_attribute(attributes::DB_NAME, database.into());
            match &statement {
                Ok(sql) => {
                    if let Some(sql) = sql {
                        span.set_attribute(attributes::DB_STATEMENT, sql.as_str().into());
                    }
                    span.set_attribute(attributes::OTEL_STATUS_CODE, "OK".into());
                }
                Err(e) => {
                    span.set_attribute(attributes::OTEL_STATUS_CODE, "ERROR".into());
                    span.set_attribute(attributes::ERROR_MESSAGE, e.to_string().into());
                }
            }
            if let Some(host) = connection.config("host") {
                span.set_attribute(attributes::NET_PEER_NAME, host);
            }
            if let Some(port) = connection.config("port") {
                span.set_attribute(attributes::NET_PEER_PORT, port);
            }
            if self.config.record_duration {
                let duration = AttributeValue::Float(event.time_ms);
                span.set_attribute(attributes::DB_DURATION_MS, duration);
            }
            if slow {
                span.set_attribute(attributes::SLOW_QUERY, true.into());
            }

            span.set_start_time(timing::backdate(self.clock.now(), event.time_ms));
        });

        statement.map(|_| ())
    }

    fn statement(&self, event: &QueryExecuted<'_>) -> Result<Option<String>, RecordError> {
        if !self.config.record_statements {
            return Ok(None);
        }
        if !self.config.inline_bindings {
            return Ok(Some(event.sql.to_string()));
        }
        replace_bindings(event.sql, event.bindings, event.connection).map(Some)
    }
}

/// Span name for queries on `connection`.
pub fn span_name<C: QueryConnection + ?Sized>(connection: &C) -> String {
    format!("{} {}", connection.driver_name(), connection.database_name())
}

/// Normalize `bindings` through the connection and inline them into `sql`.
pub fn replace_bindings<C>(
    sql: &str,
    bindings: &[RawBinding],
    connection: &C,
) -> Result<String, RecordError>
where
    C: QueryConnection + ?Sized,
{
    let prepared = connection.prepare_bindings(bindings);
    substitute(sql, &prepared, connection)
}
