//! Span backends the watcher writes to.

use std::sync::{Mutex, PoisonError};

use tracing::field;

use crate::timing::Moment;

/// Attribute keys following OpenTelemetry semantic conventions.
pub mod attributes {
    pub const DB_SYSTEM: &str = "db.system";
    pub const DB_NAME: &str = "db.name";
    pub const DB_STATEMENT: &str = "db.statement";
    pub const DB_DURATION_MS: &str = "db.duration_ms";
    pub const NET_PEER_NAME: &str = "net.peer.name";
    pub const NET_PEER_PORT: &str = "net.peer.port";
    pub const OTEL_STATUS_CODE: &str = "otel.status_code";
    pub const ERROR_MESSAGE: &str = "error.message";
    pub const SLOW_QUERY: &str = "slow_query";
}

/// A span attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Mutations the watcher applies to a span before it is closed.
pub trait SpanRecorder {
    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    /// Override when the span started.
    fn set_start_time(&mut self, start: Moment);
}

/// Opens and closes spans.
pub trait Tracer {
    type Span: SpanRecorder;

    fn start(&self, name: &str) -> Self::Span;

    /// Run `finalize` on the span, then close it.
    fn stop<F>(&self, span: Self::Span, finalize: F)
    where
        F: FnOnce(&mut Self::Span);
}

/// Emits spans through the `tracing` crate.
///
/// Spans are named `db.query`, with `otel.name` carrying the watcher's span
/// name. `tracing` spans cannot be moved back in time, so the computed start
/// is recorded in `span.start_epoch_ns` and `span.start_monotonic_ns`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

/// A live `tracing` span.
#[derive(Debug)]
pub struct TracingSpan {
    span: tracing::Span,
}

impl TracingSpan {
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl SpanRecorder for TracingSpan {
    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        match value {
            AttributeValue::Str(s) => self.span.record(key, s.as_str()),
            AttributeValue::Int(n) => self.span.record(key, n),
            AttributeValue::Float(f) => self.span.record(key, f),
            AttributeValue::Bool(b) => self.span.record(key, b),
        };
    }

    fn set_start_time(&mut self, start: Moment) {
        self.span.record("span.start_epoch_ns", start.epoch_nanos);
        self.span.record("span.start_monotonic_ns", start.monotonic_nanos);
    }
}

impl Tracer for TracingTracer {
    type Span = TracingSpan;

    fn start(&self, name: &str) -> TracingSpan {
        let span = tracing::info_span!(
            "db.query",
            otel.name = %name,
            otel.kind = "client",
            db.system = field::Empty,
            db.name = field::Empty,
            db.statement = field::Empty,
            db.duration_ms = field::Empty,
            net.peer.name = field::Empty,
            net.peer.port = field::Empty,
            span.start_epoch_ns = field::Empty,
            span.start_monotonic_ns = field::Empty,
            otel.status_code = field::Empty,
            error.message = field::Empty,
            slow_query = field::Empty,
        );
        TracingSpan { span }
    }

    fn stop<F>(&self, mut span: TracingSpan, finalize: F)
    where
        F: FnOnce(&mut TracingSpan),
    {
        finalize(&mut span);
    }
}

/// A span collected by [`InMemoryTracer`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    pub name: String,
    pub attributes: Vec<(String, AttributeValue)>,
    pub start: Option<Moment>,
}

impl FinishedSpan {
    /// Last value written for `key`.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl SpanRecorder for FinishedSpan {
    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.attributes.push((key.to_string(), value));
    }

    fn set_start_time(&mut self, start: Moment) {
        self.start = Some(start);
    }
}

/// Keeps closed spans in memory, for tests.
#[derive(Debug, Default)]
pub struct InMemoryTracer {
    finished: Mutex<Vec<FinishedSpan>>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans closed so far, oldest first.
    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Tracer for InMemoryTracer {
    type Span = FinishedSpan;

    fn start(&self, name: &str) -> FinishedSpan {
        FinishedSpan {
            name: name.to_string(),
            attributes: Vec::new(),
            start: None,
        }
    }

    fn stop<F>(&self, mut span: FinishedSpan, finalize: F)
    where
        F: FnOnce(&mut FinishedSpan),
    {
        finalize(&mut span);
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}
