//! # sea-orm-query-watcher
//!
//! Records executed SeaORM queries as tracing spans, with the bound values
//! inlined into the statement and the span start moved back to when the
//! query actually began.
//!
//! ## Features
//!
//! - **Readable Statements**: `?`, `$n` and `:name` placeholders are replaced
//!   with quoted values, skipping anything inside existing string literals
//! - **Driver Quoting**: Strings are quoted with the backend's own escaping,
//!   with a display-only fallback for drivers that have none
//! - **Accurate Timing**: Span start is backdated by the query's elapsed time
//! - **Pluggable Backends**: Tracer and clock are injected, so spans can go to
//!   the `tracing` crate or be collected in memory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_query_watcher::WatchExt;
//!
//! let db = Database::connect("mysql://localhost/app").await?;
//! let watched = db.watched("app");
//!
//! let users = Users::find().all(&watched).await?;
//! ```
//!
//! ## Recording events directly
//!
//! ```rust
//! use sea_orm::DbBackend;
//! use sea_orm_query_watcher::prelude::*;
//!
//! let watcher = QueryWatcher::new(TracingTracer);
//! let info = ConnectionInfo::for_backend(DbBackend::MySql, "app");
//! let bindings = [RawBinding::positional(0, 7), RawBinding::named("n", "O'Brien")];
//!
//! watcher
//!     .record(&QueryExecuted::new(
//!         "select * from t where id = ? and name = :n",
//!         &bindings,
//!         3.2,
//!         &info,
//!     ))
//!     .unwrap();
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `db.system` | Driver name, e.g. "mysql" |
//! | `db.name` | Database name |
//! | `db.statement` | Statement with bindings inlined |
//! | `net.peer.name` | Server host (when configured) |
//! | `net.peer.port` | Server port (when configured) |
//! | `db.duration_ms` | Elapsed time in milliseconds |
//! | `slow_query` | Set when over the slow query threshold |
//! | `otel.status_code` | "OK" or "ERROR" |
//! | `error.message` | Why the statement could not be rendered |

mod binding;
mod config;
mod connection;
mod driver;
mod error;
mod event;
mod render;
mod statement;
mod timing;
mod tracer;
mod watcher;

pub use binding::{prepare_bindings, Binding, BindingKey, BindingValue, RawBinding};
pub use config::WatcherConfig;
pub use connection::{TracedConnection, WatchExt};
pub use driver::{db_system, ConnectionInfo, QueryConnection, Quoted};
pub use error::RecordError;
pub use event::QueryExecuted;
pub use render::{fallback_quote, quote_string, render};
pub use statement::{substitute, SqlDialect};
pub use timing::{backdate, Clock, FixedClock, Moment, SystemClock, MSEC_TO_NSEC};
pub use tracer::{
    attributes, AttributeValue, FinishedSpan, InMemoryTracer, SpanRecorder, Tracer, TracingSpan,
    TracingTracer,
};
pub use watcher::{replace_bindings, span_name, QueryWatcher};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ConnectionInfo, QueryExecuted, QueryWatcher, RawBinding, TracedConnection, TracingTracer,
        WatchExt, WatcherConfig,
    };
}
