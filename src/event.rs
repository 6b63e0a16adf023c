//! The "query executed" notification.

use crate::binding::RawBinding;
use crate::driver::QueryConnection;

/// One completed query, as reported by whatever ran it.
#[derive(Clone, Copy)]
pub struct QueryExecuted<'a> {
    /// SQL template with `?`, `$n` or `:name` placeholders.
    pub sql: &'a str,
    pub bindings: &'a [RawBinding],
    /// Wall time the query took, in milliseconds.
    pub time_ms: f64,
    pub connection: &'a dyn QueryConnection,
}

impl<'a> QueryExecuted<'a> {
    pub fn new(
        sql: &'a str,
        bindings: &'a [RawBinding],
        time_ms: f64,
        connection: &'a dyn QueryConnection,
    ) -> Self {
        Self {
            sql,
            bindings,
            time_ms,
            connection,
        }
    }
}

impl std::fmt::Debug for QueryExecuted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecuted")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("time_ms", &self.time_ms)
            .field("driver", &self.connection.driver_name())
            .field("database", &self.connection.database_name())
            .finish()
    }
}
