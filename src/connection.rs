//! Watched database connection wrapper.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, ExecResult, QueryResult, Statement,
};

use crate::binding::RawBinding;
use crate::driver::ConnectionInfo;
use crate::event::QueryExecuted;
use crate::timing::{Clock, SystemClock};
use crate::tracer::{Tracer, TracingTracer};
use crate::watcher::QueryWatcher;

/// A wrapper around SeaORM's `DatabaseConnection` that reports every
/// statement it runs to a [`QueryWatcher`].
///
/// It implements `ConnectionTrait`, so entities and queries can run against
/// it directly. Statements are recorded after they complete, whether they
/// succeeded or not. A statement that cannot be recorded is logged and
/// otherwise ignored; the query result is returned unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sea_orm_query_watcher::WatchExt;
///
/// let db = Database::connect("mysql://localhost/app").await?;
/// let watched = db.watched("app");
///
/// // Every query now produces a span with its bindings inlined
/// let users = Users::find().all(&watched).await?;
/// ```
pub struct TracedConnection<T = TracingTracer, K = SystemClock> {
    inner: Arc<DatabaseConnection>,
    info: Arc<ConnectionInfo>,
    watcher: Arc<QueryWatcher<T, K>>,
}

impl<T, K> TracedConnection<T, K>
where
    T: Tracer,
    K: Clock,
{
    pub fn new(
        connection: DatabaseConnection,
        info: ConnectionInfo,
        watcher: Arc<QueryWatcher<T, K>>,
    ) -> Self {
        Self {
            inner: Arc::new(connection),
            info: Arc::new(info),
            watcher,
        }
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn watcher(&self) -> &QueryWatcher<T, K> {
        &self.watcher
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    ///
    /// Fails, handing the wrapper back, while clones of it are still alive.
    pub fn into_inner(self) -> Result<DatabaseConnection, Self> {
        let Self {
            inner,
            info,
            watcher,
        } = self;
        Arc::try_unwrap(inner).map_err(|inner| Self {
            inner,
            info,
            watcher,
        })
    }

    fn observe(&self, sql: &str, bindings: &[RawBinding], start: Instant) {
        let time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let event = QueryExecuted::new(sql, bindings, time_ms, &*self.info);
        if let Err(e) = self.watcher.record(&event) {
            tracing::warn!(error = %e, "Could not record executed query");
        }
    }
}

impl TracedConnection {
    /// Watch a connection with the `tracing` backend and default configuration.
    pub fn wrap(connection: DatabaseConnection, database: impl Into<String>) -> Self {
        let info = ConnectionInfo::for_backend(connection.get_database_backend(), database);
        Self::new(connection, info, Arc::new(QueryWatcher::new(TracingTracer)))
    }
}

impl<T, K> Clone for TracedConnection<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            info: Arc::clone(&self.info),
            watcher: Arc::clone(&self.watcher),
        }
    }
}

impl<T, K> std::fmt::Debug for TracedConnection<T, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedConnection")
            .field("inner", &self.inner)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl<T, K> AsRef<DatabaseConnection> for TracedConnection<T, K> {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

fn statement_bindings(stmt: &Statement) -> Vec<RawBinding> {
    stmt.values
        .as_ref()
        .map(|values| RawBinding::from_values(values.0.iter().cloned()))
        .unwrap_or_default()
}

#[async_trait]
impl<T, K> ConnectionTrait for TracedConnection<T, K>
where
    T: Tracer + Send + Sync,
    K: Clock + Send + Sync,
{
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let sql = stmt.sql.clone();
        let bindings = statement_bindings(&stmt);
        let start = Instant::now();

        let result = self.inner.execute(stmt).await;

        self.observe(&sql, &bindings, start);
        result
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let start = Instant::now();

        let result = self.inner.execute_unprepared(sql).await;

        self.observe(sql, &[], start);
        result
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let sql = stmt.sql.clone();
        let bindings = statement_bindings(&stmt);
        let start = Instant::now();

        let result = self.inner.query_one(stmt).await;

        self.observe(&sql, &bindings, start);
        result
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let sql = stmt.sql.clone();
        let bindings = statement_bindings(&stmt);
        let start = Instant::now();

        let result = self.inner.query_all(stmt).await;

        self.observe(&sql, &bindings, start);
        result
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait WatchExt {
    /// Watch this connection with the `tracing` backend.
    fn watched(self, database: impl Into<String>) -> TracedConnection;

    /// Watch this connection with a custom watcher.
    fn with_watcher<T: Tracer, K: Clock>(
        self,
        info: ConnectionInfo,
        watcher: Arc<QueryWatcher<T, K>>,
    ) -> TracedConnection<T, K>;
}

impl WatchExt for DatabaseConnection {
    fn watched(self, database: impl Into<String>) -> TracedConnection {
        TracedConnection::wrap(self, database)
    }

    fn with_watcher<T: Tracer, K: Clock>(
        self,
        info: ConnectionInfo,
        watcher: Arc<QueryWatcher<T, K>>,
    ) -> TracedConnection<T, K> {
        TracedConnection::new(self, info, watcher)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    use super::*;
    use crate::timing::{FixedClock, Moment};
    use crate::tracer::{attributes, AttributeValue, InMemoryTracer};

    fn watcher() -> Arc<QueryWatcher<InMemoryTracer, FixedClock>> {
        Arc::new(QueryWatcher::with_clock(
            InMemoryTracer::new(),
            FixedClock(Moment::new(1_000_000_000, 1_000_000_000)),
        ))
    }

    #[tokio::test]
    async fn test_execute_records_inlined_statement() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let watcher = watcher();
        let info =
            ConnectionInfo::for_backend(DbBackend::MySql, "app").with_host("localhost");
        let traced = db.with_watcher(info, Arc::clone(&watcher));

        let result = traced
            .execute(Statement::from_sql_and_values(
                DbBackend::MySql,
                "update users set name = ? where id = ?",
                ["O'Brien".into(), 7i32.into()],
            ))
            .await
            .unwrap();
        assert_eq!(result.rows_affected(), 1);

        let spans = watcher.tracer().finished();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "mysql app");
        assert_eq!(
            spans[0].attribute(attributes::DB_STATEMENT),
            Some(&AttributeValue::Str(
                r"update users set name = 'O\'Brien' where id = 7".to_string()
            ))
        );
        assert_eq!(
            spans[0].attribute(attributes::NET_PEER_NAME),
            Some(&AttributeValue::Str("localhost".to_string()))
        );
        assert!(spans[0].start.is_some());
    }

    #[tokio::test]
    async fn test_failed_query_is_still_recorded() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let watcher = watcher();
        let traced = db.with_watcher(
            ConnectionInfo::for_backend(DbBackend::Postgres, "app"),
            Arc::clone(&watcher),
        );

        let result = traced
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "delete from t where id = $1",
                [3i64.into()],
            ))
            .await;
        assert!(result.is_err());

        let spans = watcher.tracer().finished();
        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].attribute(attributes::DB_STATEMENT),
            Some(&AttributeValue::Str("delete from t where id = 3".to_string()))
        );
    }

    fn row(id: i32) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("id", Value::from(id))])
    }

    fn statement_of(watcher: &QueryWatcher<InMemoryTracer, FixedClock>, index: usize) -> String {
        match watcher.tracer().finished()[index].attribute(attributes::DB_STATEMENT) {
            Some(AttributeValue::Str(sql)) => sql.clone(),
            other => panic!("unexpected db.statement: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_one_and_query_all_are_recorded() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![row(1)], vec![row(1), row(2)]])
            .into_connection();
        let watcher = watcher();
        let traced = db.with_watcher(
            ConnectionInfo::for_backend(DbBackend::Sqlite, "main"),
            Arc::clone(&watcher),
        );

        let one = traced
            .query_one(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "select id from t where name = ?",
                ["it's".into()],
            ))
            .await
            .unwrap();
        assert!(one.is_some());

        let all = traced
            .query_all(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "select id from t where id > ? and flag = ?",
                [0i32.into(), true.into()],
            ))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        assert_eq!(watcher.tracer().finished().len(), 2);
        assert_eq!(statement_of(&watcher, 0), "select id from t where name = 'it''s'");
        assert_eq!(
            statement_of(&watcher, 1),
            "select id from t where id > 0 and flag = 1"
        );
        assert_eq!(watcher.tracer().finished()[1].name, "sqlite main");
    }

    #[tokio::test]
    async fn test_execute_unprepared_is_recorded_verbatim() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let watcher = watcher();
        let traced = db.with_watcher(
            ConnectionInfo::for_backend(DbBackend::MySql, "app"),
            Arc::clone(&watcher),
        );

        traced
            .execute_unprepared("create table t (id int, note text default '?')")
            .await
            .unwrap();

        assert_eq!(
            statement_of(&watcher, 0),
            "create table t (id int, note text default '?')"
        );
    }

    #[test]
    fn test_clones_share_connection_and_watcher() {
        let db = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let watcher = watcher();
        let traced = db.with_watcher(
            ConnectionInfo::for_backend(DbBackend::MySql, "app"),
            Arc::clone(&watcher),
        );

        let clone = traced.clone();
        assert!(std::ptr::eq(traced.inner(), clone.inner()));
        assert!(std::ptr::eq(traced.watcher(), clone.watcher()));

        let traced = traced.into_inner().unwrap_err();
        drop(clone);
        assert!(traced.into_inner().is_ok());
    }

    #[test]
    fn test_wrap_uses_backend_driver() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let traced = db.watched("main");
        assert_eq!(traced.info().backend(), Some(DbBackend::Sqlite));
        assert!(traced.watcher().config().inline_bindings);
    }
}
