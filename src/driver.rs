//! Connection metadata and native quoting.

use sea_orm::sea_query::{MysqlQueryBuilder, PostgresQueryBuilder, QueryBuilder, SqliteQueryBuilder};
use sea_orm::{DbBackend, DbErr, Value};

use crate::binding::{self, Binding, RawBinding};
use crate::statement::SqlDialect;
use crate::tracer::AttributeValue;

/// Outcome of asking a driver to quote a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quoted {
    /// The driver produced a complete literal, delimiters included.
    Native(String),
    /// The driver has no quoting facility; the caller must escape on its own.
    Unsupported,
}

/// What the watcher needs to know about the connection a query ran on.
pub trait QueryConnection {
    /// Driver name, recorded as `db.system`.
    fn driver_name(&self) -> &str;

    /// Database name, recorded as `db.name`.
    fn database_name(&self) -> &str;

    /// Look up a connection setting such as `host` or `port`.
    fn config(&self, _key: &str) -> Option<AttributeValue> {
        None
    }

    /// Placeholder and literal conventions of the driver.
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Generic
    }

    /// Normalize raw bindings for rendering.
    fn prepare_bindings(&self, bindings: &[RawBinding]) -> Vec<Binding> {
        binding::prepare_bindings(bindings)
    }

    /// Quote a string with the driver's own escaping rules.
    fn quote(&self, _raw: &str) -> Result<Quoted, DbErr> {
        Ok(Quoted::Unsupported)
    }
}

/// Connection metadata for a SeaORM backend or any other named driver.
///
/// # Example
///
/// ```rust
/// use sea_orm::DbBackend;
/// use sea_orm_query_watcher::ConnectionInfo;
///
/// let info = ConnectionInfo::for_backend(DbBackend::MySql, "app")
///     .with_host("db.internal")
///     .with_port(3306);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    driver: String,
    backend: Option<DbBackend>,
    database: String,
    host: Option<String>,
    port: Option<u16>,
}

impl ConnectionInfo {
    /// Metadata for a driver SeaORM has no backend for. Strings are quoted
    /// with the built-in fallback escaper.
    pub fn new(driver: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            backend: None,
            database: database.into(),
            host: None,
            port: None,
        }
    }

    /// Metadata for one of SeaORM's backends, quoting through sea-query.
    pub fn for_backend(backend: DbBackend, database: impl Into<String>) -> Self {
        Self {
            driver: db_system(backend).to_string(),
            backend: Some(backend),
            database: database.into(),
            host: None,
            port: None,
        }
    }

    /// Set the server host, recorded as `net.peer.name`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server port, recorded as `net.peer.port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn backend(&self) -> Option<DbBackend> {
        self.backend
    }
}

/// OpenTelemetry `db.system` name for a backend.
pub fn db_system(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => "postgresql",
        DbBackend::MySql => "mysql",
        DbBackend::Sqlite => "sqlite",
    }
}

impl QueryConnection for ConnectionInfo {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn config(&self, key: &str) -> Option<AttributeValue> {
        match key {
            "host" => self.host.clone().map(AttributeValue::from),
            "port" => self.port.map(|port| AttributeValue::Int(i64::from(port))),
            "database" => Some(AttributeValue::from(self.database.clone())),
            "driver" => Some(AttributeValue::from(self.driver.clone())),
            _ => None,
        }
    }

    fn dialect(&self) -> SqlDialect {
        self.backend.map(SqlDialect::from).unwrap_or(SqlDialect::Generic)
    }

    fn quote(&self, raw: &str) -> Result<Quoted, DbErr> {
        let Some(backend) = self.backend else {
            return Ok(Quoted::Unsupported);
        };
        let value = Value::from(raw);
        let literal = match backend {
            DbBackend::MySql => MysqlQueryBuilder.value_to_string(&value),
            DbBackend::Postgres => {
                // text columns cannot hold NUL
                if raw.contains('\0') {
                    return Err(DbErr::Type(
                        "invalid byte sequence for encoding \"UTF8\": 0x00".to_string(),
                    ));
                }
                PostgresQueryBuilder.value_to_string(&value)
            }
            DbBackend::Sqlite => SqliteQueryBuilder.value_to_string(&value),
        };
        Ok(Quoted::Native(literal))
    }
}
