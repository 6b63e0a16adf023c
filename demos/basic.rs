//! Basic example showing how to use sea-orm-query-watcher.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, Statement};
use sea_orm_query_watcher::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_query_watcher=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Connect to database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url).await?;

    // Option 1: Watch with defaults
    // let watched = db.watched("test");

    // Option 2: Custom connection metadata and configuration
    let info = ConnectionInfo::for_backend(db.get_database_backend(), "test")
        .with_host("localhost")
        .with_port(5432);
    let watcher = QueryWatcher::new(TracingTracer).with_config(WatcherConfig::development());
    let watched = db.with_watcher(info, Arc::new(watcher));

    // Recorded as `select 41::int + 1 as answer`
    let row = watched
        .query_one(Statement::from_sql_and_values(
            watched.get_database_backend(),
            "select $1::int + 1 as answer",
            [41i32.into()],
        ))
        .await?;

    tracing::info!(found = row.is_some(), "Query finished");

    Ok(())
}
