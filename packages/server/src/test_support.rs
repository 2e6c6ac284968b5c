use sea_orm::DatabaseConnection;

use crate::config::DatabaseConfig;
use crate::database::init_db;

/// Fresh schema in a private in-memory SQLite database.
pub async fn memory_db() -> DatabaseConnection {
    init_db(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    })
    .await
    .expect("Failed to initialize in-memory database")
}
