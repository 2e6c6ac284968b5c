use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::{buff_event, cast_event, damage_event, death_event, heal_event};

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    // An in-memory SQLite database lives only as long as its connection.
    if !config.url.starts_with("sqlite:") {
        opt.idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8));
    }

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Event listings: WHERE fight_id = ? ORDER BY timestamp, sequence
    let indexes = [
        (
            "idx_cast_event_fight_ts",
            Index::create()
                .table(cast_event::Entity)
                .col(cast_event::Column::FightId)
                .col(cast_event::Column::Timestamp)
                .col(cast_event::Column::Sequence)
                .to_owned(),
        ),
        (
            "idx_buff_event_fight_ts",
            Index::create()
                .table(buff_event::Entity)
                .col(buff_event::Column::FightId)
                .col(buff_event::Column::Timestamp)
                .col(buff_event::Column::Sequence)
                .to_owned(),
        ),
        (
            "idx_damage_event_fight_ts",
            Index::create()
                .table(damage_event::Entity)
                .col(damage_event::Column::FightId)
                .col(damage_event::Column::Timestamp)
                .col(damage_event::Column::Sequence)
                .to_owned(),
        ),
        (
            "idx_heal_event_fight_ts",
            Index::create()
                .table(heal_event::Entity)
                .col(heal_event::Column::FightId)
                .col(heal_event::Column::Timestamp)
                .col(heal_event::Column::Sequence)
                .to_owned(),
        ),
        (
            "idx_death_event_fight_ts",
            Index::create()
                .table(death_event::Entity)
                .col(death_event::Column::FightId)
                .col(death_event::Column::Timestamp)
                .col(death_event::Column::Sequence)
                .to_owned(),
        ),
    ];

    let backend = db.get_database_backend();
    for (name, mut index) in indexes {
        index.if_not_exists().name(name);
        let stmt = index_sql(backend, &index);
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}

fn index_sql(backend: DatabaseBackend, index: &IndexCreateStatement) -> String {
    match backend {
        DatabaseBackend::Sqlite => index.to_string(SqliteQueryBuilder),
        _ => index.to_string(PostgresQueryBuilder),
    }
}
