use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::note;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("notes_server::entity::*")
        .sync(&db)
        .await?;

    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure the lookup indexes on `note` exist.
///
/// Schema sync doesn't create composite non-unique indexes, so they are
/// created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Filtered listing: WHERE subject = ? AND semester = ?
    let subject_semester = Index::create()
        .if_not_exists()
        .name("idx_note_subject_semester")
        .table(note::Entity)
        .col(note::Column::Subject)
        .col(note::Column::Semester)
        .to_owned();
    create_index(db, "idx_note_subject_semester", &subject_semester).await;

    // Per-user lookups: WHERE uploaded_by = ?
    let uploaded_by = Index::create()
        .if_not_exists()
        .name("idx_note_uploaded_by")
        .table(note::Entity)
        .col(note::Column::UploadedBy)
        .to_owned();
    create_index(db, "idx_note_uploaded_by", &uploaded_by).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &IndexCreateStatement) {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };

    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {name} exists"),
        Err(e) => warn!("Failed to create index {name}: {e}"),
    }
}
