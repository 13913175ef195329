//! SurrealDB schema initialization
//!
//! Safe to run on every connection: definitions are idempotent.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::Result;

/// Initialize all gitdojo tables.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing gitdojo SurrealDB schema");
    init_session_records_table(db).await?;
    Ok(())
}

/// Initialize `session_records`
///
/// Schema:
/// ```text
/// TABLE session_records {
///   session_id:        STRING (unique)
///   player:            STRING (indexed)
///   stages:            ARRAY<OBJECT>
///   score:             FLOAT
///   total_stage_count: INT
///   recorded_at:       DATETIME (indexed)
/// }
/// ```
///
/// Records are append-only: updates and deletes are not permitted.
async fn init_session_records_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing session_records table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS session_records AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_session_id ON TABLE session_records COLUMNS session_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_player ON TABLE session_records COLUMNS player;
        DEFINE INDEX IF NOT EXISTS idx_recorded_at ON TABLE session_records COLUMNS recorded_at;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
    info!("session_records table initialized");
    Ok(())
}
