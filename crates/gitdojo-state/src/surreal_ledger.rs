//! SurrealDB-backed SessionLedger implementation
//!
//! Uses a private row type for persistence, converting to/from
//! `storage_traits::SessionRecord` at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::storage_traits::{SessionLedger, SessionRecord, StageMetrics, StorageResult};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbSessionRecord {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    session_id: String,
    player: String,
    stages: Vec<StageMetrics>,
    score: f64,
    total_stage_count: u32,
    #[serde(with = "surreal_datetime")]
    recorded_at: DateTime<Utc>,
}

impl From<SessionRecord> for DbSessionRecord {
    fn from(r: SessionRecord) -> Self {
        Self {
            id: None,
            session_id: r.session_id,
            player: r.player,
            stages: r.stages,
            score: r.score,
            total_stage_count: r.total_stage_count,
            recorded_at: r.recorded_at,
        }
    }
}

impl From<DbSessionRecord> for SessionRecord {
    fn from(row: DbSessionRecord) -> Self {
        Self {
            session_id: row.session_id,
            player: row.player,
            stages: row.stages,
            score: row.score,
            total_stage_count: row.total_stage_count,
            recorded_at: row.recorded_at,
        }
    }
}

/// SurrealDB-backed implementation of [`SessionLedger`].
pub struct SurrealSessionLedger {
    db: Surreal<Any>,
}

impl SurrealSessionLedger {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&LedgerConfig::in_memory()).await
    }

    /// Create from environment variables (see [`LedgerConfig::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::connect(&LedgerConfig::from_env()).await
    }

    /// Connect to the configured endpoint, select the namespace/database and
    /// run schema initialization.
    pub async fn connect(config: &LedgerConfig) -> crate::Result<Self> {
        if let Some(path) = config.local_path() {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!(url = %config.url, "SurrealSessionLedger connected");
        Ok(Self { db })
    }

    async fn fetch_rows(&self, sql: &'static str, player: Option<&str>) -> StorageResult<Vec<DbSessionRecord>> {
        let mut query = self.db.query(sql);
        if let Some(player) = player {
            query = query.bind(("player", player.to_string()));
        }
        let mut res = query
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        res.take(0).map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn session_exists(&self, session_id: &str) -> StorageResult<bool> {
        let sid_owned = session_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM session_records WHERE session_id = $sid")
            .bind(("sid", sid_owned))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<DbSessionRecord> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl SessionLedger for SurrealSessionLedger {
    async fn append(&self, record: SessionRecord) -> StorageResult<()> {
        record.check()?;
        if self.session_exists(&record.session_id).await? {
            return Err(StorageError::DuplicateSession {
                session_id: record.session_id,
            });
        }

        debug!(session_id = %record.session_id, player = %record.player, "appending session record");

        let _created: Option<DbSessionRecord> = self
            .db
            .create("session_records")
            .content(DbSessionRecord::from(record))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SessionRecord>> {
        let rows = self
            .fetch_rows("SELECT * FROM session_records ORDER BY recorded_at ASC", None)
            .await?;
        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }

    async fn list_for_player(&self, player: &str) -> StorageResult<Vec<SessionRecord>> {
        let rows = self
            .fetch_rows(
                "SELECT * FROM session_records WHERE player = $player ORDER BY recorded_at ASC",
                Some(player),
            )
            .await?;
        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }
}
