//! Ledger connection configuration.

/// Default on-disk location, relative to the working directory.
pub const DEFAULT_DB_URL: &str = "surrealkv://.gitdojo/db";

/// Where and how to connect the session ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// SurrealDB endpoint (`mem://`, `surrealkv://<path>`, …)
    pub url: String,
    /// Namespace (default: "gitdojo")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DB_URL)
    }
}

impl LedgerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "gitdojo".to_string(),
            database: "main".to_string(),
        }
    }

    /// Volatile in-memory database.
    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - GITDOJO_DB_URL (optional, default: `surrealkv://.gitdojo/db`)
    /// - GITDOJO_DB_NAMESPACE (optional, default: "gitdojo")
    /// - GITDOJO_DB_DATABASE (optional, default: "main")
    pub fn from_env() -> Self {
        let url = std::env::var("GITDOJO_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());
        let namespace =
            std::env::var("GITDOJO_DB_NAMESPACE").unwrap_or_else(|_| "gitdojo".to_string());
        let database = std::env::var("GITDOJO_DB_DATABASE").unwrap_or_else(|_| "main".to_string());
        Self {
            url,
            namespace,
            database,
        }
    }

    /// Local directory the URL points at, for file-backed engines.
    pub fn local_path(&self) -> Option<&str> {
        ["surrealkv://", "rocksdb://", "file://"]
            .iter()
            .find_map(|scheme| self.url.strip_prefix(scheme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_surrealkv() {
        let config = LedgerConfig::default();
        assert_eq!(config.local_path(), Some(".gitdojo/db"));
        assert_eq!(config.namespace, "gitdojo");
    }

    #[test]
    fn in_memory_has_no_local_path() {
        assert_eq!(LedgerConfig::in_memory().local_path(), None);
    }

    #[test]
    fn builders_override_names() {
        let config = LedgerConfig::in_memory()
            .with_namespace("test")
            .with_database("scratch");
        assert_eq!(config.namespace, "test");
        assert_eq!(config.database, "scratch");
    }
}
