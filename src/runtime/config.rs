//! Environment-driven runtime configuration.

/// Connection settings resolved once at composition time.
///
/// `Default` reads the process environment (after loading a `.env` file when
/// present): `QUARREL_BROKER_URL` for the durable event broker and
/// `QUARREL_SQLITE_DB` for the database file name, falling back to
/// `quarrel.db`.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub broker_url: Option<String>,
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            broker_url: std::env::var("QUARREL_BROKER_URL").ok(),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn new(broker_url: Option<String>, sqlite_db_name: Option<String>) -> Self {
        Self {
            broker_url,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }

    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("QUARREL_SQLITE_DB").unwrap_or_else(|_| "quarrel.db".to_string()))
    }

    /// Database URL for the SQLite store, from the resolved db name.
    #[must_use]
    pub fn sqlite_database_url(&self) -> String {
        let name = self.sqlite_db_name.as_deref().unwrap_or("quarrel.db");
        format!("sqlite://{name}")
    }
}
