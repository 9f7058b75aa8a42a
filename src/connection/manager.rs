//! Connection manager for the session's database lifecycle.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::db::DatabaseClient;
use crate::error::Result;

/// An active database connection with its metadata.
pub struct ActiveConnection {
    /// Settings the connection was opened with.
    pub config: ConnectionConfig,
    /// Database client, shared with the shutdown watcher.
    pub db: Arc<dyn DatabaseClient>,
    /// Version reported by the server's version probe.
    pub server_version: String,
}

/// Owns the session connection for the lifetime of the process.
#[derive(Default)]
pub struct ConnectionManager {
    active: Option<ActiveConnection>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to a database using the given configuration.
    pub async fn connect(&mut self, config: ConnectionConfig) -> Result<()> {
        info!("Connecting to {}", config.display_string());
        let db: Arc<dyn DatabaseClient> = Arc::from(crate::db::connect(&config).await?);
        self.attach(db, config).await
    }

    /// Adopts an already-open client and probes its server version.
    ///
    /// The client is closed again if the probe fails.
    pub async fn attach(&mut self, db: Arc<dyn DatabaseClient>, config: ConnectionConfig) -> Result<()> {
        let server_version = match db.server_version().await {
            Ok(version) => version,
            Err(e) => {
                let _ = db.close().await;
                return Err(e);
            }
        };
        info!("Server version: {}", server_version);

        if let Some(old) = self.active.take() {
            if let Err(e) = old.db.close().await {
                warn!("Failed to close previous connection: {}", e);
            }
        }

        self.active = Some(ActiveConnection {
            config,
            db,
            server_version,
        });

        Ok(())
    }

    /// Get a shared handle to the active database client.
    pub fn shared(&self) -> Option<Arc<dyn DatabaseClient>> {
        self.active.as_ref().map(|c| Arc::clone(&c.db))
    }

    /// Line printed once the session is connected.
    pub fn banner(&self) -> Option<String> {
        self.active.as_ref().map(|c| {
            format!(
                "Connected to {} database '{}' (server {})!",
                c.db.backend(),
                c.config.database.as_deref().unwrap_or_default(),
                c.server_version
            )
        })
    }

    /// Close the active connection.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.active.take() {
            conn.db.close().await?;
        }
        Ok(())
    }
}
