use anyhow::{Context, Result};
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::config::MongoConfig;
use crate::schema::CollectionKind;


/// A connected client plus the selected database.
///
/// Every operation receives the session explicitly; [`with_session`] owns the
/// connection lifecycle.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    database: Database,
}

impl Session {
    /// Connect and verify the server answers `ping`.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        info!("Connecting to MongoDB at {}", config.redacted_uri());

        let mut options = ClientOptions::parse(config.uri.as_str())
            .await
            .with_context(|| format!("Failed to parse MongoDB URI: {}", config.redacted_uri()))?;
        options.app_name = Some(config.app_name.clone());
        options.connect_timeout = Some(config.connect_timeout());
        options.server_selection_timeout = Some(config.server_selection_timeout());

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        let database = client.database(&config.database);
        let session = Self { client, database };

        session.ping().await?;
        debug!("Connected, using database {}", config.database);

        Ok(session)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    pub fn collection(&self, kind: CollectionKind) -> Collection<Document> {
        self.database.collection::<Document>(kind.name())
    }

    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB did not answer ping")?;
        Ok(())
    }

    /// Server version string reported by `buildInfo`
    pub async fn server_version(&self) -> Result<String> {
        let info = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
            .context("Failed to run buildInfo")?;
        Ok(info.get_str("version").unwrap_or("unknown").to_string())
    }

    pub async fn collection_names(&self) -> Result<Vec<String>> {
        self.database
            .list_collection_names()
            .await
            .context("Failed to list collections")
    }

    pub async fn has_collection(&self, kind: CollectionKind) -> Result<bool> {
        Ok(self
            .collection_names()
            .await?
            .iter()
            .any(|name| name == kind.name()))
    }

    /// Shut the client down, waiting for outstanding operations.
    pub async fn close(self) {
        debug!("Closing MongoDB session");
        self.client.shutdown().await;
    }
}

/// Connect, run `operation`, then close the session whether it succeeded or not.
pub async fn with_session<F, Fut, T>(config: &MongoConfig, operation: F) -> Result<T>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = Session::connect(config).await?;
    let result = operation(session.clone()).await;
    if let Err(e) = &result {
        warn!("Operation failed, closing session: {:#}", e);
    }
    session.close().await;
    result
}
