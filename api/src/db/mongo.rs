use super::{
    DATABASE_NAME, DatabaseError, DatabaseHandle, Driver, VISITOR_LOG_COLLECTION, VisitorLogStore,
};
use axum::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use models::visitor_log::{DIRECT_REFERER, Location, VisitorLog};
use mongodb::bson::{self, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Visitor log as stored in MongoDB. The timestamp is a native BSON date so
/// sorting on it is chronological.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLogDocument {
    ip: Option<String>,
    timestamp: bson::DateTime,
    user_agent: String,
    #[serde(default = "default_referer")]
    referer: String,
    location: Location,
    redirect_url: String,
}

fn default_referer() -> String {
    DIRECT_REFERER.to_string()
}

impl From<&VisitorLog> for VisitorLogDocument {
    fn from(log: &VisitorLog) -> Self {
        Self {
            ip: log.ip.clone(),
            timestamp: bson::DateTime::from_millis(log.timestamp.timestamp_millis()),
            user_agent: log.user_agent.clone(),
            referer: log.referer.clone(),
            location: log.location,
            redirect_url: log.redirect_url.clone(),
        }
    }
}

impl From<VisitorLogDocument> for VisitorLog {
    fn from(document: VisitorLogDocument) -> Self {
        Self {
            ip: document.ip,
            timestamp: DateTime::<Utc>::from_timestamp_millis(document.timestamp.timestamp_millis())
                .unwrap_or_default(),
            user_agent: document.user_agent,
            referer: document.referer,
            location: document.location,
            redirect_url: document.redirect_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoDriver {
    timeout: Duration,
}

impl MongoDriver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn open(&self, uri: &str) -> Result<DatabaseHandle, DatabaseError> {
        let unavailable =
            |err: mongodb::error::Error| DatabaseError::ConnectionUnavailable(err.to_string());

        // Parsing resolves SRV and TXT records for mongodb+srv URIs.
        let mut options = ClientOptions::parse(uri).await.map_err(unavailable)?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);

        let client = Client::with_options(options).map_err(unavailable)?;
        let database = client.database(DATABASE_NAME);

        // The driver connects lazily, ping so an unreachable server fails here.
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;

        let handle: DatabaseHandle = Arc::new(MongoDatabase {
            client,
            database,
            timeout: self.timeout,
        });
        Ok(handle)
    }
}

#[async_trait]
impl Driver for MongoDriver {
    async fn connect(&self, uri: &str) -> Result<DatabaseHandle, DatabaseError> {
        timeout(self.timeout, self.open(uri)).await.map_err(|_| {
            DatabaseError::ConnectionUnavailable(format!(
                "connect timed out after {}s",
                self.timeout.as_secs_f64()
            ))
        })?
    }
}

pub struct MongoDatabase {
    client: Client,
    database: Database,
    timeout: Duration,
}

impl MongoDatabase {
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection(&self) -> Collection<VisitorLogDocument> {
        self.database().collection(VISITOR_LOG_COLLECTION)
    }

    fn timed_out(&self, operation: &str) -> DatabaseError {
        DatabaseError::Persistence(format!(
            "{operation} timed out after {}s",
            self.timeout.as_secs()
        ))
    }
}

#[async_trait]
impl VisitorLogStore for MongoDatabase {
    async fn insert(&self, log: &VisitorLog) -> Result<(), DatabaseError> {
        let result = timeout(
            self.timeout,
            self.collection().insert_one(VisitorLogDocument::from(log)),
        )
        .await
        .map_err(|_| self.timed_out("insert"))?
        .map_err(|err| DatabaseError::Persistence(err.to_string()))?;

        debug!("Inserted visitor log {}", result.inserted_id);
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<VisitorLog>, DatabaseError> {
        let query = async {
            let cursor = self
                .collection()
                .find(doc! {})
                .sort(doc! { "timestamp": -1 })
                .limit(limit)
                .await?;
            let documents: Vec<VisitorLogDocument> = cursor.try_collect().await?;
            Ok::<_, mongodb::error::Error>(documents)
        };

        let documents = timeout(self.timeout, query)
            .await
            .map_err(|_| self.timed_out("find"))?
            .map_err(|err| DatabaseError::Persistence(err.to_string()))?;

        Ok(documents.into_iter().map(VisitorLog::from).collect())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
