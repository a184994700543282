mod mongo;

pub use mongo::MongoDriver;

use axum::async_trait;
use models::visitor_log::VisitorLog;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

pub const DATABASE_NAME: &str = "redirection-logs";
pub const VISITOR_LOG_COLLECTION: &str = "visitor_logs";

#[derive(Debug, Clone, thiserror::Error)]
pub enum DatabaseError {
    #[error("MONGODB_URI is not defined")]
    ConfigurationMissing,
    #[error("database connection unavailable: {0}")]
    ConnectionUnavailable(String),
    #[error("database operation failed: {0}")]
    Persistence(String),
}

/// Append-only access to the visitor log collection.
#[async_trait]
pub trait VisitorLogStore: Send + Sync {
    async fn insert(&self, log: &VisitorLog) -> Result<(), DatabaseError>;

    /// Most recent logs first, at most `limit` of them.
    async fn recent(&self, limit: i64) -> Result<Vec<VisitorLog>, DatabaseError>;

    async fn close(&self);
}

pub type DatabaseHandle = Arc<dyn VisitorLogStore>;

#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<DatabaseHandle, DatabaseError>;
}

/// Owns the single process wide database handle.
///
/// The first call to [`DatabaseConnector::connect`] decides the outcome for the
/// lifetime of the process: a failed attempt is not retried until restart.
pub struct DatabaseConnector {
    uri: Option<String>,
    driver: Box<dyn Driver>,
    handle: OnceCell<Result<DatabaseHandle, DatabaseError>>,
}

impl DatabaseConnector {
    pub fn new(uri: Option<String>, driver: impl Driver + 'static) -> Self {
        Self {
            uri,
            driver: Box::new(driver),
            handle: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }

    pub async fn connect(&self) -> Result<DatabaseHandle, DatabaseError> {
        self.handle
            .get_or_init(|| async {
                let Some(uri) = self.uri.as_deref() else {
                    return Err(DatabaseError::ConfigurationMissing);
                };

                match self.driver.connect(uri).await {
                    Ok(handle) => {
                        info!("MongoDB connected (new connection established)");
                        Ok(handle)
                    }
                    Err(err) => {
                        error!("Failed to connect to MongoDB: {err}");
                        Err(err)
                    }
                }
            })
            .await
            .clone()
    }

    pub async fn close(&self) {
        if let Some(Ok(handle)) = self.handle.get() {
            handle.close().await;
            info!("MongoDB connection closed");
        }
    }
}

impl fmt::Debug for DatabaseConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnector")
            .field("configured", &self.is_configured())
            .field("connected", &matches!(self.handle.get(), Some(Ok(_))))
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::memory::{MemoryDriver, MemoryStore, UnreachableDriver};
    use super::*;
    use std::sync::atomic::Ordering;

    const URI: &str = "mongodb://localhost:27017";

    #[tokio::test]
    async fn test_connect_returns_the_same_handle() {
        let driver = MemoryDriver::new(MemoryStore::default());
        let connector = DatabaseConnector::new(Some(URI.to_string()), driver.clone());

        let first = connector.connect().await.unwrap();
        let second = connector.connect().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.attempts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let driver = MemoryDriver::new(MemoryStore::default());
        let connector = Arc::new(DatabaseConnector::new(
            Some(URI.to_string()),
            driver.clone(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let connector = connector.clone();
                tokio::spawn(async move { connector.connect().await.is_ok() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(driver.attempts(), 1);
    }

    #[tokio::test]
    async fn test_missing_uri_is_configuration_missing() {
        let driver = MemoryDriver::new(MemoryStore::default());
        let connector = DatabaseConnector::new(None, driver.clone());

        assert!(!connector.is_configured());
        assert!(matches!(
            connector.connect().await,
            Err(DatabaseError::ConfigurationMissing)
        ));
        assert_eq!(driver.attempts(), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_retried() {
        let driver = UnreachableDriver::default();
        let connector = DatabaseConnector::new(Some(URI.to_string()), driver.clone());

        for _ in 0..3 {
            assert!(matches!(
                connector.connect().await,
                Err(DatabaseError::ConnectionUnavailable(_))
            ));
        }
        assert_eq!(driver.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_without_connection_is_a_noop() {
        let connector = DatabaseConnector::new(None, UnreachableDriver::default());
        connector.close().await;
        assert!(format!("{connector:?}").contains("connected: false"));
    }
}
