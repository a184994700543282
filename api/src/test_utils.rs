use crate::config::Config;
use crate::db::memory::UnreachableDriver;
use crate::db::{DatabaseConnector, Driver};
use crate::{State, app};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_MONGODB_URI: &str = "mongodb://localhost:27017";

/// Builds the full router around an in-process database driver.
pub struct TestApp {
    redirect_url: String,
    landing_page_path: PathBuf,
    database: Arc<DatabaseConnector>,
}

impl TestApp {
    /// No database configured, visits are only logged to the console.
    pub fn new(redirect_url: &str) -> Self {
        Self {
            redirect_url: redirect_url.to_string(),
            landing_page_path: PathBuf::from("/nonexistent/index.html"),
            database: Arc::new(DatabaseConnector::new(None, UnreachableDriver::default())),
        }
    }

    pub fn with_database(mut self, driver: impl Driver + 'static) -> Self {
        self.database = Arc::new(DatabaseConnector::new(
            Some(TEST_MONGODB_URI.to_string()),
            driver,
        ));
        self
    }

    pub fn with_landing_page(mut self, path: impl AsRef<Path>) -> Self {
        self.landing_page_path = path.as_ref().to_path_buf();
        self
    }

    pub fn router(&self) -> Router {
        let config: &'static Config = Box::leak(Box::new(Config {
            port: 0,
            redirect_url: self.redirect_url.clone(),
            mongodb_uri: None,
            landing_page_path: self.landing_page_path.clone(),
            database_timeout: Duration::from_secs(1),
            sentry_url: None,
        }));
        app(State::new(config, self.database.clone()))
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
