use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REDIRECT_URL: &str = "https://www.google.com";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    /// Where every visitor ends up.
    pub redirect_url: String,
    /// MongoDB connection string. Without it visits are only logged to the console.
    pub mongodb_uri: Option<String>,
    pub landing_page_path: PathBuf,
    /// Upper bound for connecting to and querying the database.
    pub database_timeout: Duration,
    pub sentry_url: Option<String>,
}

impl Config {
    pub fn new() -> anyhow::Result<Config> {
        _ = dotenvy::dotenv();

        Ok(Config {
            port: match env::var("PORT") {
                Ok(port) => port
                    .parse()
                    .with_context(|| format!("PORT must be a valid port number, got {port:?}"))?,
                Err(_) => DEFAULT_PORT,
            },
            redirect_url: env::var("REDIRECT_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string()),
            mongodb_uri: env::var("MONGODB_URI")
                .ok()
                .filter(|uri| !uri.trim().is_empty()),
            landing_page_path: env::var("LANDING_PAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/public/index.html"))
                }),
            database_timeout: match env::var("DATABASE_TIMEOUT_SECS") {
                Ok(secs) => Duration::from_secs(
                    secs.parse()
                        .context("DATABASE_TIMEOUT_SECS must be a whole number of seconds.")?,
                ),
                Err(_) => Duration::from_secs(DEFAULT_DATABASE_TIMEOUT_SECS),
            },
            sentry_url: env::var("SENTRY_URL").ok(),
        })
    }
}
