pub mod routes;

use crate::db::{DatabaseConnector, DatabaseError};
use chrono::Utc;
use models::visitor_log::{
    Coordinates, DIRECT_REFERER, Location, UNKNOWN_USER_AGENT, VisitorLog,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// Geolocation reported by the landing page. Every field is optional and
/// anything that isn't a usable value is treated as missing.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, ToSchema)]
pub struct LocationInput {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub denied: Option<bool>,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|number| number.is_finite()))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        Value::String(text) => text.trim().parse::<bool>().ok(),
        _ => None,
    })
}

impl LocationInput {
    /// Parses a request body. Empty or malformed bodies carry no telemetry.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|err| {
            debug!("Ignoring malformed telemetry body: {err}");
            Self::default()
        })
    }

    pub fn resolve(&self) -> Location {
        if self.denied == Some(true) {
            return Location::Denied;
        }

        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude))
                if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) =>
            {
                Location::Coordinates(Coordinates {
                    latitude,
                    longitude,
                    accuracy: self.accuracy.filter(|accuracy| *accuracy >= 0.0),
                })
            }
            _ => Location::NotAvailable,
        }
    }
}

/// Request metadata identifying who visited.
#[derive(Debug, Default, Clone)]
pub struct Visitor {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

#[derive(Debug)]
#[must_use]
pub enum WriteOutcome {
    Stored,
    ConsoleOnly(DatabaseError),
}

#[derive(Debug, Clone)]
pub struct LogWriter {
    database: Arc<DatabaseConnector>,
}

impl LogWriter {
    pub fn new(database: Arc<DatabaseConnector>) -> Self {
        Self { database }
    }

    /// Records a visit. Persistence is best effort: the returned outcome says
    /// whether the log reached the database, failures never surface as errors.
    pub async fn write(
        &self,
        visitor: Visitor,
        input: &LocationInput,
        redirect_url: &str,
    ) -> WriteOutcome {
        let log = VisitorLog {
            ip: visitor.ip,
            timestamp: Utc::now(),
            user_agent: visitor
                .user_agent
                .unwrap_or_else(|| UNKNOWN_USER_AGENT.to_string()),
            referer: visitor
                .referer
                .unwrap_or_else(|| DIRECT_REFERER.to_string()),
            location: input.resolve(),
            redirect_url: redirect_url.to_string(),
        };

        info!(
            "Visitor {} | User-Agent: {} | Referer: {} | Location: {} | Redirect: {}",
            log.ip.as_deref().unwrap_or("unknown"),
            log.user_agent,
            log.referer,
            log.location,
            log.redirect_url
        );

        match self.persist(&log).await {
            Ok(()) => {
                metrics::increment_counter!("visitor_logs_total", "outcome" => "stored");
                WriteOutcome::Stored
            }
            Err(err) => {
                warn!("Visitor log kept on console only: {err}");
                metrics::increment_counter!("visitor_logs_total", "outcome" => "console_only");
                WriteOutcome::ConsoleOnly(err)
            }
        }
    }

    async fn persist(&self, log: &VisitorLog) -> Result<(), DatabaseError> {
        self.database.connect().await?.insert(log).await
    }
}
