use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub const UNKNOWN_USER_AGENT: &str = "Unknown";
pub const DIRECT_REFERER: &str = "Direct";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Where the visitor was, or why we don't know.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Location {
    Coordinates(Coordinates),
    Denied,
    NotAvailable,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Coordinates(Coordinates {
                latitude,
                longitude,
                accuracy: Some(accuracy),
            }) => write!(f, "{latitude}, {longitude} (±{accuracy}m)"),
            Location::Coordinates(Coordinates {
                latitude,
                longitude,
                accuracy: None,
            }) => write!(f, "{latitude}, {longitude}"),
            Location::Denied => f.write_str("denied"),
            Location::NotAvailable => f.write_str("not available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLog {
    #[schema(example = "203.0.113.7")]
    pub ip: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub referer: String,
    pub location: Location,
    #[schema(example = "https://www.google.com")]
    pub redirect_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VisitorLogList {
    pub count: usize,
    pub logs: Vec<VisitorLog>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTarget {
    pub redirect_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_is_tagged_by_status() {
        let location = Location::Coordinates(Coordinates {
            latitude: 55.67,
            longitude: 12.56,
            accuracy: Some(20.0),
        });
        assert_eq!(
            serde_json::to_value(location).unwrap(),
            json!({"status": "coordinates", "latitude": 55.67, "longitude": 12.56, "accuracy": 20.0})
        );
        assert_eq!(
            serde_json::to_value(Location::Denied).unwrap(),
            json!({"status": "denied"})
        );
        assert_eq!(
            serde_json::to_value(Location::NotAvailable).unwrap(),
            json!({"status": "not_available"})
        );
    }

    #[test]
    fn test_missing_accuracy_is_omitted() {
        let location = Location::Coordinates(Coordinates {
            latitude: 0.0,
            longitude: 0.0,
            accuracy: None,
        });
        let value = serde_json::to_value(location).unwrap();
        assert!(value.get("accuracy").is_none());
    }

    #[test]
    fn test_visitor_log_uses_camel_case_keys() {
        let log = VisitorLog {
            ip: None,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            user_agent: UNKNOWN_USER_AGENT.to_string(),
            referer: DIRECT_REFERER.to_string(),
            location: Location::NotAvailable,
            redirect_url: "https://example.com".to_string(),
        };
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["ip"], json!(null));
        assert_eq!(value["userAgent"], json!("Unknown"));
        assert_eq!(value["redirectUrl"], json!("https://example.com"));
        assert_eq!(value["timestamp"], json!("2023-11-14T22:13:20Z"));

        let back: VisitorLog = serde_json::from_value(value).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_location_display() {
        let location = Location::Coordinates(Coordinates {
            latitude: 1.5,
            longitude: -2.25,
            accuracy: Some(10.0),
        });
        assert_eq!(location.to_string(), "1.5, -2.25 (±10m)");
        assert_eq!(Location::Denied.to_string(), "denied");
        assert_eq!(Location::NotAvailable.to_string(), "not available");
    }
}
