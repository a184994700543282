use super::parse_limit;
use crate::State;
use crate::error::{ApiError, ErrorBody};
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::{Extension, Json};
use models::visitor_log::VisitorLogList;
use serde::Deserialize;
use tracing::{debug, error, warn};
use utoipa::IntoParams;

const LOGS_TAG: &str = "logs";

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    /// Maximum number of logs to return, newest first. Defaults to 100.
    #[param(value_type = Option<i64>)]
    pub limit: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/logs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Most recent visitor logs", body = VisitorLogList),
        (status = 500, description = "Error fetching logs", body = ErrorBody),
        (status = 503, description = "No database connection", body = ErrorBody),
    ),
    tag = LOGS_TAG
)]
pub async fn get_logs(
    Extension(state): Extension<State>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<VisitorLogList>, ApiError> {
    let limit = match query {
        Ok(Query(query)) => parse_limit(query.limit.as_deref()),
        Err(err) => {
            debug!("Ignoring unreadable logs query: {err}");
            parse_limit(None)
        }
    };

    let database = state.database.connect().await.map_err(|err| {
        warn!("Visitor logs requested without a database: {err}");
        ApiError::unavailable("Database not connected. Set MONGODB_URI to enable log storage.")
    })?;

    debug!("Fetching up to {limit} visitor logs");
    let logs = database.recent(limit).await.map_err(|err| {
        error!("Error fetching logs: {err}");
        ApiError::internal("Error fetching logs")
    })?;

    Ok(Json(VisitorLogList {
        count: logs.len(),
        logs,
    }))
}
