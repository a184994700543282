use super::{LocationInput, Visitor, WriteOutcome};
use crate::State;
use crate::error::ErrorBody;
use crate::ip_address::extract_client_ip;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, header};
use axum::{Extension, Json};
use models::visitor_log::RedirectTarget;
use std::net::SocketAddr;
use tracing::{debug, info};

pub const VISITOR_TAG: &str = "visitor";

#[utoipa::path(
    post,
    path = "/log",
    request_body = LocationInput,
    responses(
        (status = 200, description = "Visit recorded (or logged to console), continue to the redirect target", body = RedirectTarget),
        (status = 500, description = "Internal server error", body = ErrorBody),
    ),
    tag = VISITOR_TAG
)]
pub async fn log_visit(
    Extension(state): Extension<State>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<RedirectTarget> {
    let input = match body {
        Ok(body) => LocationInput::from_body(&body),
        Err(err) => {
            debug!("Failed to read telemetry body: {err}");
            LocationInput::default()
        }
    };

    let visitor = Visitor {
        ip: extract_client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
        user_agent: headers
            .get(header::USER_AGENT)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
            .filter(|user_agent| !user_agent.is_empty()),
        referer: headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let redirect_url = &state.config.redirect_url;
    match state.log_writer.write(visitor, &input, redirect_url).await {
        WriteOutcome::Stored => debug!("Visitor log stored"),
        WriteOutcome::ConsoleOnly(reason) => {
            debug!("Redirecting without a stored visitor log: {reason}")
        }
    }

    info!("Redirecting to: {redirect_url}");
    Json(RedirectTarget {
        redirect_url: redirect_url.clone(),
    })
}
