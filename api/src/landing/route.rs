use super::render_landing_page;
use crate::State;
use crate::error::{ApiError, ErrorBody};
use crate::ip_address::extract_client_ip;
use crate::telemetry::routes::VISITOR_TAG;
use axum::Extension;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use std::net::SocketAddr;
use tracing::{error, info};

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page pointing at the redirect target", body = String, content_type = "text/html"),
        (status = 500, description = "Landing page template could not be read", body = ErrorBody),
    ),
    tag = VISITOR_TAG
)]
pub async fn landing_page(
    Extension(state): Extension<State>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Html<String>, ApiError> {
    let ip = extract_client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    info!(
        "Visitor detected - IP: {}",
        ip.as_deref().unwrap_or("unknown")
    );

    let template = tokio::fs::read_to_string(&state.config.landing_page_path)
        .await
        .map_err(|err| {
            error!(
                "Failed to read landing page {}: {err}",
                state.config.landing_page_path.display()
            );
            ApiError::internal("Error loading page")
        })?;

    Ok(Html(render_landing_page(&template, &state.config.redirect_url)))
}

/// Any other page sends the visitor straight to the redirect target.
pub async fn redirect_visitor(
    Extension(state): Extension<State>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }

    let ip = extract_client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    info!(
        "Visitor detected - IP: {} | Path: {}",
        ip.as_deref().unwrap_or("unknown"),
        uri.path()
    );
    info!("Redirecting to: {}", state.config.redirect_url);

    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.config.redirect_url.clone())],
    )
        .into_response()
}
