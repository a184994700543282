use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::MatchedPath;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{
    Extension,
    extract::Request,
    middleware,
    routing::{get, post},
};
use config::Config;
use db::{DatabaseConnector, MongoDriver};
use error::{ApiError, INTERNAL_SERVER_ERROR};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::any::Any;
use std::future::ready;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use telemetry::LogWriter;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_scalar::{Scalar, Servable as ScalarServable};

mod config;
mod db;
mod error;
mod health;
mod ip_address;
mod landing;
mod logs;
mod sentry;
mod telemetry;
#[cfg(test)]
mod test_utils;

#[derive(Clone, Debug)]
pub struct State {
    config: &'static Config,
    database: Arc<DatabaseConnector>,
    log_writer: LogWriter,
}

impl State {
    pub fn new(config: &'static Config, database: Arc<DatabaseConnector>) -> Self {
        Self {
            config,
            log_writer: LogWriter::new(database.clone()),
            database,
        }
    }
}

fn main() {
    let config: &'static Config = Box::leak(Box::new(
        Config::new().expect("error: failed to construct config"),
    ));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(::sentry::integrations::tracing::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Sentry needs to be initialized outside of an async block.
    // See https://docs.sentry.io/platforms/rust.
    let _sentry = crate::sentry::Sentry::init(config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("error: failed to initialize tokio runtime")
        .block_on(start_main_server(config));
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Waypoint",
        description = "Redirects visitors to a configured destination and records where they came from."
    ),
    paths(landing::route::landing_page, telemetry::routes::log_visit)
)]
struct ApiDoc;

async fn start_main_server(config: &'static Config) {
    info!("Starting Waypoint v{}", env!("CARGO_PKG_VERSION"));

    let database = Arc::new(DatabaseConnector::new(
        config.mongodb_uri.clone(),
        MongoDriver::new(config.database_timeout),
    ));
    if !database.is_configured() {
        warn!("MONGODB_URI not set, visitor logs will only be written to the console");
    }

    let state = State::new(config, database.clone());
    let recorder_handle = setup_metrics_recorder();

    let app = app(state).route("/metrics", get(move || ready(recorder_handle.render())));

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("error: failed to bind to port");
    info!(
        "Waypoint running on http://0.0.0.0:{} (Press Ctrl+C to quit)",
        config.port
    );
    info!("Redirecting all traffic to: {}", config.redirect_url);
    info!(
        "Visitor logs go to: {}",
        if database.is_configured() {
            "MongoDB and console"
        } else {
            "console only"
        }
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("error: failed to initialize axum server");

    database.close().await;
    info!("Waypoint stopped");
}

fn app(state: State) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(logs::route::get_logs))
        .routes(routes!(health::check))
        .split_for_parts();

    let visitor_router = Router::new()
        .route("/", get(landing::route::landing_page))
        .route(
            "/log",
            post(telemetry::routes::log_visit).layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(|_| async move {
                        ApiError::internal(INTERNAL_SERVER_ERROR)
                    }))
                    .layer(RequestDecompressionLayer::new()),
            ),
        )
        .fallback(landing::route::redirect_visitor);

    let json_specification = api.to_pretty_json().expect("API docs generation failed");

    router
        .merge(visitor_router)
        .layer(middleware::from_fn(track_metrics))
        .layer(middleware::from_fn(
            crate::sentry::Sentry::capture_errors_middleware,
        ))
        .layer(Extension(state))
        .route(
            "/docs/openapi.json",
            get(move || ready(json_specification.clone())),
        )
        .merge(Scalar::with_url("/docs", api))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {details}");

    ApiError::internal(INTERNAL_SERVER_ERROR).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Label for the route that served `request`. Requests answered by the
/// catch-all redirect share one label so arbitrary visitor paths do not
/// become metric series.
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_owned())
        .unwrap_or_else(|| CATCH_ALL_ROUTE.to_owned())
}

pub const CATCH_ALL_ROUTE: &str = "<catch-all>";

fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_requests_duration_seconds".to_string()),
            EXPONENTIAL_SECONDS,
        )
        .expect("error: failed to build prometheus recorder")
        .install_recorder()
        .expect("error: failed to install prometheus recorder")
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let route = route_label(&req);
    let method = req.method().to_string();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("path", route),
        ("status", response.status().as_u16().to_string()),
    ];
    metrics::increment_counter!("http_requests_total", &labels);
    metrics::histogram!(
        "http_requests_duration_seconds",
        start.elapsed().as_secs_f64(),
        &labels
    );

    response
}
