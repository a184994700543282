use crate::config::Config;
use crate::ip_address::extract_client_ip;
use crate::route_label;
use axum::extract::ConnectInfo;
use axum::http::Method;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use sentry::ClientInitGuard;
use sentry::protocol::Event;
use std::borrow::Cow;
use std::env;
use std::net::SocketAddr;
use tracing::warn;

pub struct Sentry;

impl Sentry {
    pub fn init(config: &'static Config) -> Option<ClientInitGuard> {
        if let Some(sentry_url) = &config.sentry_url {
            return Some(sentry::init((
                sentry_url.as_str(),
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    traces_sample_rate: 0.75,
                    environment: match env::var("ENVIRONMENT") {
                        Ok(value) => Some(Cow::Owned(value)),
                        Err(_) => Some(Cow::Borrowed("development")),
                    },
                    ..Default::default()
                },
            )));
        }
        warn!("Sentry integration disabled: no sentry_url configured");
        None
    }

    /// Reports 500 responses, tagged with the route and the visitor address.
    /// 503s from a missing store are expected and not reported.
    pub async fn capture_errors_middleware(request: Request, next: Next) -> Response {
        let method = request.method().clone();
        let route = route_label(&request);
        let client_ip = extract_client_ip(
            request.headers(),
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        );

        let response = next.run(request).await;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            sentry::capture_event(server_error_event(&method, &route, client_ip.as_deref()));
        }

        response
    }
}

fn server_error_event(method: &Method, route: &str, client_ip: Option<&str>) -> Event<'static> {
    let mut event = Event::default();
    event.message = Some(format!("Internal Server Error: {method} {route}"));
    event.level = sentry::Level::Error;
    event.tags.insert("route".to_string(), route.to_string());
    if let Some(client_ip) = client_ip {
        event
            .tags
            .insert("client_ip".to_string(), client_ip.to_string());
    }
    event
}
