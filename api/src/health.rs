#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = String),
    )
)]
pub async fn check() -> &'static str {
    "I'm good"
}
