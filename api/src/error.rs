use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;

pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

#[derive(Debug)]
pub enum ApiError {
    /// 500 Internal Server Error
    InternalServerError(Cow<'static, str>),
    /// 503 Service Unavailable
    ServiceUnavailable(Cow<'static, str>),
}

impl ApiError {
    pub fn internal<Msg: Into<Cow<'static, str>>>(msg: Msg) -> Self {
        Self::InternalServerError(msg.into())
    }

    pub fn unavailable<Msg: Into<Cow<'static, str>>>(msg: Msg) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ApiError::InternalServerError(cow) => (StatusCode::INTERNAL_SERVER_ERROR, cow),
            ApiError::ServiceUnavailable(cow) => (StatusCode::SERVICE_UNAVAILABLE, cow),
        };

        (
            status,
            Json(ErrorBody {
                error: error.into_owned(),
            }),
        )
            .into_response()
    }
}
