use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Необходима авторизация")]
    Unauthorized,

    #[error("Недостаточно прав для этого действия")]
    Forbidden,

    #[error("{0} не найден")]
    NotFound(&'static str),

    #[error("Страница не найдена")]
    PageNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn validation(detail: impl Into<String>) -> Self {
        AppError::Validation(detail.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } | AppError::PageNotFound => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Database { .. } | AppError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match &self {
            AppError::Database(_) | AppError::Io(_) => {
                error!("Request failed: {self}");
                "Внутренняя ошибка сервера".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
