use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("token is invalid")]
    TokenInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error("credential hashing failed: {0}")]
    Crypto(String),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("data integrity violation: {0}")]
    Integrity(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    /// 对外统一为“未认证”，内部仍可区分
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AppError::Unauthorized(_) | AppError::TokenInvalid | AppError::TokenExpired
        )
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            AppError::Unauthorized(_) | AppError::TokenInvalid | AppError::TokenExpired => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED)
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::InvalidArgument(_) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
            }
            AppError::Crypto(_)
            | AppError::Signing(_)
            | AppError::Integrity(_)
            | AppError::Database(_)
            | AppError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(what) => format!("{}不存在", what),
            AppError::Conflict(msg) | AppError::InvalidArgument(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::TokenInvalid | AppError::TokenExpired => "令牌无效或已过期".to_string(),
            AppError::Forbidden => "无权限访问该资源".to_string(),
            _ => "内部服务器错误".to_string(),
        }
    }
}

// 请求体、路径、查询参数解析失败统一按参数错误返回
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(format!("请求体无效: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidArgument(format!("路径参数无效: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidArgument(format!("查询参数无效: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::TokenInvalid | AppError::TokenExpired => {
                tracing::debug!(reason = %self, "Rejected bearer token");
            }
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "Request failed with internal error");
            }
            _ => {}
        }

        (status, error_to_api_response::<()>(code, self.public_message())).into_response()
    }
}
