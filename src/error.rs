use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

pub type Result<T> = core::result::Result<T, Error>;

/// 可直接映射为 HTTP 状态码的请求级错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,

    /// 未携带或携带了无效的认证凭据
    #[error("Authentication credentials were not provided.")]
    Unauthorized,

    /// 用户名或密码错误
    #[error("No active account found with the given credentials")]
    BadCredentials,

    /// 已认证但无权操作目标对象
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// 字段级校验错误，响应体为 `{field: [message]}`
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("password hash error: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),

    #[error(transparent)]
    ApiError(#[from] ApiError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::Sqlx(e) => {
                tracing::error!(%e, "sqlx error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
            // 令牌解码失败统一按未认证处理
            Error::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Given token not valid for any token type" })),
            )
                .into_response(),
            Error::PasswordHash(e) => {
                tracing::error!(%e, "password hash error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
            Error::ApiError(api_error) => {
                let status = match api_error {
                    ApiError::NotFound => StatusCode::NOT_FOUND,
                    ApiError::Unauthorized | ApiError::BadCredentials => StatusCode::UNAUTHORIZED,
                    ApiError::Forbidden => StatusCode::FORBIDDEN,
                    ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
                };
                let body = match api_error {
                    ApiError::Validation { field, message } => {
                        let mut map = serde_json::Map::new();
                        map.insert(field.to_string(), json!([message]));
                        serde_json::Value::Object(map)
                    }
                    other => json!({ "detail": other.to_string() }),
                };
                (status, Json(body)).into_response()
            }
            Error::Io(e) => {
                tracing::error!(%e, "file io error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
            .into_response(),
        }
    }
}
