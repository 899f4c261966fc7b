use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::{ApiError, Error};
use crate::storage::{DBPool, UserModel};

use super::{TokenKeys, TokenKind};

/// 已认证的请求者
///
/// 提取时校验 Bearer access 令牌并一次性加载账号标志与组名集合，
/// 之后的权限判定不再访问数据库。
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    DBPool: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;

        let keys = TokenKeys::from_ref(state);
        let claims = keys.verify(token, TokenKind::Access)?;

        let pool = DBPool::from_ref(state);
        // 令牌有效但用户已被删除时同样按未认证处理
        let identity = UserModel::identity(&pool, claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser {
            id: identity.id,
            username: identity.username,
            is_staff: identity.is_staff,
            is_superuser: identity.is_superuser,
            groups: identity.groups,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
