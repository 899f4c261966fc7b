use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{self, CurrentUser, TokenKeys, TokenKind};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::storage::{DBPool, MeDetail, UserModel};

/// 配置账号相关路由。
///
/// 路由包括：
/// - `POST /token/`：签发令牌对
/// - `POST /token/refresh/`：用 refresh 换发 access
/// - `POST /register/`：注册账号
/// - `GET/PATCH /me/`：读取/更新本人信息
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/token/", post(token))
        .route("/token/refresh/", post(token_refresh))
        .route("/register/", post(register))
        .route("/me/", get(me).patch(update_me))
}

#[derive(Debug, Deserialize)]
pub struct TokenInput {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    access: String,
    refresh: String,
}

/// 用户名+密码换取令牌对。
///
/// 凭据无效时统一返回 401，不区分用户不存在和密码错误。
async fn token(
    State(pool): State<DBPool>,
    State(keys): State<TokenKeys>,
    Json(input): Json<TokenInput>,
) -> Result<Json<TokenPair>> {
    let user = UserModel::find_by_username(&pool, &input.username)
        .await?
        .ok_or(ApiError::BadCredentials)?;

    if !auth::verify_password(&input.password, &user.password_hash) {
        return Err(ApiError::BadCredentials.into());
    }

    Ok(Json(TokenPair {
        access: keys.issue(user.id, TokenKind::Access)?,
        refresh: keys.issue(user.id, TokenKind::Refresh)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    access: String,
}

/// 用 refresh 令牌换发新的 access 令牌。
async fn token_refresh(
    State(keys): State<TokenKeys>,
    Json(input): Json<RefreshInput>,
) -> Result<Json<AccessToken>> {
    let claims = keys.verify(&input.refresh, TokenKind::Refresh)?;

    Ok(Json(AccessToken {
        access: keys.issue(claims.sub, TokenKind::Access)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    username: String,
    #[serde(default)]
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountOut {
    id: i64,
    username: String,
    email: String,
}

/// 注册账号。
///
/// 用户名/邮箱重复返回字段级校验错误；
/// 资料行与默认组在同一事务内补齐。
async fn register(
    State(pool): State<DBPool>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<AccountOut>)> {
    let username = input.username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("username", "This field may not be blank.").into());
    }
    if input.password.chars().count() < 6 {
        return Err(ApiError::validation(
            "password",
            "Ensure this field has at least 6 characters.",
        )
        .into());
    }
    if UserModel::username_exists(&pool, username).await? {
        return Err(ApiError::validation("username", "Username is already taken.").into());
    }
    if !input.email.is_empty() && UserModel::email_exists(&pool, &input.email).await? {
        return Err(ApiError::validation("email", "Email is already in use.").into());
    }

    let password_hash = auth::hash_password(&input.password)?;

    let mut tx = pool.begin().await?;
    let id = UserModel::create(&mut tx, username, &input.email, &password_hash, false, false)
        .await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountOut {
            id,
            username: username.to_owned(),
            email: input.email,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProfileOut {
    display_name: String,
    bio: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeOut {
    id: i64,
    username: String,
    email: String,
    is_staff: bool,
    is_superuser: bool,
    groups: Vec<String>,
    profile: ProfileOut,
}

impl From<MeDetail> for MeOut {
    fn from(detail: MeDetail) -> Self {
        Self {
            id: detail.id,
            username: detail.username,
            email: detail.email,
            is_staff: detail.is_staff,
            is_superuser: detail.is_superuser,
            groups: detail.groups,
            profile: ProfileOut {
                display_name: detail.display_name,
                bio: detail.bio,
                avatar_url: detail.avatar_url,
            },
        }
    }
}

/// 读取本人账号、组名与资料。
async fn me(user: CurrentUser, State(pool): State<DBPool>) -> Result<Json<MeOut>> {
    let detail = UserModel::me(&pool, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(detail.into()))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    display_name: Option<String>,
    bio: Option<String>,
    /// 缺省保持不变，显式 null 清空
    #[serde(default, deserialize_with = "super::nullable")]
    avatar_url: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MeUpdate {
    email: Option<String>,
    profile: Option<ProfileUpdate>,
}

/// 更新本人邮箱和资料字段，未提供的字段保持不变。
async fn update_me(
    user: CurrentUser,
    State(pool): State<DBPool>,
    Json(input): Json<MeUpdate>,
) -> Result<Json<MeOut>> {
    let current = UserModel::me(&pool, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let mut tx = pool.begin().await?;

    if let Some(email) = &input.email {
        UserModel::set_email(tx.as_mut(), user.id, email).await?;
    }

    if let Some(profile) = input.profile {
        let display_name = profile.display_name.unwrap_or(current.display_name);
        let bio = profile.bio.unwrap_or(current.bio);
        let avatar_url = profile.avatar_url.unwrap_or(current.avatar_url);
        UserModel::set_profile(
            tx.as_mut(),
            user.id,
            &display_name,
            &bio,
            avatar_url.as_deref(),
        )
        .await?;
    }

    tx.commit().await?;

    let detail = UserModel::me(&pool, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(detail.into()))
}
