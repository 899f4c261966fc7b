use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{CurrentUser, permissions};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::storage::{ArticleModel, CommentDetail, CommentModel, DBPool};

/// 配置评论相关路由。
///
/// 路由包括：
/// - `GET/POST /articles/{id}/comments/`：某篇文章的评论
/// - `GET/PUT/PATCH/DELETE /comments/{id}/`：单条评论
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/articles/{id}/comments/", get(list).post(create))
        .route(
            "/comments/{id}/",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

#[derive(Debug, Serialize)]
pub struct CommentOut {
    pub id: i64,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentDetail> for CommentOut {
    fn from(detail: CommentDetail) -> Self {
        Self {
            id: detail.id,
            content: detail.content,
            author_name: detail.author_name,
            created_at: detail.created_at,
        }
    }
}

/// 评论列表的分页参数。
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageParams {
    page: i32,
    limit: i32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// 获取某篇文章的评论，按创建时间正序。
async fn list(
    Path(id): Path<i64>,
    Query(params): Query<PageParams>,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<CommentOut>>> {
    if !ArticleModel::exists(&pool, id).await? {
        return Err(ApiError::NotFound.into());
    }

    let comments = CommentModel::list_for_article(&pool, id, params.page, params.limit).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    content: String,
}

/// 发表评论，作者强制取当前请求者。
///
/// 目标文章不存在时返回 404。
async fn create(
    user: CurrentUser,
    Path(id): Path<i64>,
    State(pool): State<DBPool>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<CommentOut>)> {
    if !ArticleModel::exists(&pool, id).await? {
        return Err(ApiError::NotFound.into());
    }
    if input.content.is_empty() {
        return Err(ApiError::validation("content", "This field may not be blank.").into());
    }

    let comment_id = CommentModel::insert(&pool, id, user.id, &input.content).await?;

    let comment = CommentModel::get_one(&pool, comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// 根据 id 获取单条评论。
async fn retrieve(Path(id): Path<i64>, State(pool): State<DBPool>) -> Result<Json<CommentOut>> {
    let comment = CommentModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(comment.into()))
}

#[derive(Debug, Deserialize)]
pub struct CommentUpdate {
    content: Option<String>,
}

/// 修改评论内容，PUT 与 PATCH 共用，content 缺省时保持不变。
///
/// 作者本人或 admin 组可改。
async fn update(
    user: CurrentUser,
    Path(id): Path<i64>,
    State(pool): State<DBPool>,
    Json(input): Json<CommentUpdate>,
) -> Result<Json<CommentOut>> {
    let current = CommentModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !permissions::owner_or_admin(&user, current.author_id) {
        return Err(ApiError::Forbidden.into());
    }
    if input.content.as_deref().is_some_and(|c| c.is_empty()) {
        return Err(ApiError::validation("content", "This field may not be blank.").into());
    }

    let content = input.content.unwrap_or(current.content);
    CommentModel::set_content(&pool, id, &content).await?;

    let comment = CommentModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(comment.into()))
}

/// 删除评论，作者本人或 admin 组可删。
async fn destroy(
    user: CurrentUser,
    Path(id): Path<i64>,
    State(pool): State<DBPool>,
) -> Result<StatusCode> {
    let current = CommentModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !permissions::owner_or_admin(&user, current.author_id) {
        return Err(ApiError::Forbidden.into());
    }

    CommentModel::delete(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
