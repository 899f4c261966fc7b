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
use crate::storage::{ArticleDetail, ArticleFilter, ArticleModel, DBPool, TagRow};

/// 配置文章相关路由。
///
/// 路由包括：
/// - `GET/POST /articles/`：文章列表 / 发表文章
/// - `GET /articles/latest/`：最新三篇
/// - `GET/PUT/PATCH/DELETE /articles/{id}/`：单篇文章
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/articles/", get(list).post(create))
        .route("/articles/latest/", get(latest))
        .route(
            "/articles/{id}/",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

/// 文章的完整表示，写操作也返回它。
#[derive(Debug, Serialize)]
pub struct ArticleOut {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub author_name: String,
    pub tags: Vec<TagRow>,
}

impl From<ArticleDetail> for ArticleOut {
    fn from(detail: ArticleDetail) -> Self {
        Self {
            id: detail.id,
            title: detail.title,
            content: detail.content,
            image_url: detail.image_url,
            published_at: detail.published_at,
            author_name: detail.author_name,
            tags: detail.tags.0,
        }
    }
}

/// 标签输入：裸字符串或带 `name` 字段的对象，其余形态丢弃。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    Name(String),
    Object { name: String },
    Other(serde_json::Value),
}

/// 规整标签输入。
///
/// 去掉首尾空白、丢弃空名，按小写去重但保留首次出现的原始大小写和顺序。
pub fn normalize_tags(raw: &[TagInput]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();

    for tag in raw {
        let name = match tag {
            TagInput::Name(s) => s.trim(),
            TagInput::Object { name } => name.trim(),
            TagInput::Other(_) => continue,
        };
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            names.push(name.to_owned());
        }
    }

    names
}

/// 查询参数，用于文章列表分页和筛选。
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    page: i32,
    limit: i32,
    tag: Option<String>,
    search: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            tag: None,
            search: None,
        }
    }
}

/// 获取文章列表，按发布时间倒序。
///
/// 支持分页、标签精确筛选和标题/正文/作者名搜索。
async fn list(
    Query(params): Query<QueryParams>,
    State(pool): State<DBPool>,
) -> Result<Json<Vec<ArticleOut>>> {
    let articles = ArticleModel::list(
        &pool,
        ArticleFilter {
            page: params.page,
            limit: params.limit,
            tag: params.tag.as_deref(),
            search: params.search.as_deref(),
        },
    )
    .await?;

    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

/// 最新发布的三篇文章，忽略分页参数。
async fn latest(State(pool): State<DBPool>) -> Result<Json<Vec<ArticleOut>>> {
    let articles = ArticleModel::latest(&pool, 3).await?;
    Ok(Json(articles.into_iter().map(Into::into).collect()))
}

/// 根据 id 获取单篇文章，不存在返回 404。
async fn retrieve(Path(id): Path<i64>, State(pool): State<DBPool>) -> Result<Json<ArticleOut>> {
    let article = ArticleModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(article.into()))
}

#[derive(Debug, Deserialize)]
pub struct ArticleInput {
    title: String,
    content: String,
    image_url: Option<String>,
    tags: Option<Vec<TagInput>>,
}

/// 发表文章。
///
/// 作者强制取当前请求者，载荷里的作者信息不生效。
async fn create(
    user: CurrentUser,
    State(pool): State<DBPool>,
    Json(input): Json<ArticleInput>,
) -> Result<(StatusCode, Json<ArticleOut>)> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title", "This field may not be blank.").into());
    }
    if input.content.is_empty() {
        return Err(ApiError::validation("content", "This field may not be blank.").into());
    }

    let names = normalize_tags(input.tags.as_deref().unwrap_or_default());

    let mut tx = pool.begin().await?;
    let id = ArticleModel::insert(
        &mut tx,
        user.id,
        title,
        &input.content,
        input.image_url.as_deref(),
    )
    .await?;
    ArticleModel::link_tags(&mut tx, id, &names).await?;
    tx.commit().await?;

    let article = ArticleModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(article.into())))
}

#[derive(Debug, Deserialize)]
pub struct ArticleUpdate {
    title: Option<String>,
    content: Option<String>,
    /// 缺省保持不变，显式 null 清空
    #[serde(default, deserialize_with = "super::nullable")]
    image_url: Option<Option<String>>,
    tags: Option<Vec<TagInput>>,
}

/// 更新文章，PUT 与 PATCH 共用，未提供的字段保持不变。
///
/// 标签字段缺省时关联不动；提供（包括空列表）则整体替换。
async fn update(
    user: CurrentUser,
    Path(id): Path<i64>,
    State(pool): State<DBPool>,
    Json(input): Json<ArticleUpdate>,
) -> Result<Json<ArticleOut>> {
    // 先取对象：未知 id 是 404，之后才轮到对象级权限
    let current = ArticleModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !permissions::owner_or_admin(&user, current.author_id) {
        return Err(ApiError::Forbidden.into());
    }

    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::validation("title", "This field may not be blank.").into());
    }
    if input.content.as_deref().is_some_and(|c| c.is_empty()) {
        return Err(ApiError::validation("content", "This field may not be blank.").into());
    }

    let title = input
        .title
        .map(|t| t.trim().to_owned())
        .unwrap_or(current.title);
    let content = input.content.unwrap_or(current.content);
    let image_url = input.image_url.unwrap_or(current.image_url);

    let mut tx = pool.begin().await?;
    ArticleModel::update(&mut tx, id, &title, &content, image_url.as_deref()).await?;

    if let Some(raw) = input.tags {
        let names = normalize_tags(&raw);
        ArticleModel::clear_tags(&mut tx, id).await?;
        ArticleModel::link_tags(&mut tx, id, &names).await?;
    }
    tx.commit().await?;

    let article = ArticleModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(article.into()))
}

/// 删除文章，作者本人或 admin 组可删。
async fn destroy(
    user: CurrentUser,
    Path(id): Path<i64>,
    State(pool): State<DBPool>,
) -> Result<StatusCode> {
    let current = ArticleModel::get_one(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !permissions::owner_or_admin(&user, current.author_id) {
        return Err(ApiError::Forbidden.into());
    }

    ArticleModel::delete(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: serde_json::Value) -> Vec<TagInput> {
        serde_json::from_value(input).expect("标签输入反序列化失败")
    }

    #[test]
    fn test_normalize_tags_dedupe_and_trim() {
        let raw = parse(serde_json::json!([
            "Travel",
            "travel",
            " Beach ",
            "",
            { "name": "Europe" }
        ]));

        assert_eq!(normalize_tags(&raw), vec!["Travel", "Beach", "Europe"]);
    }

    #[test]
    fn test_normalize_tags_discards_junk() {
        let raw = parse(serde_json::json!([
            42,
            { "label": "no-name" },
            { "name": 7 },
            ["nested"],
            "   ",
            "ok"
        ]));

        assert_eq!(normalize_tags(&raw), vec!["ok"]);
    }

    #[test]
    fn test_normalize_tags_keeps_first_seen_casing() {
        let raw = parse(serde_json::json!(["RUST", "rust", "Rust", "axum"]));

        assert_eq!(normalize_tags(&raw), vec!["RUST", "axum"]);
    }

    #[test]
    fn test_normalize_tags_empty_input() {
        assert!(normalize_tags(&[]).is_empty());
    }

    #[test]
    fn test_update_image_url_null_vs_omitted() {
        let omitted: ArticleUpdate =
            serde_json::from_value(serde_json::json!({ "title": "t" })).expect("反序列化失败");
        assert_eq!(omitted.image_url, None);

        let cleared: ArticleUpdate =
            serde_json::from_value(serde_json::json!({ "image_url": null })).expect("反序列化失败");
        assert_eq!(cleared.image_url, Some(None));

        let replaced: ArticleUpdate =
            serde_json::from_value(serde_json::json!({ "image_url": "https://x/cover.jpg" }))
                .expect("反序列化失败");
        assert_eq!(
            replaced.image_url,
            Some(Some("https://x/cover.jpg".to_owned()))
        );
    }
}
