use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// 用户账号行
///
/// 密码只保存 argon2 哈希，从不落盘明文。
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// 当前请求者的身份信息
///
/// 组名集合在提取认证信息时一次性加载，权限判定只读内存。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
}

/// `/me` 接口的聚合视图
///
/// 账号字段、所属组名和个人资料（资料行缺失时字段取默认值）。
#[derive(Debug, sqlx::FromRow)]
pub struct MeDetail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Vec<String>,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
}

/// 标签行
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
}

/// 文章详情
///
/// 标签在 SQL 中聚合为 jsonb 数组，作者名平铺。
#[derive(Debug, sqlx::FromRow)]
pub struct ArticleDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_name: String,
    pub tags: Json<Vec<TagRow>>,
}

/// 评论详情
#[derive(Debug, sqlx::FromRow)]
pub struct CommentDetail {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub article_id: i64,
    pub created_at: DateTime<Utc>,
}
