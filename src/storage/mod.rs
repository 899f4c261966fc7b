mod articles;
mod comments;
mod groups;
mod models;
mod postgres;
mod users;

pub use self::{
    articles::{ArticleFilter, ArticleModel},
    comments::CommentModel,
    groups::{GroupModel, PermissionModel},
    models::{ArticleDetail, CommentDetail, Identity, MeDetail, TagRow, UserRow},
    postgres::{DBPool, init_db_from_env, migrate, new_db_pool},
    users::UserModel,
};

/// 把客户端分页参数换算成 SQL 的 (LIMIT, OFFSET)
///
/// limit 收敛到 [1, 100]，page 至少为 1，偏移量在 i64 上计算，
/// 越界参数不会产生负偏移或整数溢出。
pub(crate) fn page_window(page: i32, limit: i32) -> (i64, i64) {
    let limit = i64::from(limit.clamp(1, 100));
    let page = i64::from(page.max(1));
    (limit, (page - 1) * limit)
}
