use axum::extract::FromRef;

use crate::{auth::TokenKeys, storage::DBPool};

/// 应用程序上下文
///
/// [`AppState`] 封装数据库连接池和令牌密钥，提供统一访问入口。
#[derive(Clone, FromRef)]
pub struct AppState {
    pool: DBPool,
    tokens: TokenKeys,
}

impl AppState {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(pool: DBPool, tokens: TokenKeys) -> Self {
        Self { pool, tokens }
    }

    /// 获取数据库连接池
    pub fn pool(&self) -> &DBPool {
        &self.pool
    }

    /// 获取令牌密钥
    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }
}
