use sqlx::{PgExecutor, PgTransaction};

use crate::error::Result;

use super::CommentDetail;

const SELECT_DETAIL: &str = r#"
    SELECT
        c.id,
        c.content,
        c.author_id,
        u.username AS author_name,
        c.article_id,
        c.created_at
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
    "#;

/// 评论的数据库操作
pub struct CommentModel;

impl CommentModel {
    pub async fn get_one<'a, E: PgExecutor<'a>>(
        executor: E,
        id: i64,
    ) -> Result<Option<CommentDetail>> {
        Ok(
            sqlx::query_as::<_, CommentDetail>(&format!("{SELECT_DETAIL} WHERE c.id = $1"))
                .bind(id)
                .fetch_optional(executor)
                .await?,
        )
    }

    /// 分页查询某篇文章的评论，按创建时间正序
    pub async fn list_for_article<'a, E: PgExecutor<'a>>(
        executor: E,
        article_id: i64,
        page: i32,
        limit: i32,
    ) -> Result<Vec<CommentDetail>> {
        let (limit, offset) = super::page_window(page, limit);

        Ok(sqlx::query_as::<_, CommentDetail>(&format!(
            "{SELECT_DETAIL}
            WHERE c.article_id = $1
            ORDER BY c.created_at, c.id
            LIMIT $2 OFFSET $3"
        ))
        .bind(article_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?)
    }

    pub async fn insert<'a, E: PgExecutor<'a>>(
        executor: E,
        article_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "
            INSERT INTO comments (article_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(executor)
        .await?)
    }

    pub async fn set_content<'a, E: PgExecutor<'a>>(
        executor: E,
        id: i64,
        content: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE comments SET content = $2 WHERE id = $1")
            .bind(id)
            .bind(content)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'a, E: PgExecutor<'a>>(executor: E, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// 按 (article, author, content) 查重的幂等插入，供种子脚本使用
    pub async fn get_or_create<'c>(
        tx: &mut PgTransaction<'c>,
        article_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<i64> {
        let existing: Option<i64> = sqlx::query_scalar(
            "
            SELECT id FROM comments
            WHERE article_id = $1 AND author_id = $2 AND content = $3
            ",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(tx.as_mut())
        .await?;

        match existing {
            Some(id) => Ok(id),
            None => Self::insert(tx.as_mut(), article_id, author_id, content).await,
        }
    }
}
