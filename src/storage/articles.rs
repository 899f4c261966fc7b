use sqlx::{PgExecutor, PgTransaction, QueryBuilder};

use crate::error::Result;

use super::ArticleDetail;

/// 文章列表的过滤与分页参数
#[derive(Debug, Default)]
pub struct ArticleFilter<'a> {
    pub page: i32,
    pub limit: i32,
    /// 精确匹配标签名
    pub tag: Option<&'a str>,
    /// 对标题、正文、作者名做不区分大小写的子串搜索
    pub search: Option<&'a str>,
}

/// 带标签聚合与作者名的基础查询
///
/// `at` 是保留字，连接表取别名 `al`。
const SELECT_DETAIL: &str = r#"
    SELECT
        a.id,
        a.title,
        a.content,
        a.image_url,
        a.published_at,
        a.author_id,
        u.username AS author_name,
        COALESCE(
            jsonb_agg(jsonb_build_object('id', t.id, 'name', t.name) ORDER BY t.id)
                FILTER (WHERE t.id IS NOT NULL),
            '[]'::jsonb
        ) AS tags
    FROM articles a
    INNER JOIN users u ON u.id = a.author_id
    LEFT JOIN article_tags al ON al.article_id = a.id
    LEFT JOIN tags t ON t.id = al.tag_id
    "#;

/// 文章与标签关联的数据库操作
pub struct ArticleModel;

impl ArticleModel {
    pub async fn get_one<'a, E: PgExecutor<'a>>(
        executor: E,
        id: i64,
    ) -> Result<Option<ArticleDetail>> {
        let mut builder = QueryBuilder::new(SELECT_DETAIL);
        builder.push(" WHERE a.id = ").push_bind(id);
        builder.push(" GROUP BY a.id, u.username");

        Ok(builder
            .build_query_as::<ArticleDetail>()
            .fetch_optional(executor)
            .await?)
    }

    /// 分页查询文章列表，按发布时间倒序
    pub async fn list<'a, E: PgExecutor<'a>>(
        executor: E,
        filter: ArticleFilter<'_>,
    ) -> Result<Vec<ArticleDetail>> {
        let (limit, offset) = super::page_window(filter.page, filter.limit);

        let mut builder = QueryBuilder::new(SELECT_DETAIL);
        builder.push(" WHERE TRUE");

        if let Some(tag) = filter.tag {
            builder.push(
                " AND EXISTS (
                    SELECT 1 FROM article_tags x
                    JOIN tags xt ON xt.id = x.tag_id
                    WHERE x.article_id = a.id AND xt.name = ",
            );
            builder.push_bind(tag);
            builder.push(")");
        }

        if let Some(search) = filter.search {
            let pattern = format!("%{}%", search);
            builder.push(" AND (a.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR a.content ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR u.username ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" GROUP BY a.id, u.username");
        builder.push(" ORDER BY a.published_at DESC, a.id DESC");
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        Ok(builder
            .build_query_as::<ArticleDetail>()
            .fetch_all(executor)
            .await?)
    }

    /// 最新发布的 n 篇文章，忽略分页配置
    pub async fn latest<'a, E: PgExecutor<'a>>(executor: E, n: i64) -> Result<Vec<ArticleDetail>> {
        let mut builder = QueryBuilder::new(SELECT_DETAIL);
        builder.push(" GROUP BY a.id, u.username");
        builder.push(" ORDER BY a.published_at DESC, a.id DESC");
        builder.push(" LIMIT ").push_bind(n);

        Ok(builder
            .build_query_as::<ArticleDetail>()
            .fetch_all(executor)
            .await?)
    }

    pub async fn exists<'a, E: PgExecutor<'a>>(executor: E, id: i64) -> Result<bool> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1)")
                .bind(id)
                .fetch_one(executor)
                .await?,
        )
    }

    pub async fn find_by_title<'a, E: PgExecutor<'a>>(
        executor: E,
        title: &str,
    ) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar("SELECT id FROM articles WHERE title = $1")
            .bind(title)
            .fetch_optional(executor)
            .await?)
    }

    /// 插入文章，published_at 由数据库在创建时写入且之后不变
    pub async fn insert<'c>(
        tx: &mut PgTransaction<'c>,
        author_id: i64,
        title: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "
            INSERT INTO articles (author_id, title, content, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(author_id)
        .bind(title)
        .bind(content)
        .bind(image_url)
        .fetch_one(tx.as_mut())
        .await?)
    }

    /// 覆盖写文章字段，合并逻辑由调用方完成
    pub async fn update<'c>(
        tx: &mut PgTransaction<'c>,
        id: i64,
        title: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "
            UPDATE articles
            SET title = $2, content = $3, image_url = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(image_url)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn delete<'a, E: PgExecutor<'a>>(executor: E, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// 清空文章的标签关联，标签行本身保留
    pub async fn clear_tags<'c>(tx: &mut PgTransaction<'c>, article_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
            .bind(article_id)
            .execute(tx.as_mut())
            .await?;
        Ok(())
    }

    /// 按名字 get-or-create 标签并关联到文章
    pub async fn link_tags<'c>(
        tx: &mut PgTransaction<'c>,
        article_id: i64,
        names: &[String],
    ) -> Result<()> {
        for name in names {
            let tag_id: i64 = sqlx::query_scalar(
                "
                INSERT INTO tags (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                ",
            )
            .bind(name)
            .fetch_one(tx.as_mut())
            .await?;

            sqlx::query(
                "
                INSERT INTO article_tags (article_id, tag_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(article_id)
            .bind(tag_id)
            .execute(tx.as_mut())
            .await?;
        }
        Ok(())
    }
}
