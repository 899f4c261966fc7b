use sqlx::{PgExecutor, PgTransaction};

use crate::error::Result;

use super::{GroupModel, Identity, MeDetail, UserRow};

/// 新建用户时自动加入的默认组
const DEFAULT_GROUP: &str = "user";

/// 用户与个人资料的数据库操作
pub struct UserModel;

impl UserModel {
    pub async fn username_exists<'a, E: PgExecutor<'a>>(
        executor: E,
        username: &str,
    ) -> Result<bool> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(executor)
                .await?,
        )
    }

    pub async fn email_exists<'a, E: PgExecutor<'a>>(executor: E, email: &str) -> Result<bool> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(executor)
                .await?,
        )
    }

    /// 创建用户
    ///
    /// 同一事务内补齐个人资料行并加入默认组 `user`，
    /// 等价于一次用户创建信号的全部副作用。
    pub async fn create<'c>(
        tx: &mut PgTransaction<'c>,
        username: &str,
        email: &str,
        password_hash: &str,
        is_staff: bool,
        is_superuser: bool,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "
            INSERT INTO users (username, email, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(is_staff)
        .bind(is_superuser)
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        let group_id = GroupModel::get_or_create(tx, DEFAULT_GROUP).await?;
        GroupModel::attach_user(tx.as_mut(), id, group_id).await?;

        Ok(id)
    }

    pub async fn find_by_username<'a, E: PgExecutor<'a>>(
        executor: E,
        username: &str,
    ) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as::<_, UserRow>(
            "
            SELECT id, username, email, password_hash, is_staff, is_superuser
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(executor)
        .await?)
    }

    pub async fn set_password<'a, E: PgExecutor<'a>>(
        executor: E,
        id: i64,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_email<'a, E: PgExecutor<'a>>(executor: E, id: i64, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = $2 WHERE id = $1")
            .bind(id)
            .bind(email)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// 加载请求者身份（含组名集合）
    pub async fn identity<'a, E: PgExecutor<'a>>(executor: E, id: i64) -> Result<Option<Identity>> {
        Ok(sqlx::query_as::<_, Identity>(
            r#"
            SELECT
                u.id,
                u.username,
                u.is_staff,
                u.is_superuser,
                COALESCE(
                    array_agg(g.name ORDER BY g.name) FILTER (WHERE g.name IS NOT NULL),
                    ARRAY[]::text[]
                ) AS groups
            FROM users u
            LEFT JOIN user_groups ug ON ug.user_id = u.id
            LEFT JOIN groups g ON g.id = ug.group_id
            WHERE u.id = $1
            GROUP BY u.id
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?)
    }

    /// `/me` 聚合查询
    ///
    /// 资料行缺失时 display_name 与 bio 取空串。
    pub async fn me<'a, E: PgExecutor<'a>>(executor: E, id: i64) -> Result<Option<MeDetail>> {
        Ok(sqlx::query_as::<_, MeDetail>(
            r#"
            SELECT
                u.id,
                u.username,
                u.email,
                u.is_staff,
                u.is_superuser,
                COALESCE(
                    array_agg(g.name ORDER BY g.name) FILTER (WHERE g.name IS NOT NULL),
                    ARRAY[]::text[]
                ) AS groups,
                COALESCE(p.display_name, '') AS display_name,
                COALESCE(p.bio, '') AS bio,
                p.avatar_url
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            LEFT JOIN user_groups ug ON ug.user_id = u.id
            LEFT JOIN groups g ON g.id = ug.group_id
            WHERE u.id = $1
            GROUP BY u.id, p.user_id
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?)
    }

    /// 写入个人资料（不存在则创建）
    pub async fn set_profile<'a, E: PgExecutor<'a>>(
        executor: E,
        user_id: i64,
        display_name: &str,
        bio: &str,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO profiles (user_id, display_name, bio, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET
                display_name = EXCLUDED.display_name,
                bio = EXCLUDED.bio,
                avatar_url = EXCLUDED.avatar_url
            ",
        )
        .bind(user_id)
        .bind(display_name)
        .bind(bio)
        .bind(avatar_url)
        .execute(executor)
        .await?;
        Ok(())
    }
}
