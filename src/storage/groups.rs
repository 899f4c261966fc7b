use sqlx::{PgExecutor, PgTransaction};

use crate::error::Result;

/// 组的数据库操作
pub struct GroupModel;

impl GroupModel {
    /// 按名字取组，不存在则创建
    pub async fn get_or_create<'c>(tx: &mut PgTransaction<'c>, name: &str) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "
            INSERT INTO groups (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            ",
        )
        .bind(name)
        .fetch_one(tx.as_mut())
        .await?)
    }

    pub async fn find_id<'a, E: PgExecutor<'a>>(executor: E, name: &str) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar("SELECT id FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?)
    }

    pub async fn attach_user<'a, E: PgExecutor<'a>>(
        executor: E,
        user_id: i64,
        group_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO user_groups (user_id, group_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(group_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// 将组的权限集合整体替换为给定集合
    ///
    /// 先清空再插入，重复执行结果一致，漂移自愈。
    pub async fn set_permissions<'c>(
        tx: &mut PgTransaction<'c>,
        group_id: i64,
        permission_ids: &[i64],
    ) -> Result<()> {
        sqlx::query("DELETE FROM group_permissions WHERE group_id = $1")
            .bind(group_id)
            .execute(tx.as_mut())
            .await?;

        sqlx::query(
            "
            INSERT INTO group_permissions (group_id, permission_id)
            SELECT $1, unnest($2::bigint[])
            ",
        )
        .bind(group_id)
        .bind(permission_ids)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    /// 查询组当前持有的 (resource, action) 权限对，按字典序
    pub async fn assigned_permissions<'a, E: PgExecutor<'a>>(
        executor: E,
        group_name: &str,
    ) -> Result<Vec<(String, String)>> {
        Ok(sqlx::query_as(
            "
            SELECT p.resource, p.action
            FROM group_permissions gp
            JOIN groups g ON g.id = gp.group_id
            JOIN permissions p ON p.id = gp.permission_id
            WHERE g.name = $1
            ORDER BY p.resource, p.action
            ",
        )
        .bind(group_name)
        .fetch_all(executor)
        .await?)
    }
}

/// 权限目录的数据库操作
pub struct PermissionModel;

impl PermissionModel {
    /// 确保目录中存在 (resource, action) 权限行
    pub async fn ensure<'c>(tx: &mut PgTransaction<'c>, resource: &str, action: &str) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO permissions (resource, action)
            VALUES ($1, $2)
            ON CONFLICT (resource, action) DO NOTHING
            ",
        )
        .bind(resource)
        .bind(action)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    pub async fn all_ids<'a, E: PgExecutor<'a>>(executor: E) -> Result<Vec<i64>> {
        Ok(sqlx::query_scalar("SELECT id FROM permissions ORDER BY id")
            .fetch_all(executor)
            .await?)
    }

    pub async fn find_id<'a, E: PgExecutor<'a>>(
        executor: E,
        resource: &str,
        action: &str,
    ) -> Result<Option<i64>> {
        Ok(
            sqlx::query_scalar("SELECT id FROM permissions WHERE resource = $1 AND action = $2")
                .bind(resource)
                .bind(action)
                .fetch_optional(executor)
                .await?,
        )
    }
}
