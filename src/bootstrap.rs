//! 运维命令的实现：组/权限引导与示例数据填充
//!
//! 两者都要求可重复执行：引导总是计算期望权限集并整体替换，
//! 填充对每条数据做 get-or-create。

use crate::auth;
use crate::auth::permissions::{ADMIN_GROUP, USER_GROUP, WRITER_GROUP};
use crate::error::Result;
use crate::storage::{
    ArticleModel, CommentModel, DBPool, GroupModel, PermissionModel, UserModel,
};

/// 当前模式中的资源，权限目录按此在运行时重算
pub const RESOURCES: &[&str] = &["user", "profile", "group", "article", "tag", "comment"];

/// 每种资源的动作集合
pub const ACTIONS: &[&str] = &["add", "change", "delete", "view"];

/// writer/user 组的固定 (resource, action) 白名单
///
/// admin 不在表中：它持有整个权限目录。
pub fn group_grants() -> [(&'static str, Vec<(&'static str, &'static str)>); 2] {
    [
        (WRITER_GROUP, vec![("article", "add"), ("comment", "add")]),
        (USER_GROUP, vec![("comment", "add")]),
    ]
}

/// 幂等地创建三个组并赋权
///
/// 权限集用"整体替换"而不是增量添加，重复执行结果一致。
pub async fn bootstrap_groups(pool: &DBPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for &resource in RESOURCES {
        for &action in ACTIONS {
            PermissionModel::ensure(&mut tx, resource, action).await?;
        }
    }

    let admin_id = GroupModel::get_or_create(&mut tx, ADMIN_GROUP).await?;
    let all = PermissionModel::all_ids(tx.as_mut()).await?;
    GroupModel::set_permissions(&mut tx, admin_id, &all).await?;
    println!("✓ Group '{ADMIN_GROUP}' -> ALL permissions ({})", all.len());

    for (name, pairs) in group_grants() {
        let group_id = GroupModel::get_or_create(&mut tx, name).await?;

        let mut ids = Vec::with_capacity(pairs.len());
        for &(resource, action) in &pairs {
            let id = PermissionModel::find_id(tx.as_mut(), resource, action)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            ids.push(id);
        }

        GroupModel::set_permissions(&mut tx, group_id, &ids).await?;
        println!("✓ Group '{name}' -> {} perms", ids.len());
    }

    tx.commit().await?;
    Ok(())
}

const UNSPLASH_1: &str = "https://images.unsplash.com/photo-1500530855697-b586d89ba3ee?auto=format&fit=crop&w=1400&q=80";
const UNSPLASH_2: &str = "https://images.unsplash.com/photo-1507525428034-b723cf961d3e?auto=format&fit=crop&w=1400&q=80";

const AVATAR_1: &str = "https://i.pravatar.cc/150?img=12";
const AVATAR_2: &str = "https://i.pravatar.cc/150?img=32";

/// 填充示例用户、文章、标签和评论
///
/// 要求先执行 [`bootstrap_groups`]；组缺失时打印提示并提前返回，
/// 这是运维脚本的前置状态缺失，不算错误。
pub async fn seed_blog(pool: &DBPool) -> Result<()> {
    println!("Seeding blog data...");

    let admin_group = GroupModel::find_id(pool, ADMIN_GROUP).await?;
    let writer_group = GroupModel::find_id(pool, WRITER_GROUP).await?;
    let user_group = GroupModel::find_id(pool, USER_GROUP).await?;

    let (Some(admin_group), Some(writer_group), Some(user_group)) =
        (admin_group, writer_group, user_group)
    else {
        eprintln!("❌ Groups not found. Run: bootstrap_groups");
        return Ok(());
    };

    let mut tx = pool.begin().await?;

    // 用户：密码每次重置，其余字段 get-or-create
    let writer_admin = match UserModel::find_by_username(tx.as_mut(), "writeradmin").await? {
        Some(user) => user.id,
        None => {
            UserModel::create(
                &mut tx,
                "writeradmin",
                "writeradmin@example.com",
                &auth::hash_password("Admin123!")?,
                true,
                true,
            )
            .await?
        }
    };
    UserModel::set_password(tx.as_mut(), writer_admin, &auth::hash_password("Admin123!")?).await?;

    let traveler = match UserModel::find_by_username(tx.as_mut(), "traveler").await? {
        Some(user) => user.id,
        None => {
            UserModel::create(
                &mut tx,
                "traveler",
                "traveler@example.com",
                &auth::hash_password("User123!")?,
                false,
                false,
            )
            .await?
        }
    };
    UserModel::set_password(tx.as_mut(), traveler, &auth::hash_password("User123!")?).await?;

    UserModel::set_profile(
        tx.as_mut(),
        writer_admin,
        "Admin Writer",
        "Writes travel guides and featured posts.",
        Some(AVATAR_1),
    )
    .await?;
    UserModel::set_profile(
        tx.as_mut(),
        traveler,
        "Travel Lover",
        "Collecting stories from around the world.",
        Some(AVATAR_2),
    )
    .await?;

    GroupModel::attach_user(tx.as_mut(), writer_admin, admin_group).await?;
    GroupModel::attach_user(tx.as_mut(), writer_admin, writer_group).await?;
    GroupModel::attach_user(tx.as_mut(), traveler, user_group).await?;

    // 文章：按标题查重，存在则覆盖字段并重建标签集
    let article1 = seed_article(
        &mut tx,
        writer_admin,
        "Santorini in 3 Days: A First-Timer's Itinerary",
        "Whitewashed villages, cliffside sunsets, and calm morning walks in Oia.\n\n\
         Day 1: Oia + sunset viewpoints\n\
         Day 2: Fira to Oia hike + local food\n\
         Day 3: Beach time + winery stop\n",
        UNSPLASH_1,
        &["travel".to_string(), "europe".to_string()],
    )
    .await?;

    let article2 = seed_article(
        &mut tx,
        traveler,
        "Mykonos vs. Santorini: Which Greek Island Should You Visit?",
        "If you want nightlife and beach clubs, Mykonos wins.\n\
         If you want views, romance, and iconic scenery, choose Santorini.\n\n\
         This post breaks it down by budget, vibe, and season.",
        UNSPLASH_2,
        &["travel".to_string(), "beach".to_string()],
    )
    .await?;

    CommentModel::get_or_create(
        &mut tx,
        article1,
        traveler,
        "Love this itinerary, the Fira to Oia hike was the highlight for me.",
    )
    .await?;
    CommentModel::get_or_create(
        &mut tx,
        article2,
        writer_admin,
        "Great comparison. I'd add that shoulder season is the sweet spot for both islands.",
    )
    .await?;

    tx.commit().await?;

    println!("✅ Travel blog seed completed successfully");
    Ok(())
}

async fn seed_article<'c>(
    tx: &mut sqlx::PgTransaction<'c>,
    author_id: i64,
    title: &str,
    content: &str,
    image_url: &str,
    tags: &[String],
) -> Result<i64> {
    let id = match ArticleModel::find_by_title(tx.as_mut(), title).await? {
        Some(id) => {
            ArticleModel::update(tx, id, title, content, Some(image_url)).await?;
            id
        }
        None => ArticleModel::insert(tx, author_id, title, content, Some(image_url)).await?,
    };

    ArticleModel::clear_tags(tx, id).await?;
    ArticleModel::link_tags(tx, id, tags).await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_are_within_catalog() {
        for (_, pairs) in group_grants() {
            for (resource, action) in pairs {
                assert!(RESOURCES.contains(&resource), "未登记的资源: {resource}");
                assert!(ACTIONS.contains(&action), "未登记的动作: {action}");
            }
        }
    }

    #[test]
    fn test_desired_grants_are_stable() {
        // 期望状态是纯计算，两次结果必须一致
        assert_eq!(group_grants(), group_grants());
        assert_eq!(
            RESOURCES.len() * ACTIONS.len(),
            24,
            "权限目录应覆盖全部资源×动作"
        );
    }
}
