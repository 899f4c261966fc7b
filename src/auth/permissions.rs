use super::CurrentUser;

pub const ADMIN_GROUP: &str = "admin";
pub const WRITER_GROUP: &str = "writer";
pub const USER_GROUP: &str = "user";

/// 用户是否属于指定组
///
/// 未认证恒为 false，超级用户恒为 true，否则按组名精确匹配。
pub fn user_in_group(user: Option<&CurrentUser>, name: &str) -> bool {
    let Some(user) = user else {
        return false;
    };
    if user.is_superuser {
        return true;
    }
    user.groups.iter().any(|g| g == name)
}

/// 用户是否属于任意一个给定组
pub fn user_in_any_group(user: Option<&CurrentUser>, names: &[&str]) -> bool {
    names.iter().any(|name| user_in_group(user, name))
}

/// 对象级写权限：admin 组成员可改任意对象，其余只能改自己的
///
/// 调用方必须先取到目标行再判定，保证未知 id 返回 404 而不是 403。
pub fn owner_or_admin(user: &CurrentUser, owner_id: i64) -> bool {
    if user_in_group(Some(user), ADMIN_GROUP) {
        return true;
    }
    user.id == owner_id
}
