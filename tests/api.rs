//! 依赖真实数据库的用例会清空数据表，需用
//! `cargo test -- --ignored --test-threads=1` 串行执行。

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    http::{Method, Response, StatusCode},
};

use blogapi::{
    api,
    auth::TokenKeys,
    bootstrap,
    state::AppState,
    storage::{DBPool, GroupModel, init_db_from_env, migrate},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

struct TestApp {
    db: DBPool,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let db = init_db_from_env().await;

        migrate(&db, "sql/01-CREATE_TABLE.sql")
            .await
            .expect("初始化sql失败");

        Self::reset(&db).await;

        bootstrap::bootstrap_groups(&db)
            .await
            .expect("组引导失败");

        let state = AppState::new(db.clone(), TokenKeys::new(b"test-secret"));
        let router = api::setup_route(state);

        Self { db, router }
    }

    /// 清空所有表并重置自增 id
    async fn reset(db: &DBPool) {
        sqlx::query(
            "TRUNCATE TABLE users, groups, permissions, articles, tags, comments
             RESTART IDENTITY CASCADE",
        )
        .execute(db)
        .await
        .expect("清空数据失败");
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail")
    }

    /// 发送 JSON 请求并返回 (状态码, 响应体)
    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let req = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::new(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("请求构建失败");

        let resp = self.request(req).await;
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("读取数据失败");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/register/",
            None,
            Some(json!({ "username": username, "email": format!("{username}@example.com"), "password": password })),
        )
        .await
    }

    /// 登录并返回 access 令牌
    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/token/",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "登录失败: {username}");
        body["access"].as_str().expect("缺少 access 字段").to_owned()
    }

    async fn create_article(&self, token: &str, title: &str, tags: Value) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/articles/",
                Some(token),
                Some(json!({ "title": title, "content": format!("body of {title}"), "tags": tags })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "发表文章失败: {title}");
        body
    }

    /// 把用户加入指定组（测试后门，不经过 API）
    async fn attach_group(&self, username: &str, group: &str) {
        let user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.db)
            .await
            .expect("用户不存在");
        let group_id = GroupModel::find_id(&self.db, group)
            .await
            .expect("查询组失败")
            .expect("组不存在");
        GroupModel::attach_user(&self.db, user_id, group_id)
            .await
            .expect("加组失败");
    }

    async fn group_assignments(&self) -> Vec<(String, Vec<(String, String)>)> {
        let mut out = Vec::new();
        for name in ["admin", "writer", "user"] {
            let perms = GroupModel::assigned_permissions(&self.db, name)
                .await
                .expect("查询组权限失败");
            out.push((name.to_owned(), perms));
        }
        out
    }
}

fn tag_names(article: &Value) -> Vec<&str> {
    article["tags"]
        .as_array()
        .expect("缺少 tags 字段")
        .iter()
        .map(|t| t["name"].as_str().expect("标签缺少 name"))
        .collect()
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_api() {
    let app = TestApp::new().await;

    // 组引导幂等：重复执行后各组权限分配不变
    {
        let first = app.group_assignments().await;
        assert_eq!(first[0].1.len(), 24, "admin 组应持有全部权限目录");
        assert_eq!(first[1].1.len(), 2, "writer 组应持有两条白名单权限");
        assert_eq!(first[2].1.len(), 1, "user 组应持有一条白名单权限");

        bootstrap::bootstrap_groups(&app.db).await.expect("组引导失败");
        assert_eq!(first, app.group_assignments().await, "重复引导应为无操作");
    }

    // 注册与字段校验
    {
        let (status, body) = app.register("alice", "Alice123!").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "alice");

        let (status, body) = app.register("alice", "Other123!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "用户名重复应拒绝");
        assert_eq!(body["username"][0], "Username is already taken.");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/register/",
                None,
                Some(json!({ "username": "alice2", "email": "alice@example.com", "password": "Pass123!" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "邮箱重复应拒绝");
        assert_eq!(body["email"][0], "Email is already in use.");

        let (status, body) = app.register("shorty", "abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "密码过短应拒绝");
        assert!(body["password"][0].is_string());

        let (status, _) = app.register("bob", "Bob123!!").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app.register("carol", "Carol123!").await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // 令牌签发与换发
    let alice = {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/token/",
                None,
                Some(json!({ "username": "alice", "password": "wrong" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "错误密码应 401");

        let access = app.login("alice", "Alice123!").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/token/",
                None,
                Some(json!({ "username": "alice", "password": "Alice123!" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let refresh = body["refresh"].as_str().expect("缺少 refresh 字段");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/token/refresh/",
                None,
                Some(json!({ "refresh": refresh })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "refresh 应能换发 access");
        assert!(body["access"].is_string());

        let (status, _) = app
            .send(
                Method::POST,
                "/api/token/refresh/",
                None,
                Some(json!({ "refresh": access })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "access 不能当 refresh 用");

        access
    };

    // /me/：读取与部分更新
    {
        let (status, _) = app.send(Method::GET, "/api/me/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "未认证不能读 /me/");

        let (status, body) = app.send(Method::GET, "/api/me/", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["groups"], json!(["user"]), "注册即入默认组");
        assert_eq!(body["profile"]["display_name"], "", "资料应自动创建");

        let (status, body) = app
            .send(
                Method::PATCH,
                "/api/me/",
                Some(&alice),
                Some(json!({ "profile": { "display_name": "Alice A." } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["display_name"], "Alice A.");
        assert_eq!(body["profile"]["bio"], "", "未提供的资料字段应保持不变");

        // 头像：显式 null 清空，缺省不动
        let (status, body) = app
            .send(
                Method::PATCH,
                "/api/me/",
                Some(&alice),
                Some(json!({ "profile": { "avatar_url": "https://i.pravatar.cc/150?img=5" } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["avatar_url"], "https://i.pravatar.cc/150?img=5");

        let (status, body) = app
            .send(
                Method::PATCH,
                "/api/me/",
                Some(&alice),
                Some(json!({ "profile": { "bio": "hello" } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["profile"]["avatar_url"], "https://i.pravatar.cc/150?img=5",
            "缺省 avatar_url 应保持不变"
        );

        let (status, body) = app
            .send(
                Method::PATCH,
                "/api/me/",
                Some(&alice),
                Some(json!({ "profile": { "avatar_url": null } })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["profile"]["avatar_url"].is_null(), "显式 null 应清空头像");
    }

    // 文章：创建、标签规整、读取
    let article_id = {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/articles/",
                None,
                Some(json!({ "title": "t", "content": "c" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "未认证不能发文");

        let article = app
            .create_article(
                &alice,
                "First post",
                json!(["Travel", "travel", " Beach ", "", { "name": "Europe" }]),
            )
            .await;
        assert_eq!(article["author_name"], "alice", "作者强制为请求者");
        assert_eq!(tag_names(&article), vec!["Travel", "Beach", "Europe"]);

        let id = article["id"].as_i64().expect("缺少 id");
        let (status, body) = app
            .send(Method::GET, &format!("/api/articles/{id}/"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK, "读取对所有人开放");
        assert_eq!(body["title"], "First post");

        let (status, _) = app
            .send(Method::GET, "/api/articles/99999/", None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        id
    };

    // 标签更新语义：缺省不动，提供则整体替换
    {
        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "title": "First post (edited)" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            tag_names(&body),
            vec!["Travel", "Beach", "Europe"],
            "缺省 tags 应保留原关联"
        );

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "tags": ["Travel", { "name": "rust" }] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tag_names(&body), vec!["Travel", "rust"]);

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "tags": [] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(tag_names(&body).is_empty(), "空列表应清空关联");
    }

    // 封面图：显式 null 清空，缺省不动
    {
        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "image_url": "https://images.example.com/cover.jpg" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image_url"], "https://images.example.com/cover.jpg");

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "content": "updated body" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["image_url"], "https://images.example.com/cover.jpg",
            "缺省 image_url 应保持不变"
        );

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&alice),
                Some(json!({ "image_url": null })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["image_url"].is_null(), "显式 null 应清空封面图");
    }

    // 对象级权限：404 先于 403，非作者被拒，admin 组放行
    {
        let bob = app.login("bob", "Bob123!!").await;

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&bob),
                Some(json!({ "title": "hijack" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "非作者不能改");

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/articles/{article_id}/"),
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "非作者不能删");

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/articles/{article_id}/"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "First post (edited)", "被拒的写操作不应生效");

        let (status, _) = app
            .send(Method::DELETE, "/api/articles/99999/", Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "未知 id 是 404 而不是 403");

        app.attach_group("bob", "admin").await;
        let bob = app.login("bob", "Bob123!!").await;

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/articles/{article_id}/"),
                Some(&bob),
                Some(json!({ "title": "First post (moderated)" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin 组可改任意文章");
        assert_eq!(body["title"], "First post (moderated)");
    }

    // latest：恒为最新三篇，倒序
    {
        let mut ids = vec![article_id];
        for i in 2..=4 {
            let article = app
                .create_article(&alice, &format!("Post {i}"), json!([]))
                .await;
            ids.push(article["id"].as_i64().expect("缺少 id"));
        }

        let (status, body) = app
            .send(Method::GET, "/api/articles/latest/", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let latest: Vec<i64> = body
            .as_array()
            .expect("latest 应为数组")
            .iter()
            .map(|a| a["id"].as_i64().unwrap())
            .collect();
        let expected: Vec<i64> = ids.iter().rev().take(3).copied().collect();
        assert_eq!(latest, expected, "latest 应为最新三篇且倒序");
    }

    // 列表筛选与搜索
    {
        let article = app
            .create_article(&alice, "Tagged only", json!(["filter-me"]))
            .await;
        let tagged_id = article["id"].as_i64().unwrap();

        let (status, body) = app
            .send(Method::GET, "/api/articles/?tag=filter-me", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let hits = body.as_array().expect("列表应为数组");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"].as_i64().unwrap(), tagged_id);

        let (status, body) = app
            .send(Method::GET, "/api/articles/?search=tagged", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.as_array().unwrap().len(),
            1,
            "搜索应不区分大小写命中标题"
        );

        let (status, body) = app
            .send(Method::GET, "/api/articles/?limit=2&page=1", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2, "分页应限制条数");

        // 越界分页参数收敛而不是 500
        let (status, body) = app
            .send(Method::GET, "/api/articles/?limit=-1&page=0", None, None)
            .await;
        assert_eq!(status, StatusCode::OK, "负 limit 不应打穿查询");
        assert_eq!(body.as_array().unwrap().len(), 1, "limit 应收敛到下界");

        let (status, body) = app
            .send(
                Method::GET,
                "/api/articles/?page=2147483647&limit=2",
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "超大页码不应溢出");
        assert!(body.as_array().unwrap().is_empty(), "越界页应为空列表");
    }

    // 评论：创建、越权、admin 放行
    {
        let carol = app.login("carol", "Carol123!").await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/articles/99999/comments/",
                Some(&alice),
                Some(json!({ "content": "lost" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "未知文章下不能评论");

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/articles/{article_id}/comments/"),
                Some(&alice),
                Some(json!({ "content": "first!" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["author_name"], "alice");
        let comment_id = body["id"].as_i64().expect("缺少 id");

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/articles/{article_id}/comments/"),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "评论列表对所有人开放");
        assert_eq!(body.as_array().unwrap().len(), 1);

        // PUT 与 PATCH 等效，content 缺省时内容不变
        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/comments/{comment_id}/"),
                Some(&alice),
                Some(json!({ "content": "first! (edited)" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "作者应能 PUT 自己的评论");
        assert_eq!(body["content"], "first! (edited)");

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/comments/{comment_id}/"),
                Some(&alice),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "空载荷不应被拒");
        assert_eq!(body["content"], "first! (edited)", "缺省 content 应保持不变");

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/api/comments/{comment_id}/"),
                Some(&carol),
                Some(json!({ "content": "hijack" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "非作者不能改评论");

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/comments/{comment_id}/"),
                Some(&carol),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "非作者不能删评论");

        let bob = app.login("bob", "Bob123!!").await;
        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/comments/{comment_id}/"),
                Some(&bob),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT, "admin 组可删任意评论");
    }
}

#[tokio::test]
#[ignore = "API测试 依赖真实数据库"]
async fn test_seed_blog() {
    let db = init_db_from_env().await;

    migrate(&db, "sql/01-CREATE_TABLE.sql")
        .await
        .expect("初始化sql失败");
    TestApp::reset(&db).await;

    // 组缺失时提前返回且不写入任何数据
    bootstrap::seed_blog(&db).await.expect("种子脚本不应报错");
    let users: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
        .fetch_one(&db)
        .await
        .expect("统计失败");
    assert_eq!(users, 0, "组缺失时不应写入用户");

    bootstrap::bootstrap_groups(&db).await.expect("组引导失败");
    bootstrap::seed_blog(&db).await.expect("种子失败");
    bootstrap::seed_blog(&db).await.expect("重复种子失败");

    let users: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
        .fetch_one(&db)
        .await
        .expect("统计失败");
    let articles: i64 = sqlx::query_scalar("SELECT count(*) FROM articles")
        .fetch_one(&db)
        .await
        .expect("统计失败");
    let comments: i64 = sqlx::query_scalar("SELECT count(*) FROM comments")
        .fetch_one(&db)
        .await
        .expect("统计失败");
    assert_eq!((users, articles, comments), (2, 2, 2), "种子应幂等");

    // 种子账号可以正常登录
    let state = AppState::new(db.clone(), TokenKeys::new(b"test-secret"));
    let app = TestApp {
        db: db.clone(),
        router: api::setup_route(state),
    };
    let token = app.login("writeradmin", "Admin123!").await;
    let (status, body) = app.send(Method::GET, "/api/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_superuser"], true);
    assert_eq!(body["groups"], json!(["admin", "user", "writer"]));
}
