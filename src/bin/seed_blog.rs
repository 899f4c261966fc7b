//! 运维命令：填充示例用户、文章、标签和评论（可重复执行）

#[tokio::main]
async fn main() {
    let pool = blogapi::storage::init_db_from_env().await;

    if let Err(e) = blogapi::bootstrap::seed_blog(&pool).await {
        eprintln!("❌ Seed failed: {e}");
        std::process::exit(1);
    }
}
