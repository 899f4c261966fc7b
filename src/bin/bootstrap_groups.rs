//! 运维命令：创建默认组并赋权（可重复执行）

#[tokio::main]
async fn main() {
    let pool = blogapi::storage::init_db_from_env().await;

    if let Err(e) = blogapi::bootstrap::bootstrap_groups(&pool).await {
        eprintln!("❌ Bootstrap failed: {e}");
        std::process::exit(1);
    }

    println!("Done.");
}
