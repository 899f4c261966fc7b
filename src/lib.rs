pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod state;
pub mod storage;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use auth::TokenKeys;
use state::AppState;

pub async fn run() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("BLOGAPI_LOG"))
        .init();

    let state = AppState::new(storage::init_db_from_env().await, TokenKeys::from_env());

    api::run_server(state).await
}
