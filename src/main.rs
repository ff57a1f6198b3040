// region:    --- Imports
use anyhow::Context;
use auction_store::config::{self, StoreBackend};
use auction_store::handlers;
use auction_store::state::AppState;
use auction_store::store::{MemoryStore, RedisStore, SearchIndex, Store};
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let cfg = config::load_config()?;
    info!("{:<12} --> 설정 로드: {:?}", "Main", cfg.store.backend);

    // 저장소 연결 (연결 하나를 만들어 모든 저장소 객체에 주입)
    let mut redis: Option<Arc<RedisStore>> = None;
    let (store, index): (Arc<dyn Store>, Arc<dyn SearchIndex>) = match cfg.store.backend {
        StoreBackend::Redis => {
            let connected = Arc::new(
                RedisStore::connect(&cfg.store.redis_url)
                    .await
                    .with_context(|| format!("Redis 연결 실패: {}", cfg.store.redis_url))?,
            );
            info!("{:<12} --> Redis 연결 성공: {}", "Main", cfg.store.redis_url);
            redis = Some(Arc::clone(&connected));
            let store: Arc<dyn Store> = connected.clone();
            let index: Arc<dyn SearchIndex> = connected;
            (store, index)
        }
        StoreBackend::Memory => {
            warn!("{:<12} --> 메모리 저장소 사용 (단일 프로세스 전용)", "Main");
            let memory = Arc::new(MemoryStore::new());
            let store: Arc<dyn Store> = memory.clone();
            let index: Arc<dyn SearchIndex> = memory;
            (store, index)
        }
    };

    let state = AppState::new(store, index, cfg.lock.clone());

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = handlers::routes(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024));

    // 리스너 생성
    let listener = TcpListener::bind(cfg.api.address())
        .await
        .with_context(|| format!("리스너 생성 실패: {}", cfg.api.address()))?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행 (Ctrl+C로 종료)
    if let Err(err) = axum::serve(listener, routes_all.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("{:<12} --> Server error: {}", "Main", err);
    }

    if let Some(redis) = redis {
        redis.disconnect();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("{:<12} --> 종료 신호 대기 실패: {:?}", "Main", e);
    }
    info!("{:<12} --> 종료 신호 수신", "Main");
}
// endregion: --- Main
