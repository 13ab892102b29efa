use pulse_session::config::Config;
use pulse_session::engine::{Coordinator, DenyListFilter};
use pulse_session::registry::SessionRegistry;
use pulse_session::server::{router, AppState};
use pulse_session::storage::{MemoryStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Live sessions with no connections are evicted after this long.
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MAX_IDLE: Duration = Duration::from_secs(30 * 60);

#[tokio::main]
pub async fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pulse_session=debug,server=debug"));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .init();

    let config = Config::from_env();

    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let registry = Arc::new(SessionRegistry::new());
    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        registry.clone(),
        Arc::new(DenyListFilter::permissive()),
    ));

    tokio::spawn({
        let registry = registry.clone();
        async move {
            let mut ticker = tokio::time::interval(IDLE_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let purged = registry.purge_idle(MAX_IDLE).await;
                if purged > 0 {
                    info!(purged, "evicted idle sessions");
                }
            }
        }
    });

    let app = router(AppState { coordinator, store });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");
    info!("listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await.expect("server error");
}
