use std::sync::Arc;

use vouch::config::RulesConfig;
use vouch::notify::WebhookNotifier;
use vouch::pipeline::MessageProcessor;
use vouch::store::{
    EndorsementStore, LibSqlStore, MemoryRequestLog, ProviderStore, RequestLog,
};
use vouch::webhook::message_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let bind = std::env::var("VOUCH_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let hook_token = std::env::var("VOUCH_HOOK_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: VOUCH_HOOK_TOKEN not set");
        eprintln!("  export VOUCH_HOOK_TOKEN=<shared secret>");
        std::process::exit(1);
    });

    // ── Rules ────────────────────────────────────────────────────────────
    let rules = match std::env::var("VOUCH_RULES_PATH") {
        Ok(path) => RulesConfig::from_path(std::path::Path::new(&path)).unwrap_or_else(|e| {
            eprintln!("Error: Failed to load rules from {}: {}", path, e);
            std::process::exit(1);
        }),
        Err(_) => RulesConfig::default(),
    };

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::env::var("VOUCH_DB_PATH").unwrap_or_else(|_| "./data/vouch.db".to_string());
    let store = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );
    let providers: Arc<dyn ProviderStore> = store.clone();
    let endorsements: Arc<dyn EndorsementStore> = store;
    // Requests only matter within the attribution window; kept in memory
    // and evicted once they age past it.
    let requests: Arc<dyn RequestLog> =
        Arc::new(MemoryRequestLog::with_retention(rules.processor.request_window_secs));

    eprintln!("vouch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", db_path);
    eprintln!("   Ingress: http://{}/v1/messages", bind);

    // ── Pipeline ─────────────────────────────────────────────────────────
    let mut processor = MessageProcessor::new(&rules, providers, endorsements, requests)?;
    if let Ok(url) = std::env::var("VOUCH_NOTIFY_URL") {
        eprintln!("   Notifier: {}", url);
        processor = processor.with_notifier(Arc::new(WebhookNotifier::new(url)));
    }

    let app = message_routes(
        Arc::new(processor),
        secrecy::SecretString::from(hook_token),
    );
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "Ingress server started");
    axum::serve(listener, app).await?;
    Ok(())
}
