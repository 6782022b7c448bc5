use loan_origination_orchestrator::{
    agent::{Lookups, Orchestrator},
    api::start_server,
    audit::AuditLog,
    config::{AppConfig, UnderwritingPolicy},
    gemini::GeminiClient,
    sanction::SanctionLetterWriter,
    state::{InMemorySessionStore, PostgresSessionStore, SessionPolicy, SessionStore},
    underwriting::UnderwritingEngine,
    verification::create_default_verification_engine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("🚀 Loan Origination Orchestrator - API Server");
    info!("📍 Port: {}", config.port);

    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            info!("Using Postgres session store");
            Arc::new(PostgresSessionStore::connect_lazy(url)?)
        }
        None => {
            info!("Using in-memory session store");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let session_policy = match config.session_idle_ttl {
        Some(ttl) => SessionPolicy::with_idle_ttl(ttl),
        None => SessionPolicy::default(),
    };

    let mut orchestrator = Orchestrator::new(
        store,
        create_default_verification_engine(),
        UnderwritingEngine::new(UnderwritingPolicy::default()),
        Lookups::seeded(),
        Arc::new(SanctionLetterWriter::new(config.sanction_letter_dir.clone())),
        Arc::new(AuditLog::new()),
    )
    .with_session_policy(session_policy);

    match &config.gemini_api_key {
        Some(key) => {
            orchestrator = orchestrator.with_free_text(Arc::new(GeminiClient::new(key.clone())?));
            info!("Free-text fallback enabled");
        }
        None => warn!("GEMINI_API_KEY not set, free-text fallback disabled"),
    }

    let orchestrator = Arc::new(orchestrator);

    if config.session_idle_ttl.is_some() {
        let purger = orchestrator.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = purger.purge_expired().await {
                    warn!(error = %e, "Idle session purge failed");
                }
            }
        });
    }

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
