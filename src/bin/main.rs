use loan_origination_orchestrator::{
    agent::{Lookups, Orchestrator},
    audit::AuditLog,
    config::{AppConfig, UnderwritingPolicy},
    sanction::SanctionLetterWriter,
    state::InMemorySessionStore,
    underwriting::UnderwritingEngine,
    verification::create_default_verification_engine,
};
use std::sync::Arc;
use tracing::info;

/// A pre-approved applicant walking through the whole flow
const SCRIPT: [&str; 11] = [
    "Hi",
    "Rajesh Kumar",
    "9876543210",
    "500000",
    "24 months",
    "Salaried",
    "75000",
    "ok",
    "ok",
    "ok",
    "Thank you!",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Loan Origination Orchestrator demo starting");

    let config = AppConfig::from_env()?;

    let orchestrator = Orchestrator::new(
        Arc::new(InMemorySessionStore::new()),
        create_default_verification_engine(),
        UnderwritingEngine::new(UnderwritingPolicy::default()),
        Lookups::seeded(),
        Arc::new(SanctionLetterWriter::new(config.sanction_letter_dir)),
        Arc::new(AuditLog::new()),
    );

    let session_id = "demo-session";

    println!("\n=== CONVERSATION ===");
    for message in SCRIPT {
        let turn = orchestrator.handle_turn(session_id, message).await?;
        println!("\nUser: {}", message);
        println!("Assistant [{}]: {}", turn.phase, turn.message);
    }

    println!("\n=== AUDIT TRAIL ===");
    for record in orchestrator.audit_log().list_for_session(session_id).await? {
        let intact = orchestrator
            .audit_log()
            .verify_integrity(record.audit_id)
            .await?;
        println!(
            "  {} {} hash={} intact={}",
            record.created_at.to_rfc3339(),
            record.outcome.label(),
            record.context_hash.get(..12).unwrap_or_default(),
            intact
        );
    }

    if let Some(artifact) = orchestrator
        .snapshot(session_id)
        .await?
        .and_then(|record| record.artifact)
    {
        println!("\nSanction letter: {}", artifact.location);
    }

    Ok(())
}
