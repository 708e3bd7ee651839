//! agent-handshake - CLI entry point
//!
//! Connects the configured inviter and invitee agents and prints the outcome
//! as JSON on stdout.

use agent_handshake::{config::Config, Orchestrator};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stderr, so stdout stays machine-readable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_handshake=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        inviter = %config.inviter.base_url,
        invitee = %config.invitee.base_url,
        "Loaded configuration"
    );

    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to build agent clients")?;
    let options = orchestrator.options();
    info!(
        alias = options.alias.as_deref().unwrap_or(""),
        target_state = %options.target_state,
        correlation = ?options.correlation,
        poll = ?options.poll,
        run_timeout = ?options.run_timeout,
        "Handshake options"
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, aborting handshake");
            ctrl_c_cancel.cancel();
        }
    });

    let outcome = orchestrator
        .run(cancel)
        .await
        .context("Connection handshake failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
