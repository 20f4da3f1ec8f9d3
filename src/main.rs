//! Sekai Client - account bootstrap against the game API
//!
//! Loads the session configuration, runs the operation sequence and hands the
//! rule agreement response to disk.

use anyhow::Context;
use sekai_client::cli::Cli;
use sekai_client::client::{Body, HttpTransport};
use sekai_client::{ClientError, GameClient, SessionConfig, SessionState};
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

/// Main application entry point
fn run() -> i32 {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to start async runtime");
            return 1;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!("{err:#}");
            err.downcast_ref::<ClientError>()
                .map_or(1, ClientError::exit_code)
        }
    }
}

/// Install the stderr log subscriber
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the bootstrap sequence
async fn execute(cli: Cli) -> anyhow::Result<()> {
    tracing::debug!("Sekai Client v{}", sekai_client::VERSION);

    let config = match &cli.config {
        Some(path) => SessionConfig::load_from(path)?,
        None => SessionConfig::load()?,
    };

    let state = SessionState::from_config(&config)?;
    let transport = HttpTransport::new(&config.http)?;
    let client = GameClient::new(transport, state);

    let report = client.run().await?;

    if let Some(path) = &cli.agreement_out {
        let body = report.rule_agreement.as_ref().map(Body::to_json);
        let json = serde_json::to_string_pretty(&body)
            .context("Failed to serialize rule agreement response")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "rule agreement saved");
    }

    let state = client.snapshot();
    tracing::info!(
        user_id = ?state.user.as_ref().map(|user| user.user_id),
        asset_version = %state.versions.asset_version,
        cookies = state.cookies.len(),
        "bootstrap complete"
    );

    Ok(())
}
