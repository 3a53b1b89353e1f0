//! Rollup prover.
//!
//! Follows the rollup contract on L1 and keeps every proposed block on its way to
//! verification:
//!
//! 1. Resolve the L1 block to resume from
//! 2. Poll rollup events from L1
//! 3. Prove assigned (and, optionally, expired) blocks with the right tier
//! 4. Contest transitions that disagree with the local L2 chain
//! 5. Defend contested transitions with a higher tier proof
//!
//! ## Architecture
//!
//! ```text
//!   L1 node        Prover                L2 node      Attestation host
//!   |                |                     |                 |
//!   |--events------->|                     |                 |
//!   |                |--header/transition->|                 |
//!   |                |<-------header-------|                 |
//!   |                |                     |                 |
//!   |                |--request proof----------------------->|
//!   |                |<-------proof--------------------------|
//!   |                |                     |                 |
//!   |<--proveBlock---|                     |                 |
//!   |---receipt----->|                     |                 |
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::bail;
use clap::Parser;
use futures::future::select_all;
use rollup_prover::{Collaborators, Config, Prover};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rollup-prover")]
#[command(about = "Prove, contest and defend rollup block transitions")]
struct Cli {
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Arc::new(Config::load(&cli.config)?);

    info!(
        l1 = %config.l1_http_endpoint,
        l2 = %config.l2_http_endpoint,
        prover = %config.prover_address,
        guardian = config.is_guardian(),
        contester_mode = config.contester_mode,
        prove_unassigned_blocks = config.prove_unassigned_blocks,
        "Loaded configuration"
    );

    let shutdown_token = CancellationToken::new();

    let collaborators = Collaborators::from_config(&config, &shutdown_token)?;
    let prover = Prover::init(config, collaborators, &shutdown_token).await?;

    let handles = prover.spawn(&shutdown_token);

    info!("All services started, waiting for shutdown signal");

    let mut signals: Vec<_> = [SignalKind::interrupt(), SignalKind::terminate()]
        .into_iter()
        .filter_map(|kind| signal(kind).ok())
        .collect();

    if signals.is_empty() {
        bail!("No shutdown signals could be registered");
    }

    let _ = select_all(signals.iter_mut().map(|s| Box::pin(s.recv()))).await;

    info!("Received shutdown signal, shutting down");

    shutdown_token.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    prover.tracker().cancel_all().await;

    info!("All services stopped, exiting");

    Ok(())
}
