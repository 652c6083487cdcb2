//! Albor Space LTE eNodeB uplink loopback
//!
//! Runs PUSCH encode, channel and decode for every UE of a scenario and
//! reports block error rates.

mod channel;
mod config;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use config::ScenarioConfig;
use session::run_session;

/// Albor Space LTE eNodeB PUSCH loopback
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to scenario file (.yml, .yaml or .toml)
    #[arg(short, long, default_value = "enb.yml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Subframes per UE, overrides the scenario
    #[arg(long)]
    subframes: Option<u32>,

    /// Channel SNR in dB, overrides the scenario
    #[arg(long, allow_hyphen_values = true)]
    snr_db: Option<f32>,

    /// Disable channel noise
    #[arg(long, conflicts_with = "snr_db")]
    noiseless: bool,

    /// Random seed, overrides the scenario
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space LTE eNodeB PUSCH loopback");
    info!("Configuration file: {}", args.config);

    let mut scenario = ScenarioConfig::from_file(&args.config)?;
    if let Some(subframes) = args.subframes {
        scenario.sim.subframes = subframes;
    }
    if let Some(snr_db) = args.snr_db {
        scenario.sim.snr_db = Some(snr_db);
    }
    if args.noiseless {
        scenario.sim.snr_db = None;
    }
    if let Some(seed) = args.seed {
        scenario.sim.seed = seed;
    }

    let cell = scenario.cell;
    info!("Cell configuration:");
    info!("  PCI: {}", cell.id.0);
    info!("  Bandwidth: {} PRB", cell.nof_prb);
    info!("  Cyclic prefix: {:?}", cell.cp);
    info!("  Subframes per UE: {}", scenario.sim.subframes);
    match scenario.sim.snr_db {
        Some(snr) => info!("  SNR: {} dB", snr),
        None => info!("  SNR: noiseless"),
    }

    // One blocking task per UE, each with its own PUSCH context
    let handles: Vec<_> = scenario
        .ues
        .iter()
        .cloned()
        .map(|ue| {
            let sim = scenario.sim.clone();
            tokio::task::spawn_blocking(move || run_session(cell, ue, sim))
        })
        .collect();

    let mut failed = 0;
    let mut lost = 0;
    let mut blocks = 0;
    for handle in handles {
        match handle.await? {
            Ok(report) => {
                blocks += report.blocks;
                lost += report.lost;
                info!(
                    "UE 0x{:04x}: delivered {}/{} blocks, {} UCI errors, residual BLER {:.4}",
                    report.rnti,
                    report.delivered,
                    report.blocks,
                    report.uci_errors,
                    report.residual_bler()
                );
            }
            Err(e) => {
                error!("UE session error: {:#}", e);
                failed += 1;
            }
        }
    }

    info!("Loopback complete: {} blocks, {} lost", blocks, lost);
    if failed > 0 {
        return Err(anyhow::anyhow!("{} UE sessions failed", failed));
    }
    Ok(())
}
