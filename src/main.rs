//! mtf-snapshot binary
//!
//! Usage:
//!   mtf-snapshot snapshot <PAIR> [--prompt]
//!   mtf-snapshot serve            (requires the `server` feature)

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use mtf_snapshot::config::AppConfig;
use mtf_snapshot::market_data::RoutedSource;
use mtf_snapshot::pipeline::SnapshotAssembler;
use mtf_snapshot::prompt::build_analysis_prompt;

fn init_logging(cfg: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    init_logging(&cfg);

    tracing::info!(config = %cfg, "Configuration loaded");
    for key in cfg.missing_keys() {
        tracing::warn!("{} is not set, requests routed to that provider will fail", key);
    }

    let source = RoutedSource::from_config(&cfg.providers, &cfg.routing);
    let assembler = SnapshotAssembler::from_config(source, &cfg.snapshot)
        .context("Failed to build snapshot assembler")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("snapshot") => {
            let pair = args.get(1).context("usage: mtf-snapshot snapshot <PAIR> [--prompt]")?;
            let snapshot = assembler.assemble(pair).await?;
            if args.iter().any(|a| a == "--prompt") {
                println!("{}", build_analysis_prompt(&snapshot)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Ok(())
        }
        Some("serve") => serve(assembler, &cfg).await,
        _ => bail!("usage: mtf-snapshot <snapshot <PAIR> [--prompt] | serve>"),
    }
}

#[cfg(feature = "server")]
async fn serve(assembler: SnapshotAssembler<RoutedSource>, cfg: &AppConfig) -> Result<()> {
    mtf_snapshot::server::start_server(
        std::sync::Arc::new(assembler),
        &cfg.server.host,
        cfg.server.port,
    )
    .await
}

#[cfg(not(feature = "server"))]
async fn serve(_assembler: SnapshotAssembler<RoutedSource>, _cfg: &AppConfig) -> Result<()> {
    bail!("built without the `server` feature")
}
