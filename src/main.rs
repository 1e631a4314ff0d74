//! Upstream relay
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   UPSTREAM RELAY                     │
//!                     │                                                      │
//!   Client Request    │  ┌────────────┐   ┌──────────┐   ┌──────────────┐    │
//!   ──────────────────┼─▶│ correlation│──▶│ handlers │──▶│ posts service│    │
//!                     │  │ middleware │   │          │   └──────┬───────┘    │
//!                     │  └────────────┘   └──────────┘          │            │
//!                     │                                         ▼            │
//!                     │                                 ┌──────────────┐     │
//!                     │                                 │  aggregator  │     │
//!                     │                                 │ (fan-out +   │     │
//!                     │                                 │  cancel)     │     │
//!                     │                                 └──────┬───────┘     │
//!                     │                                        ▼             │
//!   Client Response   │  ┌────────────┐                 ┌──────────────┐     │
//!   ◀─────────────────┼──│  response  │◀────────────────│bounded caller│◀────┼── Upstream
//!                     │  │  mapping   │                 │  (deadline)  │     │   API
//!                     │  └────────────┘                 └──────────────┘     │
//!                     │                                                      │
//!                     │  config · context · observability · lifecycle        │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use upstream_relay::lifecycle::{self, signals, Shutdown};

#[derive(Parser, Debug)]
#[command(
    name = "upstream-relay",
    version,
    about = "Relay inbound requests to an upstream JSON API"
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = lifecycle::resolve_config(cli.config.as_deref(), |key| std::env::var(key).ok())?;

    let shutdown = Shutdown::new();
    signals::forward_stop_signal(shutdown.clone());

    lifecycle::run(config, &shutdown).await?;
    Ok(())
}
