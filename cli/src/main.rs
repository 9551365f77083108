//! chainfeed — receive a blockchain state-history stream and republish it
//! as decoded in-process events.
//!
//! ```text
//! chainfeed --data-dir /var/lib/chainfeed --host localhost --port 8080
//! ```
//!
//! The process exits 0 on a requested shutdown and non-zero on any fatal
//! decode, link-break, store or transport error; an external supervisor is
//! expected to restart it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chainfeed_receiver::{build, install_receiver, ReceiverConfig};

#[derive(Parser)]
#[command(
    name = "chainfeed",
    about = "State-history stream receiver",
    version
)]
struct Cli {
    /// Directory holding receiver state (required)
    #[arg(long)]
    data_dir: PathBuf,

    /// Host to connect to (state-history endpoint)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to connect to
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// State database size in MB
    #[arg(long, default_value_t = 1024)]
    receiver_state_db_size: u64,

    /// Report current state every N blocks (0 disables)
    #[arg(long, default_value_t = 10_000)]
    report_every: u32,

    /// Maximum event queue depth before the reader pauses
    #[arg(long, default_value_t = 10_000)]
    max_queue_size: usize,

    /// Log filter, e.g. "info" or "chainfeed_receiver=debug"
    #[arg(long, default_value = "info")]
    log: String,
}

impl Cli {
    fn into_config(self) -> ReceiverConfig {
        ReceiverConfig {
            host: self.host,
            port: self.port,
            data_dir: self.data_dir,
            state_db_size_mb: self.receiver_state_db_size,
            report_every: self.report_every,
            max_queue_size: self.max_queue_size,
            ..Default::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => {
            info!("receiver stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "receiver failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.into_config();
    let (receiver, handle) = build(config).context("failed to open receiver state")?;

    install_receiver(handle.clone()).context("receiver already installed")?;

    // ctrl-c maps to a clean abort: close the stream, drop the in-flight
    // session, exit at the next reactor idle
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            handle.abort_receiver();
        }
    });

    receiver.run().await.context("receiver terminated")
}
