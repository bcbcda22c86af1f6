use std::fs::File;

use anyhow::{Context, Result};
use gabpay_ledger::{bin_utils::Service, config::LedgerConfig, processor::ErrorKind};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = LedgerConfig::from_env()?;
    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| {
            match err.kind() {
                ErrorKind::Validation | ErrorKind::InternalFailure => {
                    eprintln!("Error at line {line}: {}", err.user_message())
                }
                _ => {
                    // business rejections are already logged by the engine
                }
            }
        }),
    };
    service.run()
}
