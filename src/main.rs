//! kafka-facade - Simple Kafka consumer and producer
//!
#![doc = "Main entry point for the kafka-facade command-line tool."]

use anyhow::Result;

use kafka_facade::cli::{Cli, Commands};
use kafka_facade::commands;
use kafka_facade::config::Config;
use kafka_facade::logging::init_logging;
use kafka_facade::metrics::init_metrics_exporter;
use kafka_facade::Client;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli.logging_config())?;
    init_metrics_exporter();

    // File, then environment, then command-line flags
    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);

    let client = Client::new(config);

    let result = match cli.command {
        Commands::Receive { count } => {
            let mut stdout = std::io::stdout();
            tokio::select! {
                result = commands::receive::run_receive(&client, count, &mut stdout) => {
                    result.map(|received| {
                        tracing::info!(received, "Receive finished");
                    })
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted; shutting down");
                    Ok(())
                }
            }
        }
        Commands::Send {
            value,
            key,
            partition,
            asynchronous,
        } => {
            let message = commands::send::build_message(&value, key.as_deref(), partition);
            commands::send::run_send(&client, &message, asynchronous).await
        }
    };

    client.close().await;
    result
}
