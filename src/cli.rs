//! Command-line interface definition for kafka-facade
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to receive and send messages.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::logging::LoggingConfig;

/// kafka-facade - Simple Kafka consumer and producer
///
/// Receive from or send to every configured topic with one consumer group.
#[derive(Parser, Debug, Clone)]
#[command(name = "kafka-facade")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Comma-separated broker addresses (overrides config)
    #[arg(long)]
    pub servers: Option<String>,

    /// Comma-separated topic names (overrides config)
    #[arg(long)]
    pub topics: Option<String>,

    /// Consumer group identifier (overrides config)
    #[arg(short, long)]
    pub group_id: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for kafka-facade
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Receive messages and print each one as a JSON line
    Receive {
        /// Stop after this many messages
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Send one message to every configured topic
    Send {
        /// Message payload
        #[arg(long)]
        value: String,

        /// Message key
        #[arg(short, long)]
        key: Option<String>,

        /// Explicit partition
        #[arg(short, long)]
        partition: Option<i32>,

        /// Enqueue without waiting for broker acknowledgement
        #[arg(long = "async")]
        asynchronous: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(servers) = &self.servers {
            config.servers = servers.clone();
        }
        if let Some(topics) = &self.topics {
            config.topics = topics.clone();
        }
        if let Some(group_id) = &self.group_id {
            config.group_id = group_id.clone();
        }
    }

    /// Logging configuration requested on the command line.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json_format: self.json_logs,
            file_path: self.log_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_receive_command() {
        let cli = Cli::try_parse_from(["kafka-facade", "receive"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config/config.yaml"));
        assert!(matches!(cli.command, Commands::Receive { count: None }));
    }

    #[test]
    fn test_cli_parse_receive_with_count() {
        let cli = Cli::try_parse_from(["kafka-facade", "receive", "-n", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Receive { count: Some(5) }));
    }

    #[test]
    fn test_cli_parse_send_command() {
        let cli = Cli::try_parse_from([
            "kafka-facade",
            "send",
            "--value",
            "hello",
            "--key",
            "k1",
            "--async",
        ])
        .unwrap();

        if let Commands::Send {
            value,
            key,
            partition,
            asynchronous,
        } = cli.command
        {
            assert_eq!(value, "hello");
            assert_eq!(key, Some("k1".to_string()));
            assert_eq!(partition, None);
            assert!(asynchronous);
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn test_cli_send_requires_value() {
        let cli = Cli::try_parse_from(["kafka-facade", "send"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_global_overrides() {
        let cli = Cli::try_parse_from([
            "kafka-facade",
            "--servers",
            "b1:9092,b2:9092",
            "--topics",
            "t1,t2",
            "--group-id",
            "g9",
            "receive",
        ])
        .unwrap();

        let mut config = Config::new("g1", "old:9092", "old");
        cli.apply_overrides(&mut config);

        assert_eq!(config.servers, "b1:9092,b2:9092");
        assert_eq!(config.topics, "t1,t2");
        assert_eq!(config.group_id, "g9");
    }

    #[test]
    fn test_cli_overrides_leave_unset_fields() {
        let cli = Cli::try_parse_from(["kafka-facade", "receive"]).unwrap();
        let mut config = Config::new("g1", "b1:9092", "t1");
        cli.apply_overrides(&mut config);
        assert_eq!(config, Config::new("g1", "b1:9092", "t1"));
    }

    #[test]
    fn test_cli_logging_config() {
        let cli = Cli::try_parse_from([
            "kafka-facade",
            "--log-level",
            "debug",
            "--json-logs",
            "receive",
        ])
        .unwrap();

        let logging = cli.logging_config();
        assert_eq!(logging.level, "debug");
        assert!(logging.json_format);
        assert_eq!(logging.file_path, None);
    }
}
