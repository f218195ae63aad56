//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Pre-populate hbase.
#[derive(Debug, Clone, Parser)]
#[command(name = "populate-hbase", version, about = "Pre-populate hbase.")]
pub struct Config {
    /// The flag to write on successful completion.
    #[arg(short = 'c', long)]
    pub completed_flag: Option<PathBuf>,

    /// Use the specified data key service.
    #[arg(short = 'k', long)]
    pub data_key_service: Option<String>,

    /// Remove the output file.
    #[arg(short = 'o', long)]
    pub remove_output_file: Option<PathBuf>,

    /// The zookeeper quorum host; the REST gateway is expected on this host.
    #[arg(short = 'z', long, default_value = "hbase")]
    pub zookeeper_quorum: String,

    /// Port of the column store REST gateway.
    #[arg(long, default_value_t = 8080)]
    pub rest_port: u16,

    /// File containing the test config for sample data.
    #[arg(short = 'f', long)]
    pub test_configuration_file: PathBuf,

    /// Write every record to this table instead of one table per collection.
    #[arg(long)]
    pub data_table: Option<String>,

    /// Table holding a message counter per topic.
    #[arg(long)]
    pub topics_table: Option<String>,

    /// Never create tables.
    #[arg(long)]
    pub skip_table_creation: bool,

    /// Log every cell of the touched tables once loading is done.
    #[arg(long)]
    pub dump_contents: bool,

    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 100)]
    pub max_attempts: u32,

    /// Seconds between connection attempts.
    #[arg(long, default_value_t = 3)]
    pub retry_delay_secs: u64,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
