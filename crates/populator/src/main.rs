//! `populate-hbase`: test record loader entry point.
//!
//! Startup sequence:
//! 1. Parse [`Config`] from the command line.
//! 2. Initialise structured JSON logging.
//! 3. Remove the completion flag and output file of an earlier run.
//! 4. Load every test record into the column store, retrying while it is
//!    unreachable, then create the completion flag.
//!
//! Exits `0` on success and `1` on any failure, including running out of
//! connection attempts.

mod cli;
mod housekeeping;
mod populate;
mod records;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use common::dks::{HttpKeyService, KeyService, StaticKeyService};
use tracing::{error, info};

use cli::Config;
use populate::{Options, RetrySettings};
use store::RestColumnStore;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::parse();

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    common::telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        quorum = %cfg.zookeeper_quorum,
        records = %cfg.test_configuration_file.display(),
        "populate-hbase starting"
    );

    // -----------------------------------------------------------------------
    // 3. Housekeeping
    // -----------------------------------------------------------------------
    housekeeping::remove_completion_flag(cfg.completed_flag.as_deref()).await?;
    housekeeping::remove_output_file(cfg.remove_output_file.as_deref()).await?;

    // -----------------------------------------------------------------------
    // 4. Population
    // -----------------------------------------------------------------------
    let store = RestColumnStore::for_host(&cfg.zookeeper_quorum, cfg.rest_port)
        .context("invalid column store address")?;
    let keys = key_service(&cfg)?;

    match populate::run(&store, keys.as_ref(), &Options::from(&cfg), &RetrySettings::from(&cfg)).await {
        Ok(summary) => {
            info!(
                stored = summary.stored,
                skipped = summary.skipped,
                tables_created = summary.tables_created,
                "population complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "population failed");
            Err(e.into())
        }
    }
}

fn key_service(cfg: &Config) -> Result<Box<dyn KeyService>> {
    match &cfg.data_key_service {
        Some(url) => {
            info!(url = %url, "using data key service");
            Ok(Box::new(HttpKeyService::new(url)?))
        }
        None => {
            info!("no data key service configured; using fake key data");
            Ok(Box::new(StaticKeyService::default()))
        }
    }
}
