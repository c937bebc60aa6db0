//! # lustmolch — website container tooling
//!
//! Creates, removes and configures systemd-nspawn containers, one per hosted
//! website, by driving the host's container tooling.

#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    commands::execute(cli)
}
