//! `lustmolch create-container` — Bootstrap and start a new container.

use anyhow::Context;
use clap::Args;
use lustmolch_common::types::ContainerName;
use lustmolch_runtime::host;

use super::Session;

/// Arguments for the `create-container` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Container name, also used as hostname and machine name.
    pub name: ContainerName,

    /// Log every step without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `create-container` command.
///
/// # Errors
///
/// Returns an error if not run as root, or if any provisioning step fails.
pub fn execute(session: &Session, args: CreateArgs) -> anyhow::Result<()> {
    if !args.dry_run {
        host::ensure_root("create-container")?;
    }
    let mut manager = session.manager(args.dry_run)?;
    let _ = manager
        .create_container(&args.name)
        .with_context(|| format!("failed to create container {}", args.name))?;
    Ok(())
}
