//! `lustmolch remove-container` — Stop and delete a container.

use anyhow::Context;
use clap::Args;
use lustmolch_common::types::ContainerName;
use lustmolch_runtime::host;

use super::Session;

/// Arguments for the `remove-container` command.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Container to remove.
    pub name: ContainerName,
}

/// Executes the `remove-container` command.
///
/// # Errors
///
/// Returns an error if not run as root or the registry cannot be updated.
pub fn execute(session: &Session, args: RemoveArgs) -> anyhow::Result<()> {
    host::ensure_root("remove-container")?;
    let mut manager = session.manager(false)?;
    manager
        .remove_container(&args.name)
        .with_context(|| format!("failed to remove container {}", args.name))
}
