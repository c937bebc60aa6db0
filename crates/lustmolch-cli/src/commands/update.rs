//! `lustmolch update-containers` — Sync `authorized_keys` with assigned users.

use clap::Args;
use lustmolch_runtime::host;

use super::Session;

/// Arguments for the `update-containers` command.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Log the keys that would be written without writing them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `update-containers` command.
///
/// # Errors
///
/// Returns an error if not run as root or a container cannot be updated.
pub fn execute(session: &Session, args: UpdateArgs) -> anyhow::Result<()> {
    if !args.dry_run {
        host::ensure_root("update-containers")?;
    }
    session.manager(args.dry_run)?.update_containers()?;
    Ok(())
}
