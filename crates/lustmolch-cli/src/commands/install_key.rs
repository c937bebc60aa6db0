//! `lustmolch install-ssh-key` — Append a public key to a container.

use anyhow::Context;
use clap::Args;
use lustmolch_common::types::ContainerName;
use lustmolch_runtime::ssh::KeySource;

use super::Session;

/// Arguments for the `install-ssh-key` command.
#[derive(Args, Debug)]
pub struct InstallKeyArgs {
    /// Target container.
    pub name: ContainerName,

    /// Path to a public key file, or the key itself with `--key-string`.
    pub key: String,

    /// Treat KEY as the key text instead of a file path.
    #[arg(long)]
    pub key_string: bool,
}

/// Executes the `install-ssh-key` command.
///
/// # Errors
///
/// Returns an error if the key cannot be read or the container's
/// `authorized_keys` cannot be written.
pub fn execute(session: &Session, args: InstallKeyArgs) -> anyhow::Result<()> {
    let manager = session.manager(false)?;
    let source = KeySource::from_arg(args.key, args.key_string);
    let path = manager
        .install_ssh_key(&args.name, &source)
        .with_context(|| format!("failed to install SSH key into {}", args.name))?;
    tracing::info!(path = %path.display(), "key installed");
    Ok(())
}
