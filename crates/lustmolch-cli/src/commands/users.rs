//! `lustmolch add-user`, `remove-user`, `assign-user` — Registry users.

use anyhow::Context;
use clap::Args;
use lustmolch_common::types::ContainerName;
use lustmolch_runtime::ssh::KeySource;

use super::Session;

/// Arguments for the `add-user` command.
#[derive(Args, Debug)]
pub struct AddUserArgs {
    /// User name.
    pub name: String,

    /// Path to the user's public key file, or the key with `--key-string`.
    pub key: String,

    /// Treat KEY as the key text instead of a file path.
    #[arg(long)]
    pub key_string: bool,
}

/// Arguments for the `remove-user` command.
#[derive(Args, Debug)]
pub struct RemoveUserArgs {
    /// User name.
    pub name: String,
}

/// Arguments for the `assign-user` command.
#[derive(Args, Debug)]
pub struct AssignUserArgs {
    /// Registered user.
    pub user: String,

    /// Registered container.
    pub container: ContainerName,
}

/// Executes the `add-user` command.
///
/// # Errors
///
/// Returns an error if the key cannot be read or the registry cannot be
/// saved.
pub fn add(session: &Session, args: AddUserArgs) -> anyhow::Result<()> {
    let mut manager = session.manager(false)?;
    let source = KeySource::from_arg(args.key, args.key_string);
    manager
        .add_user(&args.name, &source)
        .with_context(|| format!("failed to add user {}", args.name))
}

/// Executes the `remove-user` command.
///
/// # Errors
///
/// Returns an error if the user is unknown or the registry cannot be saved.
pub fn remove(session: &Session, args: RemoveUserArgs) -> anyhow::Result<()> {
    let mut manager = session.manager(false)?;
    manager
        .remove_user(&args.name)
        .with_context(|| format!("failed to remove user {}", args.name))?;
    tracing::info!("run update-containers to revoke keys already installed");
    Ok(())
}

/// Executes the `assign-user` command.
///
/// # Errors
///
/// Returns an error if the user or container is unknown or the registry
/// cannot be saved.
pub fn assign(session: &Session, args: AssignUserArgs) -> anyhow::Result<()> {
    let mut manager = session.manager(false)?;
    manager
        .assign_user(&args.user, &args.container)
        .with_context(|| format!("failed to assign {} to {}", args.user, args.container))
}
