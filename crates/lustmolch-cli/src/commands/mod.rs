//! CLI command definitions and dispatch.

pub mod create;
pub mod install_key;
pub mod list;
pub mod remove;
pub mod update;
pub mod users;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lustmolch_common::config::LustmolchConfig;
use lustmolch_runtime::host::SystemRunner;
use lustmolch_runtime::manager::Manager;

/// lustmolch — systemd-nspawn containers for hosted websites.
#[derive(Parser, Debug)]
#[command(name = "lustmolch", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the container registry file.
    #[arg(
        long,
        global = true,
        env = "LUSTMOLCH_CONFIG",
        default_value = lustmolch_common::constants::DEFAULT_CONFIG_FILE
    )]
    pub config_file: PathBuf,

    /// Directory with template overrides.
    #[arg(long, global = true, env = "LUSTMOLCH_TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bootstrap, configure and start a new container.
    CreateContainer(create::CreateArgs),
    /// Stop a container and delete its root and config files.
    RemoveContainer(remove::RemoveArgs),
    /// Append a public key to a container's root `authorized_keys`.
    InstallSshKey(install_key::InstallKeyArgs),
    /// Show registered containers.
    ListContainers(list::ListArgs),
    /// Register a user and their public key.
    AddUser(users::AddUserArgs),
    /// Delete a user and revoke it from all containers.
    RemoveUser(users::RemoveUserArgs),
    /// Give a registered user access to a container.
    AssignUser(users::AssignUserArgs),
    /// Rewrite every container's `authorized_keys` from its assigned users.
    UpdateContainers(update::UpdateArgs),
}

/// Registry location and template overrides shared by all commands.
#[derive(Debug, Clone)]
pub struct Session {
    config_file: PathBuf,
    template_dir: Option<PathBuf>,
}

impl Session {
    /// Loads the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or parsed.
    pub fn load_config(&self) -> anyhow::Result<LustmolchConfig> {
        LustmolchConfig::load(&self.config_file)
            .with_context(|| format!("failed to load registry {}", self.config_file.display()))
    }

    /// Builds a manager over the registry, with `--template-dir` applied
    /// for this run only.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or the templates cannot be loaded.
    pub fn manager(&self, dry_run: bool) -> anyhow::Result<Manager> {
        let config = self.load_config()?;
        let mut manager = if dry_run {
            tracing::info!("doing a dry run");
            Manager::dry_run(config)?
        } else {
            Manager::new(config, Box::new(SystemRunner))?
        };
        if let Some(dir) = &self.template_dir {
            manager = manager.with_template_dir(dir).with_context(|| {
                format!("failed to load templates from {}", dir.display())
            })?;
        }
        Ok(manager)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let session = Session {
        config_file: cli.config_file,
        template_dir: cli.template_dir,
    };
    match cli.command {
        Command::CreateContainer(args) => create::execute(&session, args),
        Command::RemoveContainer(args) => remove::execute(&session, args),
        Command::InstallSshKey(args) => install_key::execute(&session, args),
        Command::ListContainers(args) => list::execute(&session, args),
        Command::AddUser(args) => users::add(&session, args),
        Command::RemoveUser(args) => users::remove(&session, args),
        Command::AssignUser(args) => users::assign(&session, args),
        Command::UpdateContainers(args) => update::execute(&session, args),
    }
}
