//! `lustmolch list-containers` — Show registered containers.

use clap::Args;

use super::Session;
use crate::output;

/// Arguments for the `list-containers` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print the registry entries as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `list-containers` command.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn execute(session: &Session, args: ListArgs) -> anyhow::Result<()> {
    let config = session.load_config()?;

    if args.json {
        let records: Vec<_> = config.containers.values().collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if config.containers.is_empty() {
        println!("No containers registered.");
        return Ok(());
    }
    print!("{}", output::container_table(config.containers.values()));
    Ok(())
}
