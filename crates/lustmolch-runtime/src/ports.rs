//! SSH port allocation.
//!
//! Ports are handed out from the sequence `start, start + step, …`. A port
//! counts as taken if the registry records it or if any container root on
//! disk has an sshd configured for it.

use std::collections::BTreeSet;
use std::path::Path;

use lustmolch_common::config::LustmolchConfig;
use lustmolch_common::error::{LustmolchError, Result};
use lustmolch_common::types::ContainerName;

/// Returns the lowest value of `start + k * step` not in `used`.
///
/// # Errors
///
/// Returns [`LustmolchError::Exhausted`] if the sequence runs past the
/// largest TCP port, and [`LustmolchError::Config`] for a zero step.
pub fn lowest_free_port(start: u16, step: u16, used: &BTreeSet<u16>) -> Result<u16> {
    if step == 0 {
        return Err(LustmolchError::Config {
            message: "port increment must be greater than zero".into(),
        });
    }
    let mut port = start;
    while used.contains(&port) {
        port = port
            .checked_add(step)
            .ok_or(LustmolchError::Exhausted { resource: "SSH ports" })?;
    }
    Ok(port)
}

/// Collects the sshd ports of every container root under `machines_dir`.
///
/// A missing `machines_dir` means no containers. Roots without a readable
/// `etc/ssh/sshd_config` are skipped.
///
/// # Errors
///
/// Returns an error if `machines_dir` exists but cannot be listed.
pub fn scan_machine_ports(machines_dir: &Path) -> Result<BTreeSet<u16>> {
    let entries = match std::fs::read_dir(machines_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(LustmolchError::io(machines_dir, e)),
    };

    let mut ports = BTreeSet::new();
    for entry in entries {
        let root = entry.map_err(|e| LustmolchError::io(machines_dir, e))?.path();
        let sshd_config = root.join("etc/ssh/sshd_config");
        let Ok(content) = std::fs::read_to_string(&sshd_config) else {
            continue;
        };
        for port in parse_sshd_ports(&content) {
            tracing::trace!(root = %root.display(), port, "port in use on disk");
            let _ = ports.insert(port);
        }
    }
    Ok(ports)
}

/// Extracts `Port` directives from an sshd configuration.
fn parse_sshd_ports(content: &str) -> impl Iterator<Item = u16> + '_ {
    content.lines().filter_map(|line| {
        let mut words = line.split_whitespace();
        let keyword = words.next()?;
        if !keyword.eq_ignore_ascii_case("port") {
            return None;
        }
        words.next()?.parse().ok()
    })
}

/// Picks the SSH port for `name`.
///
/// A registered container keeps its port. Otherwise the lowest free port is
/// chosen, considering both the registry and the containers on disk.
///
/// # Errors
///
/// Returns an error if the machines directory cannot be enumerated or the
/// port range is exhausted.
pub fn allocate_ssh_port(config: &LustmolchConfig, name: &ContainerName) -> Result<u16> {
    if let Some(record) = config.container(name) {
        return Ok(record.ssh_port);
    }

    let mut used = scan_machine_ports(&config.settings.machines_dir)?;
    used.extend(config.containers.values().map(|c| c.ssh_port));

    let port = lowest_free_port(
        config.settings.ssh_start_port,
        config.settings.ssh_port_increment,
        &used,
    )?;
    tracing::debug!(name = %name, port, used = ?used, "allocated SSH port");
    Ok(port)
}
