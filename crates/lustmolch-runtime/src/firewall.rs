//! iptables rules exposing a container's sshd to the allowed ranges.

use std::net::Ipv4Addr;

use lustmolch_common::types::ContainerName;

use crate::host::HostCommand;

/// Builds the rules for one container.
///
/// Per allowed source range: accept TCP to `ssh_port` and DNAT it to the
/// container. One SNAT rule rewrites traffic leaving through the container's
/// veth to `host_ip`. All rules are appended unchecked; a failed rule is
/// logged by the runner and does not abort provisioning.
pub fn ssh_rules(
    name: &ContainerName,
    ssh_port: u16,
    container_ip: Ipv4Addr,
    host_ip: Ipv4Addr,
    allowed_ranges: &[String],
) -> Vec<HostCommand> {
    let port = ssh_port.to_string();
    let destination = format!("{container_ip}:{ssh_port}");

    let mut rules = Vec::with_capacity(allowed_ranges.len() * 2 + 1);
    for range in allowed_ranges {
        rules.push(
            HostCommand::new("iptables")
                .args(["-A", "INPUT", "-p", "tcp", "-m", "tcp", "--dport"])
                .arg(port.as_str())
                .args(["-s", range.as_str(), "-j", "ACCEPT"])
                .unchecked(),
        );
        rules.push(
            HostCommand::new("iptables")
                .args(["-t", "nat", "-A", "PREROUTING", "-p", "tcp", "-m", "tcp", "--dport"])
                .arg(port.as_str())
                .args(["-s", range.as_str(), "-j", "DNAT", "--to-destination"])
                .arg(destination.as_str())
                .unchecked(),
        );
    }
    rules.push(
        HostCommand::new("iptables")
            .args(["-t", "nat", "-A", "POSTROUTING", "-o"])
            .arg(name.veth_name())
            .args(["-j", "SNAT", "--to-source"])
            .arg(host_ip.to_string())
            .unchecked(),
    );
    rules
}
