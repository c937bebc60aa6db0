//! Point-to-point address allocation for container veth links.
//!
//! Each container gets a block of four addresses starting at
//! `ip_start_host`: the host end of the veth pair takes the first usable
//! address and the container end takes the next one.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use lustmolch_common::config::LustmolchConfig;
use lustmolch_common::error::{LustmolchError, Result};
use lustmolch_common::types::ContainerName;

/// Addresses per container link.
const BLOCK_SIZE: u32 = 4;

/// Third octet at which the private range is considered used up.
const THIRD_OCTET_LIMIT: u8 = 254;

/// Both ends of a container's veth link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddresses {
    /// Address on the host's `ve-<name>` interface.
    pub host: Ipv4Addr,
    /// Address on the container's `host0` interface.
    pub container: Ipv4Addr,
}

/// Returns the lowest free link starting at `start`.
///
/// # Errors
///
/// Returns [`LustmolchError::Exhausted`] once the third octet of the
/// candidate host address reaches 254.
pub fn lowest_free_link(start: Ipv4Addr, used: &BTreeSet<Ipv4Addr>) -> Result<LinkAddresses> {
    let mut host = u32::from(start);
    loop {
        let candidate = Ipv4Addr::from(host);
        if candidate.octets()[2] >= THIRD_OCTET_LIMIT {
            return Err(LustmolchError::Exhausted {
                resource: "container IP addresses",
            });
        }
        if !used.contains(&candidate) {
            return Ok(LinkAddresses {
                host: candidate,
                container: Ipv4Addr::from(host + 1),
            });
        }
        host = host.checked_add(BLOCK_SIZE).ok_or(LustmolchError::Exhausted {
            resource: "container IP addresses",
        })?;
    }
}

/// Picks the link addresses for `name`.
///
/// A registered container keeps its addresses.
///
/// # Errors
///
/// Returns an error if the address range is exhausted.
pub fn allocate_link(config: &LustmolchConfig, name: &ContainerName) -> Result<LinkAddresses> {
    if let Some(record) = config.container(name) {
        return Ok(LinkAddresses {
            host: record.ip_address_host,
            container: record.ip_address_container,
        });
    }

    let used: BTreeSet<Ipv4Addr> = config
        .containers
        .values()
        .map(|c| c.ip_address_host)
        .collect();
    let link = lowest_free_link(config.settings.ip_start_host, &used)?;
    tracing::debug!(name = %name, host = %link.host, container = %link.container, "allocated link");
    Ok(link)
}

#[cfg(test)]
mod tests {
    use lustmolch_common::types::ContainerRecord;

    use super::*;

    fn start() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 0, 1)
    }

    #[test]
    fn first_link_starts_at_configured_address() {
        let link = lowest_free_link(start(), &BTreeSet::new()).expect("link");
        assert_eq!(link.host, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(link.container, Ipv4Addr::new(192, 168, 0, 2));
    }

    #[test]
    fn used_blocks_are_skipped_and_gaps_reused() {
        let used: BTreeSet<_> = [Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(192, 168, 0, 9)]
            .into_iter()
            .collect();
        let link = lowest_free_link(start(), &used).expect("link");
        assert_eq!(link.host, Ipv4Addr::new(192, 168, 0, 5));
        assert_eq!(link.container, Ipv4Addr::new(192, 168, 0, 6));
    }

    #[test]
    fn blocks_carry_into_the_next_octet() {
        let used: BTreeSet<_> = (0..64u8).map(|k| Ipv4Addr::new(192, 168, 0, 1 + 4 * k)).collect();
        let link = lowest_free_link(start(), &used).expect("link");
        assert_eq!(link.host, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn range_is_exhausted_at_third_octet_254() {
        let near_end = Ipv4Addr::new(192, 168, 253, 253);
        let used: BTreeSet<_> = [near_end].into_iter().collect();
        assert!(matches!(
            lowest_free_link(near_end, &used),
            Err(LustmolchError::Exhausted { .. })
        ));
    }

    #[test]
    fn registered_container_keeps_addresses() {
        let mut config = LustmolchConfig::with_defaults("/nonexistent/registry.json");
        let name = ContainerName::new("foo").expect("name");
        let _ = config.containers.insert(
            name.to_string(),
            ContainerRecord {
                name: name.clone(),
                ssh_port: 10022,
                ip_address_host: Ipv4Addr::new(192, 168, 3, 1),
                ip_address_container: Ipv4Addr::new(192, 168, 3, 2),
                ip_subnet_length: 30,
                url: String::new(),
                users: Vec::new(),
                created_at: String::new(),
            },
        );

        let link = allocate_link(&config, &name).expect("link");
        assert_eq!(link.host, Ipv4Addr::new(192, 168, 3, 1));

        let other = ContainerName::new("bar").expect("name");
        let link = allocate_link(&config, &other).expect("link");
        assert_eq!(link.host, Ipv4Addr::new(192, 168, 0, 1));
    }
}
