//! Domain primitive types used across the lustmolch workspace.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LustmolchError, Result};

/// Longest name accepted, the limit of a single DNS label.
const MAX_NAME_LEN: usize = 63;

/// Validated container name.
///
/// The name doubles as hostname, machine name and path component, so it is
/// restricted to a single lowercase DNS label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerName(String);

impl ContainerName {
    /// Validates and wraps a container name.
    ///
    /// # Errors
    ///
    /// Returns [`LustmolchError::InvalidName`] if the name is empty, too
    /// long, contains anything but `[a-z0-9-]`, or starts/ends with `-`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.len() > MAX_NAME_LEN {
            Some("name is longer than 63 characters")
        } else if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            Some("only lowercase letters, digits and '-' are allowed")
        } else if name.starts_with('-') || name.ends_with('-') {
            Some("name must not start or end with '-'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(LustmolchError::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the host side veth interface `systemd-nspawn` creates.
    #[must_use]
    pub fn veth_name(&self) -> String {
        format!("ve-{}", self.0)
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerName {
    type Err = LustmolchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerName {
    type Error = LustmolchError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContainerName> for String {
    fn from(name: ContainerName) -> Self {
        name.0
    }
}

/// Registry entry for a provisioned container.
///
/// Also serves as the rendering context for every config template, so field
/// names are the placeholder names used in the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Container name.
    pub name: ContainerName,
    /// Host port forwarded to the container's sshd.
    pub ssh_port: u16,
    /// Host side of the point-to-point link.
    pub ip_address_host: Ipv4Addr,
    /// Container side of the point-to-point link.
    pub ip_address_container: Ipv4Addr,
    /// Prefix length of the link.
    pub ip_subnet_length: u8,
    /// Public URL served by nginx.
    pub url: String,
    /// Users whose keys belong in the container's `authorized_keys`.
    #[serde(default)]
    pub users: Vec<String>,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// A user with an SSH public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User name.
    pub name: String,
    /// OpenSSH public key line.
    pub key: String,
}
