//! Registry file model: settings overrides plus container and user records.
//!
//! The registry is a single JSON document. Settings live at the top level
//! next to the `containers` and `users` maps; every setting is optional and
//! falls back to the defaults in [`crate::constants`].

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants;
use crate::error::{LustmolchError, Result};
use crate::types::{ContainerName, ContainerRecord, UserRecord};

/// Tunables for provisioning, overridable from the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debian release passed to `debootstrap`.
    pub debian_flavour: String,
    /// Debian mirror passed to `debootstrap`.
    pub debian_mirror: String,
    /// CIDR ranges allowed to reach container SSH ports.
    pub ssn_ip_ranges: Vec<String>,
    /// Parent of the shared web directories.
    pub www_root: PathBuf,
    /// Parent of the container roots.
    pub machines_dir: PathBuf,
    /// Host nginx site directory.
    pub nginx_sites_dir: PathBuf,
    /// Host systemd-networkd directory.
    pub network_dir: PathBuf,
    /// Host `.nspawn` unit directory.
    pub nspawn_dir: PathBuf,
    /// First SSH port.
    pub ssh_start_port: u16,
    /// Step between SSH ports.
    pub ssh_port_increment: u16,
    /// Public host address used for SNAT.
    pub host_ip: Ipv4Addr,
    /// Host side of the first container link.
    pub ip_start_host: Ipv4Addr,
    /// Prefix length of each container link.
    pub ip_subnet_length: u8,
    /// Domain used to build container URLs.
    pub domain: String,
    /// Directory with template overrides, searched before the embedded set.
    pub template_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debian_flavour: constants::DEFAULT_DEBIAN_FLAVOUR.into(),
            debian_mirror: constants::DEFAULT_DEBIAN_MIRROR.into(),
            ssn_ip_ranges: constants::DEFAULT_SSN_IP_RANGES
                .iter()
                .map(ToString::to_string)
                .collect(),
            www_root: PathBuf::from(constants::DEFAULT_WWW_ROOT),
            machines_dir: PathBuf::from(constants::DEFAULT_MACHINES_DIR),
            nginx_sites_dir: PathBuf::from(constants::DEFAULT_NGINX_SITES_DIR),
            network_dir: PathBuf::from(constants::DEFAULT_NETWORK_DIR),
            nspawn_dir: PathBuf::from(constants::DEFAULT_NSPAWN_DIR),
            ssh_start_port: constants::DEFAULT_SSH_START_PORT,
            ssh_port_increment: constants::DEFAULT_SSH_PORT_INCREMENT,
            host_ip: constants::DEFAULT_HOST_IP,
            ip_start_host: constants::DEFAULT_IP_START_HOST,
            ip_subnet_length: constants::DEFAULT_IP_SUBNET_LENGTH,
            domain: constants::DEFAULT_DOMAIN.into(),
            template_dir: None,
        }
    }
}

impl Settings {
    /// Checks values that would otherwise break allocation.
    ///
    /// # Errors
    ///
    /// Returns [`LustmolchError::Config`] for a zero port increment or a
    /// prefix length outside `1..=30`.
    pub fn validate(&self) -> Result<()> {
        if self.ssh_port_increment == 0 {
            return Err(LustmolchError::Config {
                message: "ssh_port_increment must be greater than zero".into(),
            });
        }
        if !(1..=30).contains(&self.ip_subnet_length) {
            return Err(LustmolchError::Config {
                message: format!(
                    "ip_subnet_length must be between 1 and 30, got {}",
                    self.ip_subnet_length
                ),
            });
        }
        Ok(())
    }

    /// Settings that differ from the defaults, keyed as in the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized.
    pub fn overrides(&self) -> Result<Map<String, Value>> {
        let (Value::Object(mut current), Value::Object(defaults)) =
            (serde_json::to_value(self)?, serde_json::to_value(Self::default())?)
        else {
            return Ok(Map::new());
        };
        current.retain(|key, value| defaults.get(key) != Some(value));
        Ok(current)
    }

    /// Public URL for a container.
    #[must_use]
    pub fn url_for(&self, name: &ContainerName) -> String {
        format!("{name}.{}", self.domain)
    }
}

/// In-memory view of the registry file.
///
/// Only settings that differ from the defaults are written back, so a
/// registry never pins values it did not set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LustmolchConfig {
    /// Provisioning settings.
    #[serde(flatten)]
    pub settings: Settings,
    /// Registered containers keyed by name.
    #[serde(default)]
    pub containers: BTreeMap<String, ContainerRecord>,
    /// Registered users keyed by name.
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
    #[serde(skip)]
    path: PathBuf,
}

impl LustmolchConfig {
    /// Returns a default registry bound to `path`, without touching disk.
    #[must_use]
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Loads the registry, falling back to defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the settings fail validation.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "loading registry");
                serde_json::from_str::<Self>(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "registry does not exist, using defaults");
                Self::default()
            }
            Err(e) => return Err(LustmolchError::io(path, e)),
        };
        config.settings.validate()?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Writes the registry back to the file it was loaded from.
    ///
    /// Parent directories are created as needed. The document is written to a
    /// sibling temp file first and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LustmolchError::io(parent, e))?;
        }
        let mut document = self.settings.overrides()?;
        let _ = document.insert("containers".into(), serde_json::to_value(&self.containers)?);
        let _ = document.insert("users".into(), serde_json::to_value(&self.users)?);
        let mut json = serde_json::to_string_pretty(&Value::Object(document))?;
        json.push('\n');

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| LustmolchError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| LustmolchError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "registry saved");
        Ok(())
    }

    /// Path the registry is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a registered container.
    #[must_use]
    pub fn container(&self, name: &ContainerName) -> Option<&ContainerRecord> {
        self.containers.get(name.as_str())
    }
}
