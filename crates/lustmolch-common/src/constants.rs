//! System-wide constants and default paths.

use std::net::Ipv4Addr;

/// Default location of the registry file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/ssn/lustmolch-containers.json";

/// Directory where `machinectl` looks for container roots.
pub const DEFAULT_MACHINES_DIR: &str = "/var/lib/machines";

/// Parent of the per-container shared web directories.
pub const DEFAULT_WWW_ROOT: &str = "/var/www";

/// nginx site definitions.
pub const DEFAULT_NGINX_SITES_DIR: &str = "/etc/nginx/sites-available";

/// systemd-networkd unit directory (used on the host and inside containers).
pub const DEFAULT_NETWORK_DIR: &str = "/etc/systemd/network";

/// `.nspawn` unit directory.
pub const DEFAULT_NSPAWN_DIR: &str = "/etc/systemd/nspawn";

/// Debian release bootstrapped into new containers.
pub const DEFAULT_DEBIAN_FLAVOUR: &str = "buster";

/// Debian mirror handed to `debootstrap`.
pub const DEFAULT_DEBIAN_MIRROR: &str = "http://mirror.stusta.de/debian";

/// Source ranges allowed to reach container SSH ports.
pub const DEFAULT_SSN_IP_RANGES: &[&str] = &["10.150.0.0/17", "141.84.69.0/24"];

/// First SSH port handed out.
pub const DEFAULT_SSH_START_PORT: u16 = 10022;

/// Distance between consecutive SSH ports.
pub const DEFAULT_SSH_PORT_INCREMENT: u16 = 1000;

/// Public address of the host, used as SNAT source.
pub const DEFAULT_HOST_IP: Ipv4Addr = Ipv4Addr::new(141, 84, 69, 235);

/// Host side of the first container point-to-point link.
pub const DEFAULT_IP_START_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

/// Prefix length of each container link.
pub const DEFAULT_IP_SUBNET_LENGTH: u8 = 30;

/// Domain appended to container names to form their public URL.
pub const DEFAULT_DOMAIN: &str = "stusta.de";

/// Path of the bootstrap script inside the container root.
pub const BOOTSTRAP_SCRIPT: &str = "/opt/bootstrap.sh";
