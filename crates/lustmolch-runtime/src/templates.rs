//! Config templates compiled into the binary.
//!
//! Names mirror the layout of the `templates/` directory, so a template
//! directory override only needs to contain the files it changes.

/// nginx site for the container's URL.
pub static NGINX_SITE: &str = include_str!("../templates/host/nginx");
/// Host side veth network unit.
pub static HOST_VETH_NETWORK: &str = include_str!("../templates/host/80-container-ve.network");
/// `.nspawn` unit.
pub static NSPAWN_UNIT: &str = include_str!("../templates/host/nspawn");

/// sshd configuration inside the container.
pub static SSHD_CONFIG: &str = include_str!("../templates/container/sshd_config");
/// Container side `host0` network unit.
pub static CONTAINER_HOST0_NETWORK: &str =
    include_str!("../templates/container/80-container-host0.network");
/// One-time provisioning script run through `systemd-nspawn`.
pub static BOOTSTRAP_SCRIPT: &str = include_str!("../templates/container/bootstrap.sh");

/// All embedded templates as (name, content) pairs.
pub const ALL_TEMPLATES: &[(&str, &str)] = &[
    ("host/nginx", NGINX_SITE),
    ("host/80-container-ve.network", HOST_VETH_NETWORK),
    ("host/nspawn", NSPAWN_UNIT),
    ("container/sshd_config", SSHD_CONFIG),
    ("container/80-container-host0.network", CONTAINER_HOST0_NETWORK),
    ("container/bootstrap.sh", BOOTSTRAP_SCRIPT),
];
