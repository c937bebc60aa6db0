//! Filesystem locations belonging to a single container.

use std::path::{Path, PathBuf};

use lustmolch_common::config::Settings;
use lustmolch_common::constants::BOOTSTRAP_SCRIPT;
use lustmolch_common::types::ContainerName;

/// A rendered config file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Template name in the renderer.
    pub template: &'static str,
    /// Destination on the host filesystem.
    pub path: PathBuf,
}

/// Every path lustmolch reads or writes for one container.
#[derive(Debug, Clone)]
pub struct ContainerLayout {
    name: ContainerName,
    root: PathBuf,
    www_dir: PathBuf,
    nginx_site: PathBuf,
    network_unit: PathBuf,
    nspawn_unit: PathBuf,
}

impl ContainerLayout {
    /// Computes the layout of `name` under the configured directories.
    #[must_use]
    pub fn new(settings: &Settings, name: &ContainerName) -> Self {
        Self {
            name: name.clone(),
            root: settings.machines_dir.join(name.as_str()),
            www_dir: settings.www_root.join(name.as_str()),
            nginx_site: settings.nginx_sites_dir.join(name.as_str()),
            network_unit: settings
                .network_dir
                .join(format!("80-container-ve-{name}.network")),
            nspawn_unit: settings.nspawn_dir.join(format!("{name}.nspawn")),
        }
    }

    /// Container name.
    #[must_use]
    pub const fn name(&self) -> &ContainerName {
        &self.name
    }

    /// Root filesystem of the container.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared web directory bind-mounted into the container.
    #[must_use]
    pub fn www_dir(&self) -> &Path {
        &self.www_dir
    }

    /// `.nspawn` unit read by `machinectl start`.
    #[must_use]
    pub fn nspawn_unit(&self) -> &Path {
        &self.nspawn_unit
    }

    /// Resolves an absolute in-container path to its location on the host.
    #[must_use]
    pub fn in_root(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Host location of the bootstrap script.
    #[must_use]
    pub fn bootstrap_script(&self) -> PathBuf {
        self.in_root(BOOTSTRAP_SCRIPT)
    }

    /// Root's `.ssh` directory inside the container.
    #[must_use]
    pub fn ssh_dir(&self) -> PathBuf {
        self.in_root("/root/.ssh")
    }

    /// Root's `authorized_keys` inside the container.
    #[must_use]
    pub fn authorized_keys(&self) -> PathBuf {
        self.ssh_dir().join("authorized_keys")
    }

    /// The container's sshd configuration.
    #[must_use]
    pub fn sshd_config(&self) -> PathBuf {
        self.in_root("/etc/ssh/sshd_config")
    }

    /// Config files rendered onto the host before bootstrapping.
    #[must_use]
    pub fn host_files(&self) -> Vec<Placement> {
        vec![
            Placement {
                template: "host/nginx",
                path: self.nginx_site.clone(),
            },
            Placement {
                template: "host/80-container-ve.network",
                path: self.network_unit.clone(),
            },
        ]
    }

    /// The `.nspawn` unit, placed once the root exists.
    #[must_use]
    pub fn nspawn_file(&self) -> Placement {
        Placement {
            template: "host/nspawn",
            path: self.nspawn_unit.clone(),
        }
    }

    /// Config files rendered into the container root after bootstrapping.
    #[must_use]
    pub fn container_files(&self) -> Vec<Placement> {
        vec![
            Placement {
                template: "container/sshd_config",
                path: self.sshd_config(),
            },
            Placement {
                template: "container/80-container-host0.network",
                path: self.in_root("/etc/systemd/network/80-container-host0.network"),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ContainerLayout {
        let name = ContainerName::new("foo").expect("name");
        ContainerLayout::new(&Settings::default(), &name)
    }

    #[test]
    fn host_paths_follow_settings() {
        let l = layout();
        assert_eq!(l.root(), Path::new("/var/lib/machines/foo"));
        assert_eq!(l.www_dir(), Path::new("/var/www/foo"));
        assert_eq!(l.nspawn_unit(), Path::new("/etc/systemd/nspawn/foo.nspawn"));

        let host: Vec<_> = l.host_files().into_iter().map(|p| p.path).collect();
        assert_eq!(
            host,
            vec![
                PathBuf::from("/etc/nginx/sites-available/foo"),
                PathBuf::from("/etc/systemd/network/80-container-ve-foo.network"),
            ]
        );
    }

    #[test]
    fn container_paths_live_under_root() {
        let l = layout();
        assert_eq!(
            l.authorized_keys(),
            PathBuf::from("/var/lib/machines/foo/root/.ssh/authorized_keys")
        );
        assert_eq!(
            l.bootstrap_script(),
            PathBuf::from("/var/lib/machines/foo/opt/bootstrap.sh")
        );
        for placement in l.container_files() {
            assert!(placement.path.starts_with(l.root()));
        }
    }
}
