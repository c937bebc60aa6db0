//! Container lifecycle orchestration.
//!
//! The [`Manager`] ties the registry, template renderer and host command
//! runner together. Every operation is a straight sequence of steps; the
//! first failing step aborts the operation and nothing is rolled back.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use lustmolch_common::config::LustmolchConfig;
use lustmolch_common::constants::BOOTSTRAP_SCRIPT;
use lustmolch_common::error::{LustmolchError, Result};
use lustmolch_common::types::{ContainerName, ContainerRecord, UserRecord};

use crate::host::{self, CommandRunner, DryRunRunner, HostCommand};
use crate::layout::{ContainerLayout, Placement};
use crate::ssh::{self, KeySource};
use crate::template::{TemplateContext, TemplateRenderer};
use crate::{firewall, network, ports};

/// Mode of the bootstrap script copied into a new root.
const SCRIPT_MODE: u32 = 0o755;

/// Drives container provisioning against one registry.
pub struct Manager {
    config: LustmolchConfig,
    renderer: TemplateRenderer,
    runner: Box<dyn CommandRunner>,
    dry_run: bool,
}

impl Manager {
    /// Creates a manager executing through `runner`.
    ///
    /// Templates come from the embedded set, overlaid with the configured
    /// `template_dir` if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates cannot be loaded.
    pub fn new(config: LustmolchConfig, runner: Box<dyn CommandRunner>) -> Result<Self> {
        let renderer = match &config.settings.template_dir {
            Some(dir) => TemplateRenderer::with_overrides(dir)?,
            None => TemplateRenderer::from_embedded()?,
        };
        tracing::debug!(templates = ?renderer.template_names(), "templates ready");
        Ok(Self {
            config,
            renderer,
            runner,
            dry_run: false,
        })
    }

    /// Creates a manager that only logs what it would do.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates cannot be loaded.
    pub fn dry_run(config: LustmolchConfig) -> Result<Self> {
        let mut manager = Self::new(config, Box::new(DryRunRunner))?;
        manager.dry_run = true;
        Ok(manager)
    }

    /// Renders with overrides from `dir` for this run only.
    ///
    /// Unlike the registry's `template_dir`, this is never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a template fails
    /// to parse.
    pub fn with_template_dir(mut self, dir: &Path) -> Result<Self> {
        self.renderer = TemplateRenderer::with_overrides(dir)?;
        tracing::debug!(
            dir = %dir.display(),
            templates = ?self.renderer.template_names(),
            "templates ready"
        );
        Ok(self)
    }

    /// The registry this manager works on.
    #[must_use]
    pub const fn config(&self) -> &LustmolchConfig {
        &self.config
    }

    /// Paths belonging to `name`.
    #[must_use]
    pub fn layout(&self, name: &ContainerName) -> ContainerLayout {
        ContainerLayout::new(&self.config.settings, name)
    }

    /// Provisions a new container and records it in the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the container root already exists, allocation
    /// fails, a template fails to render, a file cannot be written, or a
    /// checked host command fails.
    pub fn create_container(&mut self, name: &ContainerName) -> Result<ContainerRecord> {
        let layout = self.layout(name);
        if layout.root().exists() {
            return Err(LustmolchError::AlreadyExists {
                kind: "container root",
                id: layout.root().display().to_string(),
            });
        }
        tracing::info!(name = %name, dry_run = self.dry_run, "creating container");
        let settings = &self.config.settings;

        tracing::info!(path = %layout.www_dir().display(), "creating shared www directory");
        self.create_dir(layout.www_dir())?;

        let link = network::allocate_link(&self.config, name)?;
        let ssh_port = ports::allocate_ssh_port(&self.config, name)?;
        let record = ContainerRecord {
            name: name.clone(),
            ssh_port,
            ip_address_host: link.host,
            ip_address_container: link.container,
            ip_subnet_length: settings.ip_subnet_length,
            url: settings.url_for(name),
            users: self
                .config
                .container(name)
                .map(|c| c.users.clone())
                .unwrap_or_default(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        tracing::info!(?record, "generated container values");
        let ctx = TemplateContext::new(&record, &layout);

        for placement in layout.host_files() {
            self.place(&placement, &ctx)?;
        }

        tracing::info!(root = %layout.root().display(), "running debootstrap");
        self.run(&host::debootstrap(
            &settings.debian_flavour,
            layout.root(),
            &settings.debian_mirror,
        ))?;

        tracing::info!("bootstrapping container");
        let script = self.renderer.render("container/bootstrap.sh", &ctx)?;
        let script_path = layout.bootstrap_script();
        self.write_file(&script_path, &script)?;
        self.set_mode(&script_path, SCRIPT_MODE)?;
        self.run(&host::nspawn_run(layout.root(), BOOTSTRAP_SCRIPT))?;

        tracing::info!("installing systemd-nspawn unit");
        self.place(&layout.nspawn_file(), &ctx)?;

        tracing::info!("copying config files into container");
        for placement in layout.container_files() {
            self.place(&placement, &ctx)?;
        }

        tracing::info!("adding iptables rules (filter, nat)");
        for rule in firewall::ssh_rules(
            name,
            ssh_port,
            link.container,
            settings.host_ip,
            &settings.ssn_ip_ranges,
        ) {
            self.run(&rule)?;
        }

        tracing::info!("starting container");
        self.run(&host::machinectl_start(name.as_str()))?;

        tracing::info!("updating registry");
        let _ = self
            .config
            .containers
            .insert(name.to_string(), record.clone());
        self.save()?;

        tracing::info!("all done, ssh server running on port {ssh_port}");
        tracing::info!("to persist the firewall rules run `iptables-save`");
        Ok(record)
    }

    /// Stops a container and deletes its root, config files and registry
    /// entry.
    ///
    /// Missing files are skipped, and other file errors are logged so that
    /// teardown always gets as far as it can. Removing a container that does
    /// not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the registry cannot be saved.
    pub fn remove_container(&mut self, name: &ContainerName) -> Result<()> {
        let layout = self.layout(name);
        tracing::info!(name = %name, "removing container");

        tracing::info!("stopping container");
        if let Err(e) = self.run(&host::machinectl_stop(name.as_str())) {
            tracing::warn!(error = %e, "ignored while stopping container");
        }

        tracing::info!("removing shared www directory");
        self.remove_path(layout.www_dir());

        for placement in layout.host_files() {
            tracing::info!(path = %placement.path.display(), "removing config file");
            self.remove_path(&placement.path);
        }

        tracing::info!("removing nspawn unit");
        self.remove_path(layout.nspawn_unit());

        tracing::info!(root = %layout.root().display(), "removing container root");
        self.remove_path(layout.root());

        if self.config.containers.remove(name.as_str()).is_some() {
            tracing::info!("updating registry");
            self.save()?;
        } else {
            tracing::debug!(name = %name, "container was not registered");
        }

        tracing::info!("all done, iptables rules for the container may need manual removal");
        Ok(())
    }

    /// Appends a public key to the container's root `authorized_keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read, the container root is
    /// missing, or the file cannot be written.
    pub fn install_ssh_key(&self, name: &ContainerName, source: &KeySource) -> Result<PathBuf> {
        let key = source.read()?;
        let layout = self.layout(name);
        tracing::info!(name = %name, path = %layout.authorized_keys().display(), "appending SSH key");
        if self.dry_run {
            return Ok(layout.authorized_keys());
        }
        ssh::install_key(&layout, &key)
    }

    /// Registers a user with a public key, replacing any previous key.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the key cannot be read, or
    /// the registry cannot be saved.
    pub fn add_user(&mut self, name: &str, source: &KeySource) -> Result<()> {
        validate_user_name(name)?;
        let key = source.read()?.trim().to_string();
        tracing::info!(user = name, "adding user");
        let _ = self.config.users.insert(
            name.to_string(),
            UserRecord {
                name: name.to_string(),
                key,
            },
        );
        self.save()
    }

    /// Deletes a user and unassigns it from every container.
    ///
    /// Keys already written into containers stay until the next
    /// [`Manager::update_containers`]. Removing an unknown user only saves
    /// the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be saved.
    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        tracing::info!(user = name, "removing user");
        if self.config.users.remove(name).is_none() {
            tracing::debug!(user = name, "user was not registered");
        }
        for container in self.config.containers.values_mut() {
            container.users.retain(|u| u != name);
        }
        self.save()
    }

    /// Grants a registered user access to a registered container.
    ///
    /// # Errors
    ///
    /// Returns [`LustmolchError::NotFound`] if either is unknown, or an
    /// error if the registry cannot be saved.
    pub fn assign_user(&mut self, user: &str, container: &ContainerName) -> Result<()> {
        if !self.config.users.contains_key(user) {
            return Err(LustmolchError::NotFound {
                kind: "user",
                id: user.to_string(),
            });
        }
        let record = self
            .config
            .containers
            .get_mut(container.as_str())
            .ok_or_else(|| LustmolchError::NotFound {
                kind: "container",
                id: container.to_string(),
            })?;
        if record.users.iter().any(|u| u == user) {
            tracing::info!(user, container = %container, "user already assigned");
            return Ok(());
        }
        record.users.push(user.to_string());
        tracing::info!(user, container = %container, "assigned user");
        self.save()
    }

    /// Rewrites every registered container's `authorized_keys` with the keys
    /// of its assigned users.
    ///
    /// # Errors
    ///
    /// Returns an error if a container root is missing or a file cannot be
    /// written.
    pub fn update_containers(&self) -> Result<()> {
        for record in self.config.containers.values() {
            let layout = self.layout(&record.name);
            let keys: Vec<&str> = record
                .users
                .iter()
                .filter_map(|u| self.config.users.get(u))
                .map(|u| u.key.as_str())
                .collect();

            tracing::info!(
                container = %record.name,
                path = %layout.authorized_keys().display(),
                keys = keys.len(),
                "writing authorized keys"
            );
            if self.dry_run {
                for key in &keys {
                    tracing::info!(container = %record.name, key, "would install key");
                }
                continue;
            }
            let _ = ssh::write_authorized_keys(&layout, &keys)?;
        }
        Ok(())
    }

    /// Registered containers in name order.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.config.containers.values()
    }

    fn run(&self, command: &HostCommand) -> Result<()> {
        self.runner.run(command)
    }

    fn place(&self, placement: &Placement, ctx: &TemplateContext<'_>) -> Result<()> {
        let content = self.renderer.render(placement.template, ctx)?;
        tracing::info!(template = placement.template, path = %placement.path.display(), "placing config file");
        self.write_file(&placement.path, &content)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if self.dry_run {
            tracing::debug!(path = %path.display(), bytes = content.len(), "dry run, not writing");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LustmolchError::io(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| LustmolchError::io(path, e))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|e| LustmolchError::io(path, e))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| LustmolchError::io(path, e))
    }

    fn remove_path(&self, path: &Path) {
        if self.dry_run {
            return;
        }
        let result = match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "already absent");
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignored while removing"),
        }
    }

    fn save(&self) -> Result<()> {
        if self.dry_run {
            tracing::info!(path = %self.config.path().display(), "dry run, registry not saved");
            return Ok(());
        }
        self.config.save()
    }
}

fn validate_user_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LustmolchError::InvalidName {
            name: name.to_string(),
            reason: "user names must be non-empty and contain no whitespace",
        });
    }
    Ok(())
}
