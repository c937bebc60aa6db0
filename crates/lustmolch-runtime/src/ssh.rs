//! `authorized_keys` management inside container roots.

use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use lustmolch_common::error::{LustmolchError, Result};

use crate::layout::ContainerLayout;

const SSH_DIR_MODE: u32 = 0o700;
const AUTHORIZED_KEYS_MODE: u32 = 0o600;

/// Where a public key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The key itself.
    Literal(String),
    /// A file holding the key, e.g. `~/.ssh/id_ed25519.pub`.
    File(PathBuf),
}

impl KeySource {
    /// Picks a source from a CLI argument and the `--key-string` flag.
    pub fn from_arg(value: impl Into<String>, literal: bool) -> Self {
        let value = value.into();
        if literal {
            Self::Literal(value)
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    /// Reads the key text.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be read or the key is blank.
    pub fn read(&self) -> Result<String> {
        let key = match self {
            Self::Literal(key) => key.clone(),
            Self::File(path) => {
                std::fs::read_to_string(path).map_err(|e| LustmolchError::io(path, e))?
            }
        };
        if key.trim().is_empty() {
            return Err(LustmolchError::Config {
                message: "public key is empty".into(),
            });
        }
        Ok(key)
    }
}

/// Appends `key` to root's `authorized_keys` in the container.
///
/// Creates `.ssh` (0700) and the file (0600) as needed. Each key ends up on
/// its own line; installing a key twice yields two entries.
///
/// # Errors
///
/// Returns an error if the container root is missing or a file operation
/// fails.
pub fn install_key(layout: &ContainerLayout, key: &str) -> Result<PathBuf> {
    require_root_dir(layout)?;
    let ssh_dir = layout.ssh_dir();
    ensure_ssh_dir(&ssh_dir)?;

    let path = layout.authorized_keys();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .mode(AUTHORIZED_KEYS_MODE)
        .open(&path)
        .map_err(|e| LustmolchError::io(&path, e))?;
    file.write_all(as_line(key).as_bytes())
        .map_err(|e| LustmolchError::io(&path, e))?;
    set_mode(&path, AUTHORIZED_KEYS_MODE)?;

    tracing::info!(container = %layout.name(), path = %path.display(), "appended SSH key");
    Ok(path)
}

/// Replaces root's `authorized_keys` with exactly `keys`.
///
/// # Errors
///
/// Returns an error if the container root is missing or a file operation
/// fails.
pub fn write_authorized_keys(layout: &ContainerLayout, keys: &[&str]) -> Result<PathBuf> {
    require_root_dir(layout)?;
    let ssh_dir = layout.ssh_dir();
    ensure_ssh_dir(&ssh_dir)?;

    let path = layout.authorized_keys();
    let content: String = keys.iter().map(|k| as_line(k)).collect();
    std::fs::write(&path, content).map_err(|e| LustmolchError::io(&path, e))?;
    set_mode(&path, AUTHORIZED_KEYS_MODE)?;

    tracing::info!(container = %layout.name(), keys = keys.len(), "rewrote authorized_keys");
    Ok(path)
}

fn require_root_dir(layout: &ContainerLayout) -> Result<()> {
    if layout.root().is_dir() {
        return Ok(());
    }
    Err(LustmolchError::NotFound {
        kind: "container root",
        id: layout.root().display().to_string(),
    })
}

fn ensure_ssh_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir).map_err(|e| LustmolchError::io(dir, e))?;
        set_mode(dir, SSH_DIR_MODE)?;
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| LustmolchError::io(path, e))
}

fn as_line(key: &str) -> String {
    let mut line = key.trim_end_matches(['\r', '\n']).to_string();
    line.push('\n');
    line
}
