//! Host command execution.
//!
//! Every external program lustmolch drives (`debootstrap`,
//! `systemd-nspawn`, `machinectl`, `iptables`) goes through a
//! [`CommandRunner`], so dry runs and tests can substitute the real one.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use lustmolch_common::error::{LustmolchError, Result};

/// A host program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    /// Program name, resolved through `PATH`.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Whether a non-zero exit aborts the caller.
    pub check: bool,
    /// Whether stdout/stderr are captured instead of inherited.
    pub capture: bool,
}

impl HostCommand {
    /// A checked, captured invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            check: true,
            capture: true,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Tolerates a non-zero exit status.
    #[must_use]
    pub const fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    /// Lets the program write to the terminal.
    #[must_use]
    pub const fn inherit_output(mut self) -> Self {
        self.capture = false;
        self
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// `debootstrap <flavour> <root> <mirror>`.
pub fn debootstrap(flavour: &str, root: &Path, mirror: &str) -> HostCommand {
    let root = root.display().to_string();
    HostCommand::new("debootstrap").args([flavour, root.as_str(), mirror])
}

/// `systemd-nspawn -D <root> <script>`, run once to provision the root.
pub fn nspawn_run(root: &Path, script: &str) -> HostCommand {
    let root = root.display().to_string();
    HostCommand::new("systemd-nspawn")
        .args(["-D", root.as_str(), script])
        .inherit_output()
}

/// `machinectl start <name>`.
pub fn machinectl_start(name: &str) -> HostCommand {
    HostCommand::new("machinectl").args(["start", name])
}

/// `machinectl stop <name>`; a machine that is not running is fine.
pub fn machinectl_stop(name: &str) -> HostCommand {
    HostCommand::new("machinectl").args(["stop", name]).unchecked()
}

/// Executes host commands.
pub trait CommandRunner {
    /// Runs `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if `command.check` is set and the program cannot be
    /// found, cannot be spawned, or exits unsuccessfully. Failures of
    /// unchecked commands are only logged.
    fn run(&self, command: &HostCommand) -> Result<()>;
}

/// Runs commands on the host.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &HostCommand) -> Result<()> {
        match execute(command) {
            Err(e) if !command.check => {
                tracing::warn!(command = %command, error = %e, "host command failed, continuing");
                Ok(())
            }
            result => result,
        }
    }
}

/// Runs `command` and reports any failure, whether or not it is checked.
fn execute(command: &HostCommand) -> Result<()> {
    let program = which::which(&command.program).map_err(|_| LustmolchError::NotFound {
        kind: "host program",
        id: command.program.clone(),
    })?;
    tracing::debug!(command = %command, "running host command");

    let mut cmd = std::process::Command::new(&program);
    let _ = cmd.args(&command.args);
    if command.capture {
        let _ = cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        let _ = cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    let output = cmd.output().map_err(|e| LustmolchError::Command {
        program: command.program.clone(),
        message: e.to_string(),
    })?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = if stderr.trim().is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {}", output.status, stderr.trim())
    };
    Err(LustmolchError::Command {
        program: command.program.clone(),
        message,
    })
}

/// Logs commands instead of running them.
#[derive(Debug, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, command: &HostCommand) -> Result<()> {
        tracing::info!(command = %command, "dry run, not executing");
        Ok(())
    }
}

/// Fails unless running with an effective UID of 0.
///
/// # Errors
///
/// Returns [`LustmolchError::PermissionDenied`] for unprivileged users.
pub fn ensure_root(action: &str) -> Result<()> {
    if nix::unistd::Uid::effective().is_root() {
        return Ok(());
    }
    Err(LustmolchError::PermissionDenied {
        message: format!("{action} must be run as root"),
    })
}
