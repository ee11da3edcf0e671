use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Result, SetupError};
use crate::setup::UserRole;

const ID_BINARY: &str = "id";
const SYSADMINCTL_BINARY: &str = "sysadminctl";

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runner responsible for executing local account commands.
pub trait CommandRunner {
    fn run(&self, program: &'static str, args: &[&str]) -> Result<CommandOutput>;
}

pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &'static str, args: &[&str]) -> Result<CommandOutput> {
        let binary = which::which(program)
            .map_err(|_| SetupError::AccountToolMissing { binary: program })?;
        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    SetupError::AccountToolMissing { binary: program }
                } else {
                    SetupError::Io(err)
                }
            })?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Local OS account operations used by the workflow.
pub trait AccountProvisioner {
    /// `Ok(false)` only when the lookup positively reports the account as absent.
    fn account_exists(&self, username: &str) -> Result<bool>;

    fn create_account(
        &self,
        username: &str,
        password: &str,
        full_name: &str,
        role: UserRole,
    ) -> Result<()>;
}

/// macOS provisioner backed by `id` and `sysadminctl`.
pub struct MacAccountProvisioner<R: CommandRunner = SystemCommandRunner> {
    runner: R,
}

impl MacAccountProvisioner<SystemCommandRunner> {
    pub fn system() -> Self {
        Self {
            runner: SystemCommandRunner,
        }
    }
}

impl<R: CommandRunner> MacAccountProvisioner<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> AccountProvisioner for MacAccountProvisioner<R> {
    fn account_exists(&self, username: &str) -> Result<bool> {
        let output = self.runner.run(ID_BINARY, &["-u", username])?;
        if output.success {
            return Ok(true);
        }
        if output.stderr.to_ascii_lowercase().contains("no such user") {
            return Ok(false);
        }
        Err(SetupError::AccountLookup {
            username: username.to_string(),
            message: failure_message(&output, None),
        })
    }

    fn create_account(
        &self,
        username: &str,
        password: &str,
        full_name: &str,
        role: UserRole,
    ) -> Result<()> {
        let mut args = vec![
            "-addUser",
            username,
            "-fullName",
            full_name,
            "-password",
            password,
        ];
        if role.is_admin() {
            args.push("-admin");
        }

        let output = self.runner.run(SYSADMINCTL_BINARY, &args)?;
        if !output.success {
            debug!(code = ?output.code, "sysadminctl failed");
            return Err(SetupError::AccountCreation {
                username: username.to_string(),
                message: failure_message(&output, Some(password)),
            });
        }

        // sysadminctl exits 0 on several failure paths, so confirm the record exists.
        if !self.account_exists(username)? {
            return Err(SetupError::AccountCreation {
                username: username.to_string(),
                message: "account record not found after sysadminctl reported success".into(),
            });
        }
        info!(username, role = role.as_str(), "created local account");
        Ok(())
    }
}

/// Fails unless the process runs with an effective uid of 0.
pub fn ensure_elevated(runner: &dyn CommandRunner) -> Result<()> {
    let output = runner
        .run(ID_BINARY, &["-u"])
        .map_err(|err| SetupError::Privilege(format!("error checking root: {err}")))?;
    if output.success && output.stdout.trim() == "0" {
        return Ok(());
    }
    Err(SetupError::Privilege(
        "must be run as root - please run with sudo, or as root".into(),
    ))
}

fn failure_message(output: &CommandOutput, secret: Option<&str>) -> String {
    let detail = if output.stderr.is_empty() {
        output.stdout.as_str()
    } else {
        output.stderr.as_str()
    };
    let detail = match secret {
        Some(secret) if !secret.is_empty() => detail.replace(secret, "<redacted>"),
        _ => detail.to_string(),
    };
    match output.code {
        Some(code) => format!("exit {code}: {detail}"),
        None => format!("terminated by signal: {detail}"),
    }
}
