use std::fmt;
use std::io::{self, IsTerminal};

use tracing::{debug, info, info_span, warn};

use crate::accounts::{
    AccountProvisioner, MacAccountProvisioner, SystemCommandRunner, ensure_elevated,
};
use crate::config::{AppConfig, CliArgs, SetupConfig};
use crate::error::Result;
use crate::kandji::{DeviceBackend, DeviceDetails, KandjiClient};
use crate::profile::DeviceProfile;
use crate::prompt::{CliDecisionSurface, DecisionSurface, DenyDecisionSurface};
use crate::setup::{SPARE_USERNAME, SetupType, SetupVars, compose_device_name};

const LOGIN_INSTRUCTION: &str = "IMPORTANT: Log out of the current user and log in to the new user to ensure it gets secure token before shutting down.";

/// How a run ended when nothing fatal happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Summary),
    /// Operator said no, or there was nothing to do. Nothing was changed.
    Aborted(String),
}

/// Operator-facing report printed at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    pub setup_type: SetupType,
    pub assigned_user: Option<String>,
    pub blueprint_name: Option<String>,
    pub device_name: Option<String>,
    pub account_note: String,
    pub warnings: Vec<String>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.assigned_user {
            writeln!(f, "Assigned User: {user}")?;
        }
        if let Some(blueprint) = &self.blueprint_name {
            writeln!(f, "Blueprint: {blueprint}")?;
        }
        if let Some(name) = &self.device_name {
            writeln!(f, "Device Name: {name}")?;
        }
        if self.assigned_user.is_some() || self.blueprint_name.is_some() {
            writeln!(f)?;
        }
        writeln!(f, "{}", self.account_note)?;
        writeln!(f, "{LOGIN_INSTRUCTION}")?;
        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "- {warning}")?;
            }
        }
        Ok(())
    }
}

/// Empty assignment means the spare branch; any assigned name means the named branch.
pub fn select_setup_type(details: &DeviceDetails) -> SetupType {
    match details.assigned_user_name() {
        Some(_) => SetupType::Named,
        None => SetupType::Spare,
    }
}

/// Drives one provisioning run against injected collaborators.
pub struct Provisioner<'a> {
    config: &'a SetupConfig,
    backend: &'a dyn DeviceBackend,
    accounts: &'a dyn AccountProvisioner,
    prompts: &'a mut dyn DecisionSurface,
    profile_name: Option<String>,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a SetupConfig,
        backend: &'a dyn DeviceBackend,
        accounts: &'a dyn AccountProvisioner,
        prompts: &'a mut dyn DecisionSurface,
    ) -> Self {
        Self {
            config,
            backend,
            accounts,
            prompts,
            profile_name: None,
        }
    }

    /// Full name cached in the device profile, compared against the backend assignment.
    pub fn with_profile_name(mut self, name: Option<&str>) -> Self {
        self.profile_name = name.map(str::to_string);
        self
    }

    pub fn run(&mut self, device_id: &str) -> Result<RunOutcome> {
        let initial = self.backend.fetch_device_details(device_id)?;
        let setup_type = select_setup_type(&initial);

        let span = info_span!("provision", device_id, setup_type = setup_type.as_str());
        let _enter = span.enter();
        info!(
            blueprint = %initial.blueprint_name,
            "fetched initial device details"
        );

        match setup_type {
            SetupType::Named => self.run_assigned(device_id, &initial),
            SetupType::Spare | SetupType::Unset => self.run_spare(device_id),
        }
    }

    fn run_assigned(&mut self, device_id: &str, initial: &DeviceDetails) -> Result<RunOutcome> {
        let full_name = initial.assigned_user_name().unwrap_or_default().to_string();
        let title =
            format!("Assigned user detected in Kandji: {full_name}. Continue with user setup?");
        if !self.prompts.confirm(&title)? {
            return Ok(RunOutcome::Aborted("Exiting program.".into()));
        }

        let mut vars = SetupVars::named(device_id, &full_name, &self.config.temp_password);
        vars.device_name = compose_device_name(&full_name, &initial.model);

        self.prompts.collect_user_choices(&mut vars)?;
        if !vars.confirm {
            return Ok(RunOutcome::Aborted("Exiting program.".into()));
        }
        debug!(?vars, "user setup choices collected");

        let account_note = if self.accounts.account_exists(&vars.username)? {
            info!(username = %vars.username, "local account already exists; skipping creation");
            format!(
                "User {} already exists on this Mac. User creation was skipped.",
                vars.username
            )
        } else {
            self.accounts.create_account(
                &vars.username,
                &vars.password,
                &vars.full_name,
                vars.user_role,
            )?;
            format!(
                "User {} ({} user) created with default password.",
                vars.username, vars.user_role
            )
        };

        vars.blueprint = self.config.blueprint_for(vars.user_role).to_string();
        self.backend.set_blueprint(vars.device_id(), &vars.blueprint)?;
        info!(blueprint = %vars.blueprint, "blueprint updated");

        let mut warnings = Vec::new();
        if let Some(cached) = &self.profile_name
            && !cached.trim().eq_ignore_ascii_case(full_name.trim())
        {
            warn!(
                cached = %cached,
                assigned = %full_name,
                "device profile name differs from Kandji"
            );
            warnings.push(format!("device profile lists {cached} but Kandji assigns {full_name}"));
        }
        if !vars.device_name.is_empty()
            && let Err(err) = self
                .backend
                .set_device_name(vars.device_id(), &vars.device_name)
        {
            warn!("device rename failed: {err}");
            warnings.push(format!("device name was not updated: {err}"));
        }

        if vars.delete_spare {
            if vars.username == SPARE_USERNAME {
                warnings.push("spare user deletion skipped: it is the account being set up".into());
            } else if let Err(err) = self.backend.delete_account(vars.device_id(), SPARE_USERNAME) {
                warn!("spare user deletion failed: {err}");
                warnings.push(format!("spare user was not deleted: {err}"));
            } else {
                info!("spare user deletion requested");
            }
        }

        let verified = self.backend.fetch_device_details(vars.device_id())?;

        Ok(RunOutcome::Completed(Summary {
            setup_type: SetupType::Named,
            assigned_user: Some(
                verified
                    .assigned_user_name()
                    .unwrap_or_default()
                    .to_string(),
            ),
            blueprint_name: Some(verified.blueprint_name.clone()),
            device_name: (!vars.device_name.is_empty()).then(|| verified.device_name.clone()),
            account_note,
            warnings,
        }))
    }

    fn run_spare(&mut self, device_id: &str) -> Result<RunOutcome> {
        if self.accounts.account_exists(SPARE_USERNAME)? {
            return Ok(RunOutcome::Aborted(
                "No assigned user in Kandji, but Spare User already exists. Exiting program."
                    .into(),
            ));
        }

        if !self
            .prompts
            .confirm("No assigned user in Kandji. Continue with Spare User setup?")?
        {
            return Ok(RunOutcome::Aborted("Exiting program.".into()));
        }

        let vars = SetupVars::spare(device_id, &self.config.spare_password);
        self.accounts.create_account(
            &vars.username,
            &vars.password,
            &vars.full_name,
            vars.user_role,
        )?;

        Ok(RunOutcome::Completed(Summary {
            setup_type: SetupType::Spare,
            account_note: format!(
                "{} ({}) created with default password.",
                vars.full_name, vars.username
            ),
            ..Summary::default()
        }))
    }
}

/// Full run for the binary: privilege, config, device identity, then the workflow.
pub fn run_program(cli: CliArgs) -> Result<RunOutcome> {
    ensure_elevated(&SystemCommandRunner)?;
    let config = AppConfig::from_args(cli)?;

    let profile = DeviceProfile::load(&config.profile_path)?;
    let client = KandjiClient::new(&config.setup.api_url, config.setup.api_token.clone())?;
    debug!(base_url = client.base_url(), device_id = %profile.device_id, "starting run");

    let accounts = MacAccountProvisioner::system();
    if io::stdin().is_terminal() {
        let mut prompts = CliDecisionSurface::new(io::stdin().lock(), io::stdout());
        Provisioner::new(&config.setup, &client, &accounts, &mut prompts)
            .with_profile_name(profile.cached_full_name())
            .run(&profile.device_id)
    } else {
        let mut prompts = DenyDecisionSurface;
        Provisioner::new(&config.setup, &client, &accounts, &mut prompts)
            .with_profile_name(profile.cached_full_name())
            .run(&profile.device_id)
    }
}
