use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::{Result, SetupError};
use crate::profile::DEFAULT_PROFILE_PATH;
use crate::setup::UserRole;

pub const DEFAULT_CONFIG_PATH: &str = "/Library/UserSetup/config.json";

/// Top-level CLI structure.
#[derive(Debug, Parser)]
#[command(
    name = "mdm-user-setup",
    version,
    about = "Create the local account for a freshly enrolled Mac and sync it to Kandji.",
    long_about = "Must run as root. Reads the Kandji device id from the managed preferences profile, looks up the assigned user, creates the matching local account (or the spare account when nobody is assigned), then updates the device blueprint in Kandji."
)]
pub struct CliArgs {
    /// Path to the secrets/config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "USER_SETUP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Path to the MDM global variables profile.
    #[arg(long, env = "USER_SETUP_PROFILE", default_value = DEFAULT_PROFILE_PATH)]
    pub profile: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

/// Contents of the externally provided config file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SetupConfig {
    #[serde(rename = "KANDJI_API_TOKEN")]
    pub api_token: String,
    #[serde(rename = "KANDJI_API_URL")]
    pub api_url: String,
    #[serde(rename = "KANDJI_STANDARD_BLUEPRINT")]
    pub standard_blueprint: String,
    #[serde(rename = "KANDJI_DEV_BLUEPRINT")]
    pub dev_blueprint: String,
    #[serde(rename = "TEMP_PASSWORD")]
    pub temp_password: String,
    #[serde(rename = "SPARE_PASSWORD")]
    pub spare_password: String,
}

impl fmt::Debug for SetupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupConfig")
            .field("api_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("standard_blueprint", &self.standard_blueprint)
            .field("dev_blueprint", &self.dev_blueprint)
            .field("temp_password", &"<redacted>")
            .field("spare_password", &"<redacted>")
            .finish()
    }
}

impl SetupConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SetupError::Config(format!(
                "error reading config file {}: {err}",
                path.display()
            ))
        })?;

        let config: SetupConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|err| SetupError::Config(format!("toml parse error: {err}")))?,
            _ => serde_json::from_str(&contents)
                .map_err(|err| SetupError::Config(format!("error unmarshalling config: {err}")))?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("KANDJI_API_TOKEN", &self.api_token),
            ("KANDJI_API_URL", &self.api_url),
            ("KANDJI_STANDARD_BLUEPRINT", &self.standard_blueprint),
            ("KANDJI_DEV_BLUEPRINT", &self.dev_blueprint),
            ("TEMP_PASSWORD", &self.temp_password),
            ("SPARE_PASSWORD", &self.spare_password),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(SetupError::Config(format!(
                "missing values for {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Blueprint id assigned for a role.
    pub fn blueprint_for(&self, role: UserRole) -> &str {
        match role {
            UserRole::Admin => &self.dev_blueprint,
            UserRole::Standard => &self.standard_blueprint,
        }
    }
}

/// Complete configuration used by the binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile_path: PathBuf,
    pub setup: SetupConfig,
}

impl AppConfig {
    pub fn from_args(cli: CliArgs) -> Result<Self> {
        let setup = SetupConfig::load(&cli.config)?;
        Ok(Self {
            profile_path: cli.profile,
            setup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const JSON_CONFIG: &str = r#"{
        "KANDJI_API_TOKEN": "token",
        "KANDJI_API_URL": "acme.api.kandji.io/api/v1",
        "KANDJI_STANDARD_BLUEPRINT": "bp-standard",
        "KANDJI_DEV_BLUEPRINT": "bp-dev",
        "TEMP_PASSWORD": "temp-pw",
        "SPARE_PASSWORD": "spare-pw"
    }"#;

    #[test]
    fn loads_json_config() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, JSON_CONFIG).unwrap();
        let config = SetupConfig::load(&path).expect("config loads");
        assert_eq!(config.api_url, "acme.api.kandji.io/api/v1");
        assert_eq!(config.blueprint_for(UserRole::Admin), "bp-dev");
        assert_eq!(config.blueprint_for(UserRole::Standard), "bp-standard");
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
KANDJI_API_TOKEN = "token"
KANDJI_API_URL = "acme.api.kandji.io/api/v1"
KANDJI_STANDARD_BLUEPRINT = "bp-standard"
KANDJI_DEV_BLUEPRINT = "bp-dev"
TEMP_PASSWORD = "temp-pw"
SPARE_PASSWORD = "spare-pw"
"#,
        )
        .unwrap();
        let config = SetupConfig::load(&path).expect("config loads");
        assert_eq!(config.spare_password, "spare-pw");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempdir().expect("temp dir");
        let err = SetupConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SetupError::Config(_)));
        assert!(err.to_string().contains("error reading config file"));
    }

    #[test]
    fn malformed_or_incomplete_config_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(SetupConfig::load(&path).is_err());

        fs::write(&path, JSON_CONFIG.replace("spare-pw", "")).unwrap();
        let err = SetupConfig::load(&path).unwrap_err();
        assert!(
            err.to_string().contains("SPARE_PASSWORD"),
            "expected missing key in error, got {err}"
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config: SetupConfig = serde_json::from_str(JSON_CONFIG).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("temp-pw"));
        assert!(!rendered.contains("\"token\""));
    }

    #[test]
    fn cli_defaults_point_at_managed_paths() {
        if std::env::var("USER_SETUP_CONFIG").is_ok() || std::env::var("USER_SETUP_PROFILE").is_ok()
        {
            eprintln!("USER_SETUP_* set; skipping default path test");
            return;
        }
        let cli = CliArgs::parse_from(["mdm-user-setup"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.profile, PathBuf::from(DEFAULT_PROFILE_PATH));
        assert!(!cli.verbose);
    }

    #[test]
    fn app_config_reads_file_from_flag() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, JSON_CONFIG).unwrap();
        let cli = CliArgs::parse_from([
            "mdm-user-setup",
            "--config",
            path.to_str().unwrap(),
            "--profile",
            "/tmp/profile.plist",
            "--verbose",
        ]);
        let config = AppConfig::from_args(cli).expect("config builds");
        assert_eq!(config.profile_path, PathBuf::from("/tmp/profile.plist"));
        assert_eq!(config.setup.dev_blueprint, "bp-dev");
    }
}
