#![forbid(unsafe_code)]

pub mod accounts;
pub mod config;
pub mod error;
pub mod kandji;
pub mod profile;
pub mod prompt;
pub mod setup;
pub mod telemetry;
pub mod workflow;

pub use config::{AppConfig, CliArgs, SetupConfig};
pub use error::SetupError;
pub use kandji::{DeviceBackend, DeviceDetails, DeviceUser, KandjiClient};
pub use setup::{SetupType, SetupVars, UserRole};
pub use workflow::{Provisioner, RunOutcome, Summary};
