use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SetupError};

pub const DEFAULT_PROFILE_PATH: &str =
    "/Library/Managed Preferences/io.kandji.globalvariables.plist";

/// Global variables the MDM agent drops on the device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceProfile {
    #[serde(rename = "DEVICE_ID")]
    pub device_id: String,
    #[serde(rename = "FULL_NAME", default)]
    pub full_name: Option<String>,
}

impl DeviceProfile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SetupError::Identity(format!(
                "profile not found at {}",
                path.display()
            )));
        }
        let profile: DeviceProfile = plist::from_file(path).map_err(|err| {
            SetupError::Identity(format!("error decoding {}: {err}", path.display()))
        })?;
        if profile.device_id.trim().is_empty() {
            return Err(SetupError::Identity(format!(
                "DEVICE_ID is empty in {}",
                path.display()
            )));
        }
        Ok(profile)
    }

    /// Full name cached on the device, if the agent has synced one.
    pub fn cached_full_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}
