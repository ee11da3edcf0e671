use std::fmt;

/// Local account created when nobody is assigned to the device.
pub const SPARE_USERNAME: &str = "spareuser";
pub const SPARE_FULL_NAME: &str = "Spare User";

/// Which branch of the workflow is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupType {
    #[default]
    Unset,
    Spare,
    Named,
}

impl SetupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupType::Unset => "unset",
            SetupType::Spare => "spare",
            SetupType::Named => "named",
        }
    }
}

/// Role of the created account. Admin accounts land on the dev blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserRole {
    #[default]
    Standard,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Standard => "standard",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State threaded through one provisioning run.
///
/// `device_id` is fixed at construction; `username` is always derived from
/// `full_name` (or the spare literal) and never entered by hand.
#[derive(Clone, PartialEq, Eq)]
pub struct SetupVars {
    pub setup_type: SetupType,
    device_id: String,
    pub device_name: String,
    pub full_name: String,
    pub username: String,
    pub password: String,
    pub user_role: UserRole,
    pub confirm: bool,
    pub blueprint: String,
    pub delete_spare: bool,
}

impl SetupVars {
    /// Vars for a named user pulled from the backend assignment.
    pub fn named(
        device_id: impl Into<String>,
        full_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let full_name = full_name.into();
        Self {
            setup_type: SetupType::Named,
            device_id: device_id.into(),
            device_name: String::new(),
            username: derive_username(&full_name),
            full_name,
            password: password.into(),
            user_role: UserRole::Standard,
            confirm: false,
            blueprint: String::new(),
            delete_spare: false,
        }
    }

    /// Vars for the local-only spare account.
    pub fn spare(device_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            setup_type: SetupType::Spare,
            device_id: device_id.into(),
            device_name: String::new(),
            full_name: SPARE_FULL_NAME.to_string(),
            username: SPARE_USERNAME.to_string(),
            password: password.into(),
            user_role: UserRole::Standard,
            confirm: false,
            blueprint: String::new(),
            delete_spare: false,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Text shown at the final review step.
    pub fn review_text(&self) -> String {
        let mut text = format!(
            "Full Name: {}\nUsername: {}\nRole: {}\n",
            self.full_name, self.username, self.user_role
        );
        if !self.device_name.is_empty() {
            text.push_str(&format!("Device Name: {}\n", self.device_name));
        }
        text
    }
}

impl fmt::Debug for SetupVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupVars")
            .field("setup_type", &self.setup_type)
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("full_name", &self.full_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_role", &self.user_role)
            .field("confirm", &self.confirm)
            .field("blueprint", &self.blueprint)
            .field("delete_spare", &self.delete_spare)
            .finish()
    }
}

/// Short name for a full name: lower-cased with every space removed.
pub fn derive_username(full_name: &str) -> String {
    full_name.to_lowercase().replace(' ', "")
}

/// `"<full name> <model>"` when both halves are known, otherwise empty (leave unchanged).
pub fn compose_device_name(full_name: &str, model: &str) -> String {
    let full_name = full_name.trim();
    let model = model.trim();
    if full_name.is_empty() || model.is_empty() {
        return String::new();
    }
    format!("{full_name} {model}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_lowercase_without_spaces() {
        assert_eq!(derive_username("Jane Doe"), "janedoe");
        assert_eq!(derive_username("Mary Ann  Van Dyke"), "maryannvandyke");
        assert_eq!(derive_username(""), "");
    }

    #[test]
    fn username_derivation_is_idempotent() {
        for name in ["Jane Doe", "ALL CAPS NAME", "already"] {
            let once = derive_username(name);
            assert_eq!(derive_username(&once), once);
        }
    }

    #[test]
    fn named_vars_default_to_standard_and_unconfirmed() {
        let vars = SetupVars::named("dev-1", "Jane Doe", "temp-pw");
        assert_eq!(vars.setup_type, SetupType::Named);
        assert_eq!(vars.device_id(), "dev-1");
        assert_eq!(vars.username, "janedoe");
        assert_eq!(vars.user_role, UserRole::Standard);
        assert!(!vars.confirm);
        assert!(vars.blueprint.is_empty());
    }

    #[test]
    fn spare_vars_use_fixed_identity() {
        let vars = SetupVars::spare("dev-1", "spare-pw");
        assert_eq!(vars.username, SPARE_USERNAME);
        assert_eq!(vars.full_name, SPARE_FULL_NAME);
        assert_eq!(vars.password, "spare-pw");
    }

    #[test]
    fn device_name_needs_both_parts() {
        assert_eq!(compose_device_name("Jane Doe", "MacBook Pro"), "Jane Doe MacBook Pro");
        assert_eq!(compose_device_name("Jane Doe", "  "), "");
        assert_eq!(compose_device_name("", "MacBook Pro"), "");
    }

    #[test]
    fn debug_output_hides_password() {
        let vars = SetupVars::named("dev-1", "Jane Doe", "hunter2");
        let rendered = format!("{vars:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn review_text_mentions_device_name_only_when_set() {
        let mut vars = SetupVars::named("dev-1", "Jane Doe", "pw");
        assert!(!vars.review_text().contains("Device Name"));
        vars.device_name = "Jane Doe MacBook Air".into();
        assert!(vars.review_text().contains("Device Name: Jane Doe MacBook Air"));
    }
}
