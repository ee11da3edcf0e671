use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, SetupError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the workflow needs from the device-management backend.
///
/// Every call is a single attempt; retry policy belongs to the caller.
pub trait DeviceBackend {
    fn fetch_device_details(&self, device_id: &str) -> Result<DeviceDetails>;
    fn set_blueprint(&self, device_id: &str, blueprint_id: &str) -> Result<()>;
    fn set_device_name(&self, device_id: &str, name: &str) -> Result<()>;
    fn delete_account(&self, device_id: &str, account_name: &str) -> Result<()>;
}

/// Backend view of a device. Unknown fields are ignored and missing ones default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceDetails {
    #[serde(deserialize_with = "null_as_default")]
    pub device_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub device_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(deserialize_with = "null_as_default")]
    pub serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub platform: String,
    #[serde(deserialize_with = "null_as_default")]
    pub os_version: String,
    #[serde(deserialize_with = "deserialize_user")]
    pub user: Option<DeviceUser>,
    #[serde(deserialize_with = "null_as_default")]
    pub asset_tag: String,
    #[serde(deserialize_with = "null_as_default")]
    pub blueprint_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub blueprint_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mdm_enabled: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_installed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_missing: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_removed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_version: String,
}

impl DeviceDetails {
    /// Display name of the assigned user, `None` when nobody is assigned.
    pub fn assigned_user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceUser {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

// `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Kandji sends `"user": ""` for unassigned devices and an object otherwise.
fn deserialize_user<'de, D>(deserializer: D) -> std::result::Result<Option<DeviceUser>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => {
            let user: DeviceUser = serde_json::from_value(value).map_err(de::Error::custom)?;
            Ok((!user.name.trim().is_empty()).then_some(user))
        }
        _ => Ok(None),
    }
}

#[derive(Debug, Serialize)]
struct DeleteUserPayload<'a> {
    #[serde(rename = "DeleteAllUsers")]
    delete_all_users: bool,
    #[serde(rename = "ForceDeletion")]
    force_deletion: bool,
    #[serde(rename = "UserName")]
    user_name: &'a str,
}

/// Blocking Kandji API client authenticated with a bearer token.
pub struct KandjiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for KandjiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KandjiClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl KandjiClient {
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SetupError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: api_base(api_url),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(
        &self,
        context: &str,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%method, %url, "kandji request");

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|err| SetupError::BackendTransport {
            context: context.to_string(),
            status: None,
            message: format!("error sending request: {err}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SetupError::BackendTransport {
                context: context.to_string(),
                status: Some(status.as_u16()),
                message: format!("error response: {status}"),
            });
        }

        response.text().map_err(|err| SetupError::BackendTransport {
            context: context.to_string(),
            status: Some(status.as_u16()),
            message: format!("error reading response: {err}"),
        })
    }
}

impl DeviceBackend for KandjiClient {
    fn fetch_device_details(&self, device_id: &str) -> Result<DeviceDetails> {
        let context = "error getting computer details";
        let body = self
            .call(context, Method::GET, &format!("devices/{device_id}"), None)
            .map_err(|err| match err.status() {
                Some(404) => SetupError::BackendNotFound {
                    device_id: device_id.to_string(),
                },
                _ => err,
            })?;
        serde_json::from_str(&body).map_err(|err| SetupError::BackendDecode {
            context: context.to_string(),
            message: err.to_string(),
        })
    }

    fn set_blueprint(&self, device_id: &str, blueprint_id: &str) -> Result<()> {
        let payload = json!({ "blueprint_id": blueprint_id });
        self.call(
            "error updating blueprint",
            Method::PATCH,
            &format!("devices/{device_id}"),
            Some(&payload),
        )?;
        Ok(())
    }

    fn set_device_name(&self, device_id: &str, name: &str) -> Result<()> {
        let payload = json!({ "device_name": name });
        self.call(
            "error updating computer name",
            Method::PATCH,
            &format!("devices/{device_id}"),
            Some(&payload),
        )?;
        Ok(())
    }

    fn delete_account(&self, device_id: &str, account_name: &str) -> Result<()> {
        let payload = DeleteUserPayload {
            delete_all_users: false,
            force_deletion: false,
            user_name: account_name,
        };
        let payload = serde_json::to_value(&payload).map_err(|err| SetupError::BackendDecode {
            context: "error deleting user".to_string(),
            message: err.to_string(),
        })?;
        self.call(
            "error deleting user",
            Method::POST,
            &format!("devices/{device_id}/action/deleteuser"),
            Some(&payload),
        )?;
        Ok(())
    }
}

/// Scheme-qualified base URL for a configured API host.
pub fn api_base(api_url: &str) -> String {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if is_loopback_host(trimmed) {
        format!("http://{trimmed}")
    } else {
        format!("https://{trimmed}")
    }
}

fn is_loopback_host(host_and_path: &str) -> bool {
    let authority = host_and_path.split('/').next().unwrap_or_default();
    if let Some(rest) = authority.strip_prefix("[::1]") {
        return rest.is_empty() || rest.starts_with(':');
    }
    let host = authority.split(':').next().unwrap_or_default();
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<Ipv4Addr>().is_ok_and(|addr| addr.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_defaults_to_https() {
        assert_eq!(
            api_base("acme.api.kandji.io/api/v1/"),
            "https://acme.api.kandji.io/api/v1"
        );
    }

    #[test]
    fn api_base_uses_http_for_loopback_and_keeps_explicit_scheme() {
        assert_eq!(api_base("127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(api_base("localhost:9000/api"), "http://localhost:9000/api");
        assert_eq!(api_base("http://mock.local/api"), "http://mock.local/api");
    }

    #[test]
    fn api_base_matches_loopback_hosts_exactly() {
        assert_eq!(api_base("[::1]:8080/api"), "http://[::1]:8080/api");
        assert_eq!(api_base("127.10.0.1"), "http://127.10.0.1");
        assert_eq!(
            api_base("localhost.example.com/api/v1"),
            "https://localhost.example.com/api/v1"
        );
        assert_eq!(api_base("127.example.com"), "https://127.example.com");
        assert_eq!(api_base("[::1]evil.com"), "https://[::1]evil.com");
    }

    #[test]
    fn null_fields_decode_as_defaults() {
        let details: DeviceDetails = serde_json::from_value(json!({
            "device_id": "abc",
            "device_name": null,
            "model": "MacBook Pro",
            "user": { "name": "Jane Doe" },
            "asset_tag": null,
            "blueprint_name": "Standard",
            "mdm_enabled": null,
            "agent_version": null
        }))
        .unwrap();
        assert_eq!(details.asset_tag, "");
        assert_eq!(details.device_name, "");
        assert!(!details.mdm_enabled);
        assert_eq!(details.assigned_user_name(), Some("Jane Doe"));
    }

    #[test]
    fn null_user_name_means_unassigned() {
        let details: DeviceDetails =
            serde_json::from_value(json!({ "device_id": "abc", "user": { "name": null } }))
                .unwrap();
        assert_eq!(details.assigned_user_name(), None);
    }

    #[test]
    fn assigned_user_decodes_from_object() {
        let details: DeviceDetails = serde_json::from_value(json!({
            "device_id": "abc",
            "user": { "name": "Jane Doe", "email": "jane@example.com" },
            "blueprint_name": "Standard"
        }))
        .unwrap();
        assert_eq!(details.assigned_user_name(), Some("Jane Doe"));
        assert_eq!(details.blueprint_name, "Standard");
    }

    #[test]
    fn empty_string_user_means_unassigned() {
        let details: DeviceDetails =
            serde_json::from_value(json!({ "device_id": "abc", "user": "" })).unwrap();
        assert_eq!(details.assigned_user_name(), None);
    }

    #[test]
    fn null_missing_or_blank_user_means_unassigned() {
        for body in [
            json!({ "device_id": "abc", "user": null }),
            json!({ "device_id": "abc" }),
            json!({ "device_id": "abc", "user": { "name": "  " } }),
        ] {
            let details: DeviceDetails = serde_json::from_value(body).unwrap();
            assert!(details.user.is_none());
        }
    }

    #[test]
    fn delete_payload_uses_backend_field_names() {
        let payload = DeleteUserPayload {
            delete_all_users: false,
            force_deletion: false,
            user_name: "spareuser",
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "DeleteAllUsers": false, "ForceDeletion": false, "UserName": "spareuser" })
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let client = KandjiClient::new("acme.api.kandji.io", "secret-token").unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }
}
