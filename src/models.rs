//! Response records read by the pipeline
//!
//! Only the fields an operation acts on are required; everything else the
//! server sends is optional or ignored.

use serde::{Deserialize, Serialize};

use crate::session::VersionUpdate;

/// Status value of an application version the server accepts
pub const STATUS_AVAILABLE: &str = "available";

/// One entry of the system info version list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    /// Application version string
    pub app_version: String,
    /// Asset version paired with it
    pub asset_version: String,
    /// `available`, `not_available`, `maintenance`, ...
    pub app_version_status: String,
    /// Deployment profile, e.g. `production`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_profile: Option<String>,
    /// Version required for multiplayer rooms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_play_version: Option<String>,
    /// Master data version, when the server pins one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_version: Option<String>,
    /// Build hash of the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_hash: Option<String>,
}

impl AppVersion {
    /// Whether clients on this version may play
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.app_version_status == STATUS_AVAILABLE
    }

    /// Version fields to advance the session to
    #[must_use]
    pub fn to_update(&self) -> VersionUpdate {
        VersionUpdate {
            app_version: self.app_version.clone(),
            asset_version: self.asset_version.clone(),
            data_version: self.data_version.clone(),
            app_hash: self.app_hash.clone(),
        }
    }
}

/// `GET /api/system`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Versions the server knows about
    pub app_versions: Vec<AppVersion>,
    /// Server time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_date: Option<i64>,
    /// Server timezone name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Deployment profile of the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Maintenance flag as reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_status: Option<String>,
}

impl SystemInfo {
    /// First available entry for exactly `app_version`
    #[must_use]
    pub fn available_entry_for(&self, app_version: &str) -> Option<&AppVersion> {
        self.app_versions
            .iter()
            .find(|entry| entry.is_available() && entry.app_version == app_version)
    }
}

/// Registration record inside [`NewUser`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    /// Server-assigned user id
    pub user_id: u64,
    /// Registration signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Platform echoed back from the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Device model echoed back from the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Operating system echoed back from the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    /// Registration time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<i64>,
}

/// `POST /api/user`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// The created account
    pub user_registration: UserRegistration,
    /// Credential for later auth calls
    #[serde(skip_serializing)]
    pub credential: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("user_registration", &self.user_registration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(version: &str, asset: &str, status: &str) -> AppVersion {
        AppVersion {
            app_version: version.to_string(),
            asset_version: asset.to_string(),
            app_version_status: status.to_string(),
            system_profile: None,
            multi_play_version: None,
            data_version: None,
            app_hash: None,
        }
    }

    #[test]
    fn test_first_available_exact_match_wins() {
        let info = SystemInfo {
            app_versions: vec![
                entry("4.1.0", "4.1.0.10", "not_available"),
                entry("4.1.0", "4.1.0.40", "available"),
                entry("4.1.0", "4.1.0.50", "available"),
                entry("4.2.0", "4.2.0.10", "available"),
            ],
            server_date: None,
            timezone: None,
            profile: None,
            maintenance_status: None,
        };
        let found = info.available_entry_for("4.1.0").unwrap();
        assert_eq!(found.asset_version, "4.1.0.40");
        assert!(info.available_entry_for("4.0.0").is_none());
    }

    #[test]
    fn test_decode_from_packed_value() {
        use crate::codec::map;
        use rmpv::Value;

        let value = map([
            ("serverDate", Value::from(1_700_000_000_000_i64)),
            ("timezone", Value::from("Asia/Tokyo")),
            ("somethingNew", Value::from(true)),
            (
                "appVersions",
                Value::Array(vec![map([
                    ("systemProfile", Value::from("production")),
                    ("appVersion", Value::from("4.1.0")),
                    ("multiPlayVersion", Value::from("4.1.0")),
                    ("assetVersion", Value::from("4.1.0.40")),
                    ("appVersionStatus", Value::from("available")),
                ])]),
            ),
        ]);

        let info: SystemInfo = crate::codec::from_value(value).unwrap();
        assert_eq!(info.server_date, Some(1_700_000_000_000));
        assert_eq!(info.app_versions.len(), 1);
        assert!(info.app_versions[0].is_available());
        assert_eq!(info.app_versions[0].data_version, None);
    }

    #[test]
    fn test_new_user_debug_hides_credential() {
        let user = NewUser {
            user_registration: UserRegistration {
                user_id: 1,
                signature: None,
                platform: None,
                device_model: None,
                operating_system: None,
                registered_at: None,
            },
            credential: "very-secret".to_string(),
        };
        assert!(!format!("{user:?}").contains("very-secret"));
    }
}
