use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::EnrollError;

/// Host that issues the enrollment links for CruzID MFA.
pub const DEFAULT_ENROLLMENT_HOST: &str = "m-268194b0.duosecurity.com";

/// Host that serves the activation endpoint for the same tenant.
pub const DEFAULT_API_HOST: &str = "api-268194b0.duosecurity.com";

pub const DEFAULT_LABEL: &str = "Cruz_ID_MFA";

/// The device identity sent with the activation request. The defaults
/// replay what the Android app sends, including the odd capitalisation
/// of the two boolean fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub app_id: String,
    pub app_version: String,
    pub app_build_number: String,
    pub full_disk_encryption: String,
    pub manufacturer: String,
    pub model: String,
    pub platform: String,
    pub jailbroken: String,
    pub version: String,
    pub language: String,
    pub customer_protocol: String,
    pub user_agent: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            app_id: String::from("com.duosecurity.duomobile.app.DMApplication"),
            app_version: String::from("2.3.3"),
            app_build_number: String::from("323206"),
            full_disk_encryption: String::from("false"),
            manufacturer: String::from("Google"),
            model: String::from("Pixel"),
            platform: String::from("Android"),
            jailbroken: String::from("False"),
            version: String::from("6.0"),
            language: String::from("EN"),
            customer_protocol: String::from("1"),
            user_agent: String::from("okhttp/3.11.0"),
        }
    }
}

impl DeviceProfile {
    /// Load a profile from a JSON file. Fields missing from the file keep
    /// their default value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EnrollError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            EnrollError::Config(format!("invalid device profile {}: {}", path.display(), e))
        })
    }

    /// The form fields of the activation request, in the order the app
    /// sends them. The user agent travels as a header, not a field.
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("app_id", self.app_id.as_str()),
            ("app_version", self.app_version.as_str()),
            ("app_build_number", self.app_build_number.as_str()),
            ("full_disk_encryption", self.full_disk_encryption.as_str()),
            ("manufacturer", self.manufacturer.as_str()),
            ("model", self.model.as_str()),
            ("platform", self.platform.as_str()),
            ("jailbroken", self.jailbroken.as_str()),
            ("version", self.version.as_str()),
            ("language", self.language.as_str()),
            ("customer_protocol", self.customer_protocol.as_str()),
        ]
    }
}

/// Where the provider lives.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub enrollment_host: String,
    pub api_host: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enrollment_host: DEFAULT_ENROLLMENT_HOST.to_string(),
            api_host: DEFAULT_API_HOST.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn activation_url(&self, token: &str) -> String {
        format!("https://{}/push/v2/activation/{}", self.api_host, token)
    }
}

/// Options threaded into the activation client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound on the activation call. `None` leaves it unbounded.
    pub timeout: Option<Duration>,

    /// Log request and response details, including the secret.
    pub diagnostics: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            diagnostics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn default_profile_fields() {
        let profile = DeviceProfile::default();
        let fields = profile.form_fields();
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[0], ("app_id", "com.duosecurity.duomobile.app.DMApplication"));
        assert!(fields.contains(&("full_disk_encryption", "false")));
        assert!(fields.contains(&("jailbroken", "False")));
        assert!(fields.contains(&("customer_protocol", "1")));
        assert_eq!(profile.user_agent, "okhttp/3.11.0");
    }

    #[test]
    fn profile_from_partial_json() {
        let path = env::temp_dir().join(format!("otp-enroll-profile-{}.json", std::process::id()));
        fs::write(&path, r#"{"app_version": "4.0.0", "model": "Pixel 7"}"#).unwrap();

        let profile = DeviceProfile::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(profile.app_version, "4.0.0");
        assert_eq!(profile.model, "Pixel 7");
        assert_eq!(profile.manufacturer, "Google");
        assert_eq!(profile.user_agent, "okhttp/3.11.0");
    }

    #[test]
    fn profile_from_bad_json() {
        let path = env::temp_dir().join(format!("otp-enroll-bad-{}.json", std::process::id()));
        fs::write(&path, "not json").unwrap();

        let res = DeviceProfile::from_file(&path);
        fs::remove_file(&path).unwrap();

        match res {
            Err(EnrollError::Config(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn activation_url_template() {
        let provider = ProviderConfig::default();
        assert_eq!(
            provider.activation_url("0123456789abcdefghij"),
            "https://api-268194b0.duosecurity.com/push/v2/activation/0123456789abcdefghij"
        );
    }
}
