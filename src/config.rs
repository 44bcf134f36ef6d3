use crate::error::{CocalcError, ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the credentials file
pub const CONFIG_ENV: &str = "COCALC_CONFIG";
/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "COCALC_BASE_URL";
/// Environment variable overriding the request timeout, in seconds
pub const TIMEOUT_ENV: &str = "COCALC_TIMEOUT_SECS";

/// Account credentials for the CoCalc API.
///
/// Loaded from a YAML file of the form:
///
/// ```yaml
/// # Account settings for CoCalc
/// account_id: 0db4ac94-143c-4638-992a-0835313c73e0
/// api_key: sk_an_api_key
/// first_name: Jane
/// last_name: Dunne
/// email: jane.dunne@yourmail.com
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub account_id: String,
    pub api_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Shape of the file before required fields are checked
#[derive(Debug, Deserialize)]
struct RawCredentials {
    account_id: Option<String>,
    api_key: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

impl Credentials {
    /// Create credentials from an account id and API key
    pub fn new(account_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_key: api_key.into(),
            first_name: None,
            last_name: None,
            email: None,
        }
    }

    /// Set the display name used as the default invitation reply-to name
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }

    /// Set the email used as the default invitation reply-to address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Load credentials with priority:
    /// 1. Provided path
    /// 2. `COCALC_CONFIG` environment variable
    /// 3. Default config file location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => PathBuf::from(path),
                None => Self::config_path()?,
            },
        };

        Self::from_file(path)
    }

    /// Load credentials from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }

        tracing::debug!(path = %path.display(), "Loading credentials");
        let bytes = std::fs::read(path)?;
        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::Parse(format!("config is not valid UTF-8: {e}")))?;

        Self::from_yaml_str(&contents)
    }

    /// Parse credentials from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Err(ConfigError::Parse("config is empty".to_string()).into());
        }

        let raw: RawCredentials =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(Self {
            account_id: raw
                .account_id
                .ok_or(ConfigError::MissingField("account_id"))?,
            api_key: raw.api_key.ok_or(ConfigError::MissingField("api_key"))?,
            first_name: raw.first_name,
            last_name: raw.last_name,
            email: raw.email,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("cocalc").join("config.yaml"))
    }

    /// Validate the credentials
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(CocalcError::Credentials("account_id is empty".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(CocalcError::Credentials("api_key is empty".to_string()));
        }

        Ok(())
    }

    /// "First Last" when both names are configured
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        }
    }

    /// API key with everything past the first few characters hidden
    pub fn masked_api_key(&self) -> String {
        let shown: String = self.api_key.chars().take(6).collect();
        format!("{shown}***")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("api_key", &self.masked_api_key())
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .finish()
    }
}

/// Connection settings for the API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the CoCalc server (defaults to cocalc.com)
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

fn default_base_url() -> String {
    "https://cocalc.com".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(4)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `COCALC_BASE_URL` and `COCALC_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_overrides(std::env::var(BASE_URL_ENV).ok(), std::env::var(TIMEOUT_ENV).ok())
    }

    /// Defaults overridden by raw base URL and timeout-in-seconds values
    pub fn from_overrides(base_url: Option<String>, timeout_secs: Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(base_url) = base_url {
            if base_url.trim().is_empty() {
                return Err(ConfigError::Parse("base URL is empty".to_string()).into());
            }
            settings = settings.with_base_url(base_url.trim());
        }

        if let Some(secs) = timeout_secs {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::Parse(format!("{TIMEOUT_ENV} is not a number: {secs}")))?;
            settings = settings.with_timeout(Duration::from_secs(secs));
        }

        Ok(settings)
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL for an API message, e.g. `query` or `create_project`
    pub fn endpoint(&self, message: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_credentials() {
        let creds = Credentials::new("abc", "key123");
        assert_eq!(creds.account_id, "abc");
        assert_eq!(creds.api_key, "key123");
        assert_eq!(creds.email, None);
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
            # Account settings for CoCalc
            account_id: "abc"
            api_key: "key123"
            first_name: Jane
            last_name: Dunne
            email: jane.dunne@yourmail.com
        "#;

        let creds = Credentials::from_yaml_str(yaml).unwrap();
        assert_eq!(creds.account_id, "abc");
        assert_eq!(creds.api_key, "key123");
        assert_eq!(creds.full_name().as_deref(), Some("Jane Dunne"));
        assert_eq!(creds.email.as_deref(), Some("jane.dunne@yourmail.com"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let yaml = "account_id: abc\napi_key: key123\nfavourite_color: green\n";
        assert!(Credentials::from_yaml_str(yaml).is_ok());
    }

    #[test]
    fn test_missing_api_key() {
        let err = Credentials::from_yaml_str("account_id: abc\n").unwrap_err();
        assert!(matches!(
            err,
            CocalcError::Config(ConfigError::MissingField("api_key"))
        ));
    }

    #[test]
    fn test_missing_account_id() {
        let err = Credentials::from_yaml_str("api_key: key123\nemail: a@b.c\n").unwrap_err();
        assert!(matches!(
            err,
            CocalcError::Config(ConfigError::MissingField("account_id"))
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Credentials::from_yaml_str("account_id: \"abc\napi_key: [1, 2").unwrap_err();
        assert!(matches!(err, CocalcError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_wrong_value_type() {
        let err = Credentials::from_yaml_str("account_id: abc\napi_key: [1, 2]\n").unwrap_err();
        assert!(matches!(err, CocalcError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_config() {
        let err = Credentials::from_yaml_str("  \n").unwrap_err();
        assert!(matches!(err, CocalcError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_blank_key() {
        let creds = Credentials::new("abc", "  ");
        assert!(matches!(
            creds.validate(),
            Err(CocalcError::Credentials(_))
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let creds = Credentials::new("abc", "sk_very_secret_key");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("sk_very_secret_key"));
        assert!(debug.contains("sk_ver***"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let creds = Credentials::new("u1", "k1").with_email("u1@example.com");
        let yaml = serde_yaml::to_string(&creds).unwrap();
        assert!(!yaml.contains("first_name"));
        assert_eq!(Credentials::from_yaml_str(&yaml).unwrap(), creds);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://cocalc.com");
        assert_eq!(settings.timeout, Duration::from_secs(4));
        assert_eq!(settings.endpoint("query"), "https://cocalc.com/api/v1/query");
    }

    #[test]
    fn test_overrides_applied() {
        let settings =
            Settings::from_overrides(Some("http://localhost:5000/".into()), Some("30".into()))
                .unwrap();
        assert_eq!(settings.base_url, "http://localhost:5000");
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        for base_url in ["", "   "] {
            let err = Settings::from_overrides(Some(base_url.to_string()), None).unwrap_err();
            assert!(matches!(err, CocalcError::Config(ConfigError::Parse(_))));
        }
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let err = Settings::from_overrides(None, Some("soon".into())).unwrap_err();
        assert!(matches!(err, CocalcError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let settings = Settings::default().with_base_url("http://localhost:5000/");
        assert_eq!(
            settings.endpoint("user_search"),
            "http://localhost:5000/api/v1/user_search"
        );
    }
}
