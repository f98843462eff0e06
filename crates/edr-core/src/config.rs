//! Runtime configuration.
//!
//! Settings come from a TOML file (explicit path, or `edr-printer/config.toml`
//! under the user config directory) layered over built-in defaults. Account
//! secrets may also be supplied through environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const USERNAME_ENV: &str = "EDR_USERNAME";
pub const PASSWORD_ENV: &str = "EDR_PASSWORD";
pub const MFA_CREDENTIAL_ENV: &str = "EDR_MFA_CREDENTIAL_ID";
pub const AUTH_TOKEN_ENV: &str = "EDR_AUTH_TOKEN";

/// Event type filter used by the browse query when none is given.
pub fn all_event_types() -> Vec<u32> {
    std::iter::once(1).chain(3..=45).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdrConfig {
    pub portal: PortalConfig,
    pub account: AccountConfig,
    pub browse: BrowseConfig,
    pub output: OutputConfig,
    pub print: PrintConfig,
    /// Event ids processed when none are given on the command line
    pub default_event_ids: Vec<String>,
}

impl Default for EdrConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            account: AccountConfig::default(),
            browse: BrowseConfig::default(),
            output: OutputConfig::default(),
            print: PrintConfig::default(),
            default_event_ids: vec!["606034".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub login_url: String,
    pub portal_url: String,
    pub event_management_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://retaillink.login.wal-mart.com".to_string(),
            portal_url: "https://retaillink2.wal-mart.com".to_string(),
            event_management_url: "https://retaillink2.wal-mart.com/EventManagement".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn join(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    pub fn login_endpoint(&self) -> String {
        Self::join(&self.login_url, "/api/login")
    }

    pub fn send_code_endpoint(&self) -> String {
        Self::join(&self.login_url, "/api/mfa/sendCode")
    }

    pub fn validate_code_endpoint(&self) -> String {
        Self::join(&self.login_url, "/api/mfa/validateCode")
    }

    pub fn page_access_endpoint(&self) -> String {
        Self::join(
            &self.portal_url,
            "/rl_portal_services/api/Site/InsertRlPageDetails",
        )
    }

    pub fn portal_landing(&self) -> String {
        Self::join(&self.portal_url, "/rl_portal/")
    }

    pub fn event_management_landing(&self) -> String {
        Self::join(&self.event_management_url, "/")
    }

    pub fn authenticate_endpoint(&self) -> String {
        Self::join(&self.event_management_url, "/api/authenticate")
    }

    pub fn browse_endpoint(&self) -> String {
        Self::join(&self.event_management_url, "/api/browse-event/browse-data")
    }

    pub fn browse_page(&self) -> String {
        Self::join(&self.event_management_url, "/browse-event")
    }

    pub fn edr_report_endpoint(&self) -> String {
        Self::join(&self.event_management_url, "/api/edrReport")
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub mfa_credential_id: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("mfa_credential_id", &self.mfa_credential_id)
            .finish()
    }
}

/// Username, password and the id of the registered one-time-code device.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    pub mfa_credential_id: String,
}

impl AccountConfig {
    /// Override fields with any non-empty values from the environment.
    pub fn with_env(mut self) -> Self {
        let env = |name| std::env::var(name).ok().filter(|v: &String| !v.is_empty());
        if let Some(username) = env(USERNAME_ENV) {
            self.username = Some(username);
        }
        if let Some(password) = env(PASSWORD_ENV) {
            self.password = Some(password);
        }
        if let Some(credid) = env(MFA_CREDENTIAL_ENV) {
            self.mfa_credential_id = Some(credid);
        }
        self
    }

    /// Validate that every login setting is present
    pub fn login_credentials(&self) -> Result<LoginCredentials, ConfigError> {
        fn require(
            value: &Option<String>,
            setting: &'static str,
            env_var: &'static str,
        ) -> Result<String, ConfigError> {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingSetting { setting, env_var })
        }

        Ok(LoginCredentials {
            username: require(&self.username, "account.username", USERNAME_ENV)?,
            password: require(&self.password, "account.password", PASSWORD_ENV)?,
            mfa_credential_id: require(
                &self.mfa_credential_id,
                "account.mfa_credential_id",
                MFA_CREDENTIAL_ENV,
            )?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub store_number: String,
    pub event_types: Vec<u32>,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            store_number: "8135".to_string(),
            event_types: all_event_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// How long to leave the staged file in place after a successful dispatch
    pub settle_delay_secs: u64,
    pub command_timeout_secs: u64,
    pub temp_dir: Option<PathBuf>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: 5,
            command_timeout_secs: 15,
            temp_dir: None,
        }
    }
}

impl PrintConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("edr-printer")
        .join("config.toml")
}

impl EdrConfig {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Load the explicit file if given, else the default file when it exists,
    /// else built-in defaults. Account fields are then overlaid from the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    tracing::debug!(path = %path.display(), "Loading config");
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.account = config.account.with_env();
        Ok(config)
    }
}
