//! Settings loading
//!
//! Settings are resolved with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Settings file (`--settings` path, else `~/.cfgsync/config.yaml` when present)
//! 3. Environment variables (`CFGSYNC_*`, plus `VAULT_ADDR`)
//! 4. CLI flags (handled by caller)

use crate::catalog::DEFAULT_CATALOG_NAME;
use crate::error::{Error, Result};
use crate::prompt::{PromptOptions, Prompter};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR_NAME: &str = ".cfgsync";
const CONFIG_FILE_NAME: &str = "config.yaml";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Tool-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Catalog file name used when `--catalog` is not given
    pub catalog: String,

    /// Store suggested when a file is pushed for the first time
    pub default_store: String,

    /// Override for the credential vault file
    pub credentials_path: Option<PathBuf>,

    pub shipment: ShipmentSettings,
    pub s3: S3Settings,
    pub vault: VaultSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG_NAME.to_string(),
            default_store: "s3".to_string(),
            credentials_path: None,
            shipment: ShipmentSettings::default(),
            s3: S3Settings::default(),
            vault: VaultSettings::default(),
        }
    }
}

/// Endpoints of the shipment management service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShipmentSettings {
    pub auth_url: Option<String>,
    pub api_url: Option<String>,
}

/// Object storage defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct S3Settings {
    pub region: String,
    /// Custom S3-compatible endpoint (MinIO and friends)
    pub endpoint: Option<String>,
    /// Key prefix for every object written by cfgsync
    pub prefix: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            prefix: "cfgsync/".to_string(),
        }
    }
}

/// HashiCorp Vault defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VaultSettings {
    pub address: Option<String>,
    pub mount: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: None,
            mount: "secret".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config_not_found(p.display().to_string()));
                }
                Self::load_yaml_file(p)?
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load_yaml_file(&p)?,
                _ => Self::default(),
            },
        };

        settings.apply_env_overrides()
    }

    /// `~/.cfgsync`
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
    }

    fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Location of the credential vault file
    pub fn credentials_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_path {
            return Ok(path.clone());
        }

        Self::config_dir()
            .map(|dir| dir.join(CREDENTIALS_FILE_NAME))
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))
    }

    fn load_yaml_file(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            Error::invalid_config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(val) = env::var("CFGSYNC_CATALOG") {
            self.catalog = val;
        }

        if let Ok(val) = env::var("CFGSYNC_DEFAULT_STORE") {
            self.default_store = val;
        }

        if let Ok(val) = env::var("CFGSYNC_CREDENTIALS_PATH") {
            self.credentials_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("CFGSYNC_SHIPMENT_AUTH_URL") {
            self.shipment.auth_url = Some(val);
        }

        if let Ok(val) = env::var("CFGSYNC_SHIPMENT_API_URL") {
            self.shipment.api_url = Some(val);
        }

        if let Ok(val) = env::var("CFGSYNC_S3_REGION") {
            self.s3.region = val;
        }

        if let Ok(val) = env::var("CFGSYNC_S3_ENDPOINT") {
            self.s3.endpoint = Some(val);
        }

        if let Ok(val) = env::var("CFGSYNC_S3_PREFIX") {
            self.s3.prefix = val;
        }

        if let Ok(val) = env::var("CFGSYNC_VAULT_ADDR").or_else(|_| env::var("VAULT_ADDR")) {
            self.vault.address = Some(val);
        }

        if let Ok(val) = env::var("CFGSYNC_VAULT_MOUNT") {
            self.vault.mount = val;
        }

        if self.catalog.trim().is_empty() {
            return Err(Error::invalid_config("catalog file name cannot be empty"));
        }

        Ok(self)
    }
}

/// Per-run choices made on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOptions {
    /// Whether stores may ask the user for missing values
    pub prompt: bool,

    /// Preferred store for files that are not bound yet
    pub store: Option<String>,

    /// Version label to push or pull, for stores that support versioning
    pub version: Option<String>,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            prompt: true,
            store: None,
            version: None,
        }
    }
}

impl UserOptions {
    /// Ask `prompt` for `name`
    ///
    /// With prompting disabled the prompter is never consulted: the default
    /// answers, and a missing default is a [`Error::MissingValue`].
    pub fn ask(&self, prompt: &dyn Prompter, name: &str, opts: &PromptOptions) -> Result<String> {
        if self.prompt {
            return prompt.get_val_from_user(name, opts);
        }

        debug!("Prompting disabled, using default for {}", name);
        opts.default_value
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::missing_value(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "CFGSYNC_CATALOG",
        "CFGSYNC_DEFAULT_STORE",
        "CFGSYNC_CREDENTIALS_PATH",
        "CFGSYNC_SHIPMENT_AUTH_URL",
        "CFGSYNC_SHIPMENT_API_URL",
        "CFGSYNC_S3_REGION",
        "CFGSYNC_S3_ENDPOINT",
        "CFGSYNC_S3_PREFIX",
        "CFGSYNC_VAULT_ADDR",
        "CFGSYNC_VAULT_MOUNT",
        "VAULT_ADDR",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            r#"
default-store: shipment
shipment:
  auth-url: http://auth.local
  api-url: http://api.local
s3:
  region: eu-west-1
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.default_store, "shipment");
        assert_eq!(settings.shipment.auth_url.as_deref(), Some("http://auth.local"));
        assert_eq!(settings.s3.region, "eu-west-1");
        // Untouched sections keep their defaults
        assert_eq!(settings.s3.prefix, "cfgsync/");
        assert_eq!(settings.vault.mount, "secret");
        assert_eq!(settings.catalog, DEFAULT_CATALOG_NAME);
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file() {
        clear_env();
        let err = Settings::load(Some(Path::new("/nonexistent/cfgsync.yaml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "default-store: [unclosed").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("CFGSYNC_DEFAULT_STORE", "vault");
        env::set_var("CFGSYNC_S3_PREFIX", "team/");
        env::set_var("VAULT_ADDR", "https://vault.example.com");

        let settings = Settings::default().apply_env_overrides().unwrap();
        assert_eq!(settings.default_store, "vault");
        assert_eq!(settings.s3.prefix, "team/");
        assert_eq!(
            settings.vault.address.as_deref(),
            Some("https://vault.example.com")
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_catalog_name_rejected() {
        clear_env();
        env::set_var("CFGSYNC_CATALOG", " ");

        let result = Settings::default().apply_env_overrides();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_credentials_file_override() {
        let settings = Settings {
            credentials_path: Some(PathBuf::from("/tmp/creds.json")),
            ..Default::default()
        };
        assert_eq!(
            settings.credentials_file().unwrap(),
            PathBuf::from("/tmp/creds.json")
        );
    }

    #[test]
    fn test_user_options_default_allows_prompting() {
        let options = UserOptions::default();
        assert!(options.prompt);
        assert!(options.store.is_none());
        assert!(options.version.is_none());
    }

    struct CountingPrompter {
        calls: std::sync::Mutex<u32>,
    }

    impl Prompter for CountingPrompter {
        fn get_val_from_user(&self, _name: &str, _opts: &PromptOptions) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            Ok("typed".to_string())
        }
    }

    fn counting() -> CountingPrompter {
        CountingPrompter {
            calls: std::sync::Mutex::new(0),
        }
    }

    #[test]
    fn test_ask_delegates_when_prompting_allowed() {
        let prompter = counting();
        let opts = PromptOptions::new("bucket").with_default("fallback");
        let value = UserOptions::default().ask(&prompter, "S3_BUCKET", &opts).unwrap();
        assert_eq!(value, "typed");
        assert_eq!(*prompter.calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_ask_without_prompting_uses_default() {
        let prompter = counting();
        let options = UserOptions {
            prompt: false,
            ..Default::default()
        };
        let opts = PromptOptions::new("Remote Store").with_default("s3");
        assert_eq!(options.ask(&prompter, "Remote Store", &opts).unwrap(), "s3");
        assert_eq!(*prompter.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_ask_without_prompting_or_default_fails() {
        let prompter = counting();
        let options = UserOptions {
            prompt: false,
            ..Default::default()
        };
        let err = options
            .ask(&prompter, "S3_BUCKET", &PromptOptions::new("bucket"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingValue { .. }));
        assert_eq!(*prompter.calls.lock().unwrap(), 0);
    }
}
