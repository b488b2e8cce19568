//! Configuration for tabload.
//!
//! Uses `figment` for layered configuration: defaults -> `tabload.toml` -> environment.
//! Store secrets are never part of the layered config; they are resolved into
//! [`StoreCredentials`] through an explicit lookup so callers (and tests) decide
//! where they come from.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::PipelineError;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "tabload.toml";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base directory for raw and staged files. Relative staged paths handed
    /// to the loader are resolved against it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum number of rows per insertion call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            store: StoreConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn staged_dir(&self) -> PathBuf {
        self.data_dir.join("staged")
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be at least 1"));
        }
        if self.store.sql_function.trim().is_empty() {
            return Err(PipelineError::config("store.sql_function must not be empty"));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_batch_size() -> usize {
    50
}

/// Remote store settings. Holds the *names* of the secret variables, not the secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Environment variable holding the store endpoint URL.
    #[serde(default = "default_url_env")]
    pub url_env: String,
    /// Environment variable holding the service-role access key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Remote procedure used to execute DDL.
    #[serde(default = "default_sql_function")]
    pub sql_function: String,
    /// Per-request timeout. Unset means no client-side deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            key_env: default_key_env(),
            sql_function: default_sql_function(),
            request_timeout_secs: None,
        }
    }
}

fn default_url_env() -> String {
    "SUPABASE_URL".to_string()
}

fn default_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".to_string()
}

fn default_sql_function() -> String {
    "exec_sql".to_string()
}

/// Load configuration from defaults, an optional TOML file and `TABLOAD_*` variables.
///
/// With `config_file = None`, `./tabload.toml` is merged when it exists. An
/// explicitly named file that does not exist is a configuration error.
pub fn load_config(config_file: Option<&Path>) -> Result<PipelineConfig, PipelineError> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    match config_file {
        Some(path) if !path.exists() => {
            return Err(PipelineError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }
    }

    // TABLOAD_BATCH_SIZE, TABLOAD_STORE__SQL_FUNCTION, etc.
    figment = figment.merge(Env::prefixed("TABLOAD_").split("__"));

    let config: PipelineConfig = figment
        .extract()
        .map_err(|e| PipelineError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// The two secrets needed to open a store handle.
#[derive(Debug)]
pub struct StoreCredentials {
    url: Url,
    service_role_key: SecretString,
}

impl StoreCredentials {
    pub fn new(url: &str, service_role_key: impl Into<String>) -> Result<Self, PipelineError> {
        let key: String = service_role_key.into();
        if key.trim().is_empty() {
            return Err(PipelineError::config("service role key is empty"));
        }
        let url = Url::parse(url.trim())
            .map_err(|e| PipelineError::config(format!("invalid store url '{url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::config(format!(
                "store url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            service_role_key: SecretString::from(key),
        })
    }

    /// Resolve both secrets through `lookup`, failing on the first absent one.
    pub fn from_lookup<F>(config: &StoreConfig, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(&config.url_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::config(format!("{} is not set", config.url_env))
            })?;
        let key = lookup(&config.key_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::config(format!("{} is not set", config.key_env))
            })?;
        Self::new(&url, key)
    }

    /// Resolve both secrets from the process environment.
    pub fn from_env(config: &StoreConfig) -> Result<Self, PipelineError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn service_role_key(&self) -> &SecretString {
        &self.service_role_key
    }

    pub fn into_parts(self) -> (Url, SecretString) {
        (self.url, self.service_role_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.staged_dir(), PathBuf::from("data/staged"));
        assert_eq!(config.store.url_env, "SUPABASE_URL");
        assert_eq!(config.store.key_env, "SUPABASE_SERVICE_ROLE_KEY");
        assert_eq!(config.store.sql_function, "exec_sql");
        assert!(config.store.request_timeout_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tabload.toml");
        std::fs::write(
            &path,
            "data_dir = \"/srv/tabload\"\nbatch_size = 25\n\n[store]\nsql_function = \"run_sql\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/tabload"));
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.store.sql_function, "run_sql");
        assert_eq!(config.store.url_env, "SUPABASE_URL");
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_credentials_from_lookup() {
        let config = StoreConfig::default();
        let creds = StoreCredentials::from_lookup(
            &config,
            lookup_from(&[
                ("SUPABASE_URL", "https://abc.supabase.co"),
                ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
            ]),
        )
        .unwrap();
        assert_eq!(creds.url().host_str(), Some("abc.supabase.co"));
        assert_eq!(creds.service_role_key().expose_secret(), "service-key");
    }

    #[test]
    fn test_credentials_missing_url() {
        let config = StoreConfig::default();
        let err = StoreCredentials::from_lookup(
            &config,
            lookup_from(&[("SUPABASE_SERVICE_ROLE_KEY", "service-key")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));
    }

    #[test]
    fn test_credentials_blank_key_is_missing() {
        let config = StoreConfig::default();
        let err = StoreCredentials::from_lookup(
            &config,
            lookup_from(&[
                ("SUPABASE_URL", "https://abc.supabase.co"),
                ("SUPABASE_SERVICE_ROLE_KEY", "  "),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[test]
    fn test_credentials_reject_non_http_url() {
        assert!(StoreCredentials::new("ftp://example.com", "k").is_err());
        assert!(StoreCredentials::new("not a url", "k").is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let creds = StoreCredentials::new("https://abc.supabase.co", "top-secret").unwrap();
        assert!(!format!("{creds:?}").contains("top-secret"));
    }
}
