//! Configuration management for Vigil.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use vigil_common::constants::{
    API_VERSION, DEFAULT_LISTEN_ADDR, DEFAULT_REDIS_URL, DEFAULT_REPORT_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, PRODUCTION_SERVER, TESTING_SERVER,
};
use vigil_common::{Credentials, FallbackPolicy, ModerationAction, UnsurePolicy, VigilError};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Where content mappings and nonces live
    #[serde(default)]
    pub storage: StorageBackend,

    /// Public base URL of this site, as the classification service sees it
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Production API keys (the only keys trusted for inbound webhooks)
    #[serde(default)]
    pub credentials: Credentials,

    /// Testing mode configuration
    #[serde(default)]
    pub testing: TestingConfig,

    /// Remote client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Submission protection policy
    #[serde(default)]
    pub protection: ProtectionConfig,

    /// Moderation callbacks, keyed by entity type
    #[serde(default)]
    pub hooks: HashMap<String, HookConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redis,
    Memory,
}

/// Testing-mode configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TestingConfig {
    /// Route all calls to the development service
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_testing_server")]
    pub server: String,

    /// Testing API keys (separate from production keys)
    #[serde(default, flatten)]
    pub credentials: Credentials,

    /// Provision new testing keys when the current ones are rejected
    #[serde(default = "default_true")]
    pub create_keys: bool,

    /// Contact address used when provisioning a testing site
    #[serde(default = "default_site_mail")]
    pub site_mail: String,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: default_testing_server(),
            credentials: Credentials::default(),
            create_keys: true,
            site_mail: default_site_mail(),
        }
    }
}

/// Remote client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            api_version: default_api_version(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Submission protection policy
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionConfig {
    /// Checks requested from the service ("spam", "profanity")
    #[serde(default = "default_checks")]
    pub checks: Vec<String>,

    #[serde(default)]
    pub unsure: UnsurePolicy,

    #[serde(default)]
    pub fallback: FallbackPolicy,

    /// Roles exempt from all checks
    #[serde(default)]
    pub bypass_roles: Vec<String>,

    /// Reverse proxies whose X-Forwarded-For entries are trusted
    #[serde(default)]
    pub reverse_proxy_addresses: Vec<String>,

    /// Reject wrong CAPTCHA solutions on our own instead of relying on the
    /// follow-up classification. A CAPTCHA check that fails to reach the
    /// service counts as unsolved.
    #[serde(default)]
    pub enforce_captcha_solution: bool,

    /// False-positive report form
    #[serde(default = "default_report_url")]
    pub report_url: String,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            checks: default_checks(),
            unsure: UnsurePolicy::default(),
            fallback: FallbackPolicy::default(),
            bypass_roles: Vec::new(),
            reverse_proxy_addresses: Vec::new(),
            enforce_captcha_solution: false,
            report_url: default_report_url(),
        }
    }
}

/// A CMS callback that applies moderation actions to one entity type
#[derive(Debug, Clone, Deserialize)]
pub struct HookConfig {
    pub url: String,

    /// Actions this entity type reacts to (all when unset)
    #[serde(default)]
    pub actions: Option<Vec<ModerationAction>>,
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_site_url() -> String { "http://localhost".to_string() }
fn default_server() -> String { PRODUCTION_SERVER.to_string() }
fn default_testing_server() -> String { TESTING_SERVER.to_string() }
fn default_api_version() -> String { API_VERSION.to_string() }
fn default_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_checks() -> Vec<String> { vec!["spam".to_string()] }
fn default_report_url() -> String { DEFAULT_REPORT_URL.to_string() }
fn default_site_mail() -> String { "vigil-test@example.com".to_string() }
fn default_true() -> bool { true }

fn environment() -> config::Environment {
    config::Environment::with_prefix("VIGIL").separator("__")
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = Self::from_sources(config_path, environment())?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if args.memory_store {
            config.storage = StorageBackend::Memory;
        }

        config.validate()?;
        Ok(config)
    }

    /// Layer the (optional) config file under `VIGIL__` environment variables
    fn from_sources(config_path: &str, env: config::Environment) -> Result<Self> {
        if !Path::new(config_path).exists() {
            tracing::warn!("Config file {} not found, using defaults and environment", config_path);
        }

        config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(env)
            .build()
            .context("Failed to load config")?
            .try_deserialize()
            .context("Failed to parse config")
    }

    fn validate(&self) -> Result<(), VigilError> {
        if !self.credentials.is_configured() {
            tracing::warn!("No production API keys configured; inbound moderation requests will be rejected");
        }
        for (entity_type, hook) in &self.hooks {
            if hook.url.is_empty() {
                return Err(VigilError::Config(format!(
                    "Hook for entity type '{}' has no url",
                    entity_type
                )));
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            storage: StorageBackend::default(),
            site_url: default_site_url(),
            credentials: Credentials::default(),
            testing: TestingConfig::default(),
            client: ClientConfig::default(),
            protection: ProtectionConfig::default(),
            hooks: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.protection.checks, vec!["spam".to_string()]);
        assert_eq!(config.protection.unsure, UnsurePolicy::Captcha);
        assert_eq!(config.protection.fallback, FallbackPolicy::Accept);
        assert!(!config.protection.enforce_captcha_solution);
        assert_eq!(config.client.timeout_secs, 3);
        assert!(config.testing.create_keys);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            site_url = "https://blog.example.com"
            storage = "memory"

            [credentials]
            public_key = "pub"
            private_key = "priv"

            [testing]
            enabled = true
            public_key = "test-pub"
            private_key = "test-priv"

            [protection]
            checks = ["spam", "profanity"]
            unsure = "binary"
            fallback = "block"
            bypass_roles = ["administrator", "editor"]

            [hooks.user]
            url = "http://cms.local/hooks/user"
            actions = ["spam", "delete"]
        "#;

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.credentials.is_configured());
        assert_eq!(config.testing.credentials.public_key, "test-pub");
        assert_eq!(config.protection.unsure, UnsurePolicy::Accept);
        assert_eq!(config.protection.fallback, FallbackPolicy::Block);
        assert_eq!(config.protection.checks.len(), 2);
        let hook = &config.hooks["user"];
        assert_eq!(
            hook.actions.as_deref(),
            Some(&[ModerationAction::Spam, ModerationAction::Delete][..])
        );
        // Unset sections fall back to defaults
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.client.server, PRODUCTION_SERVER);
    }

    #[test]
    fn test_environment_applies_without_config_file() {
        let vars: config::Map<String, String> = [
            ("VIGIL__CREDENTIALS__PUBLIC_KEY", "env-pub"),
            ("VIGIL__CREDENTIALS__PRIVATE_KEY", "env-priv"),
            ("VIGIL__PROTECTION__FALLBACK", "block"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = AppConfig::from_sources(
            "/nonexistent/vigil.toml",
            environment().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.credentials.public_key, "env-pub");
        assert!(config.credentials.is_configured());
        assert_eq!(config.protection.fallback, FallbackPolicy::Block);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_hook_without_url_rejected() {
        let mut config = AppConfig::default();
        config.hooks.insert(
            "comment".to_string(),
            HookConfig {
                url: String::new(),
                actions: None,
            },
        );
        assert!(matches!(config.validate(), Err(VigilError::Config(_))));
    }
}
