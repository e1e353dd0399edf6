//! Configuration file and command-line overlay.

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use gembasync_common::Error;
use gembasync_storage::{Credentials, EpicorConfig};
use gembasync_sync::SyncConfig;

/// Epicor connection options, each also read from the environment.
#[derive(Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Epicor server, e.g. https://kinetic.example.com.
    #[arg(long, env = "GEMBASYNC_DOMAIN", global = true)]
    pub domain: Option<String>,

    /// Application path on the server, e.g. Kinetic.
    #[arg(long, env = "GEMBASYNC_APP_PATH", global = true)]
    pub app_path: Option<String>,

    /// Company identifier.
    #[arg(long, env = "GEMBASYNC_COMPANY", global = true)]
    pub company: Option<String>,

    /// Epicor API key.
    #[arg(long, env = "GEMBASYNC_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base64 "user:password" token for basic auth.
    #[arg(long, env = "GEMBASYNC_USER_PASS", global = true, hide_env_values = true)]
    pub user_pass: Option<String>,

    /// User name, used with --password when no token is given.
    #[arg(long, env = "GEMBASYNC_USER", global = true)]
    pub user: Option<String>,

    #[arg(long, env = "GEMBASYNC_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,
}

/// Local path options.
#[derive(Debug, Clone, Default, Args)]
pub struct PathArgs {
    /// Directory the synchronized files are written to.
    #[arg(long, env = "GEMBASYNC_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Manifest file recording which versions are present.
    #[arg(long, env = "GEMBASYNC_MANIFEST", global = true)]
    pub manifest: Option<PathBuf>,
}

/// `epicor` section of the config file. Every field may be omitted.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpicorSection {
    pub domain: Option<String>,
    pub app_path: Option<String>,
    pub company_id: Option<String>,
    pub api_key: Option<String>,
    pub user_pass: Option<String>,
    pub baq_name: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Contents of `config.json`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub epicor: EpicorSection,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// `<config dir>/gembasync/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gembasync").join("config.json"))
    }

    /// Load the config file.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Connection settings with command-line values taking precedence.
    ///
    /// # Errors
    /// - `Config` if a required setting is missing or invalid
    pub fn epicor(&self, args: &ConnectionArgs) -> gembasync_common::Result<EpicorConfig> {
        let file = &self.epicor;
        let required = |arg: &Option<String>, fallback: &Option<String>, flag: &str| {
            arg.as_ref()
                .or(fallback.as_ref())
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| Error::Config(format!("--{} is required", flag)))
        };

        let domain = required(&args.domain, &file.domain, "domain")?;
        let app_path = required(&args.app_path, &file.app_path, "app-path")?;
        let company = required(&args.company, &file.company_id, "company")?;
        let api_key = required(&args.api_key, &file.api_key, "api-key")?;

        let credentials = match args.user_pass.as_ref().or(file.user_pass.as_ref()) {
            Some(token) => Credentials::new(api_key, token.clone()),
            None => match (&args.user, &args.password) {
                (Some(user), Some(password)) => Credentials::from_login(api_key, user, password),
                _ => {
                    return Err(Error::Config(
                        "--user-pass or --user and --password are required".to_string(),
                    ))
                }
            },
        };

        let mut config = EpicorConfig::new(domain, app_path, company, credentials);
        if let Some(baq) = &file.baq_name {
            config.baq_name = baq.clone();
        }
        if let Some(timeout) = file.timeout_secs {
            config.timeout_secs = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sync settings with command-line paths taking precedence.
    pub fn sync(&self, args: &PathArgs) -> SyncConfig {
        let mut config = self.sync.clone();
        if let Some(dir) = &args.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(manifest) = &args.manifest {
            config.manifest_path = manifest.clone();
        }
        config
    }
}
