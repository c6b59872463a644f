use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pool::{NextMode, NextjsOptions};
use registry::{SearchRoot, default_search_roots};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "ACTIVITY_SERVER_CONFIG";
pub const CONFIG_FILE: &str = "activity-server.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("invalid listen host {0:?}")]
    InvalidHost(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NextjsConfig {
    /// Program and leading arguments, e.g. `["npx", "next"]`.
    pub command: Option<Vec<String>>,
    pub mode: NextMode,
    pub shared_node_modules: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Host name used in the `url` of listed activities.
    pub public_host: String,
    pub search_roots: Vec<SearchRoot>,
    pub request_timeout_secs: u64,
    pub bootstrap_timeout_secs: u64,
    pub nextjs: NextjsConfig,
    pub cors: bool,
    pub shared_assets_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            host: "0.0.0.0".to_string(),
            port: 3333,
            public_host: "localhost".to_string(),
            search_roots: default_search_roots(),
            request_timeout_secs: 30,
            bootstrap_timeout_secs: 120,
            nextjs: NextjsConfig::default(),
            cors: true,
            shared_assets_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(&cwd, &|key| std::env::var(key).ok())
    }

    /// Defaults, then the config file, then `ACTIVITY_BASE_DIR`, `HOST` and
    /// `PORT`. A missing or unparsable file is logged and skipped.
    pub fn load_with<F>(cwd: &Path, env_get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_base_dir = env_get("ACTIVITY_BASE_DIR").map(|dir| cwd.join(dir));
        let base_dir = env_base_dir.clone().unwrap_or_else(|| cwd.to_path_buf());

        let mut config = match Self::find_config_path(&base_dir, cwd, env_get) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded server config");
                    config
                }
                Err(err) => {
                    tracing::warn!("{}; using defaults", err);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.base_dir = match env_base_dir {
            Some(dir) => dir,
            None if config.base_dir == Path::new(".") => base_dir,
            None => base_dir.join(&config.base_dir),
        };
        if let Some(host) = env_get("HOST") {
            config.host = host;
        }
        if let Some(port) = env_get("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        Ok(config)
    }

    /// Parse a TOML config file. Relative paths in it stay relative; they
    /// are resolved against the base directory by [`ServerConfig::load_with`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn find_config_path<F>(base_dir: &Path, cwd: &Path, env_get: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env_get(CONFIG_ENV) {
            let path = cwd.join(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!("{} set but file not found: {}", CONFIG_ENV, path.display());
        }

        let path = base_dir.join(CONFIG_FILE);
        path.exists().then_some(path)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Public URL of an activity mounted at `route`.
    pub fn activity_url(&self, route: &str) -> String {
        format!("{}{}", self.public_url(), route)
    }

    pub fn public_url(&self) -> String {
        format!("http://{}:{}", self.public_host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn assets_dir(&self) -> PathBuf {
        match &self.shared_assets_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.join("assets"),
        }
    }

    pub fn browser_page(&self) -> PathBuf {
        self.base_dir.join("activity-browser.html")
    }

    pub fn nextjs_options(&self) -> NextjsOptions {
        let shared_node_modules = match &self.nextjs.shared_node_modules {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.join("node_modules"),
        };
        NextjsOptions {
            command: self.nextjs.command.clone(),
            mode: self.nextjs.mode,
            shared_node_modules: Some(shared_node_modules),
            bootstrap_timeout: Duration::from_secs(self.bootstrap_timeout_secs),
        }
    }
}
