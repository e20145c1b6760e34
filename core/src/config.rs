use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;
use crate::ports::DEFAULT_PORT_CAPACITY;
use crate::registry::DEFAULT_MAX_LISTENERS;

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Queue capacity of ports created without an explicit one.
    pub port_capacity: usize,
    /// Upper bound on live listeners.
    pub max_listeners: usize,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port_capacity: DEFAULT_PORT_CAPACITY,
            max_listeners: DEFAULT_MAX_LISTENERS,
            log_filter: default_log_filter(),
        }
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    ports: FilePorts,
    #[serde(default)]
    registry: FileRegistry,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FilePorts {
    #[serde(default = "default_port_capacity")]
    capacity: usize,
}

#[derive(Deserialize)]
struct FileRegistry {
    #[serde(default = "default_max_listeners")]
    max_listeners: usize,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_log_filter")]
    filter: String,
}

fn default_port_capacity() -> usize {
    DEFAULT_PORT_CAPACITY
}

fn default_max_listeners() -> usize {
    DEFAULT_MAX_LISTENERS
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for FilePorts {
    fn default() -> Self {
        Self {
            capacity: default_port_capacity(),
        }
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self {
            max_listeners: default_max_listeners(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("SYSNOTIFY_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/sysnotify.toml"));

        let file_cfg = match fs::read_to_string(&config_path) {
            Ok(contents) => toml::from_str::<FileConfig>(&contents)
                .with_context(|| format!("invalid config file {}", config_path.display()))?,
            Err(_) => FileConfig::default(),
        };
        let mut port_capacity = file_cfg.ports.capacity;
        let mut max_listeners = file_cfg.registry.max_listeners;
        let mut log_filter = file_cfg.logging.filter;

        // environment overrides
        if let Ok(v) = std::env::var("SYSNOTIFY_PORT_CAPACITY") {
            port_capacity = v
                .parse()
                .with_context(|| format!("SYSNOTIFY_PORT_CAPACITY={v}"))?;
        }
        if let Ok(v) = std::env::var("SYSNOTIFY_MAX_LISTENERS") {
            max_listeners = v
                .parse()
                .with_context(|| format!("SYSNOTIFY_MAX_LISTENERS={v}"))?;
        }
        if let Ok(v) = std::env::var("SYSNOTIFY_LOG") {
            log_filter = v;
        }

        // CLI overrides
        if let Some(c) = cli.port_capacity {
            port_capacity = c;
        }
        if let Some(l) = &cli.log {
            log_filter = l.clone();
        }

        if port_capacity == 0 {
            anyhow::bail!("port capacity must be at least 1");
        }
        if max_listeners == 0 {
            anyhow::bail!("max_listeners must be at least 1");
        }

        Ok(Self {
            port_capacity,
            max_listeners,
            log_filter,
        })
    }
}
