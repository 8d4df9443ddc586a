//! Configuration management for redmine-mcp.
//!
//! Every setting is resolved in the same order: explicit value (CLI flag or
//! constructor argument), then environment variable, then the optional TOML
//! config file, then a built-in default. Empty strings count as absent.
//!
//! The config file lives in a platform-specific location:
//!
//! - **Linux**: `~/.config/redmine-mcp/config.toml`
//! - **macOS**: `~/Library/Application Support/redmine-mcp/config.toml`
//! - **Windows**: `%APPDATA%\redmine-mcp\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use redmine_core::config::{Config, RedmineConfig};
//!
//! let file = Config::load()?;
//! let redmine = RedmineConfig::resolve(None, None, &file)?;
//! println!("talking to {}", redmine.url);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "redmine-mcp";

pub const REDMINE_URL_ENV: &str = "REDMINE_URL";
pub const REDMINE_API_KEY_ENV: &str = "REDMINE_API_KEY";
pub const MCP_TRANSPORT_ENV: &str = "MCP_TRANSPORT";
pub const MCP_HOST_ENV: &str = "MCP_HOST";
pub const MCP_PORT_ENV: &str = "MCP_PORT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

// =============================================================================
// Config file structures
// =============================================================================

/// Contents of the optional config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Redmine connection settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redmine: Option<RedmineSection>,

    /// MCP server settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,
}

/// `[redmine]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedmineSection {
    /// Redmine base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// REST API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// `[server]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    /// Transport used to serve MCP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    /// Bind host for the SSE transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Bind port for the SSE transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// How the MCP protocol is served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// HTTP server with a Server-Sent Events stream per session
    Sse,
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "sse" => Ok(Transport::Sse),
            other => Err(Error::Config(format!(
                "Unknown transport '{}'. Expected 'stdio' or 'sse'",
                other
            ))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Sse => f.write_str("sse"),
        }
    }
}

// =============================================================================
// Config file implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Copy of this config with the API key replaced by a placeholder.
    pub fn masked(&self) -> Self {
        let mut config = self.clone();
        if let Some(redmine) = config.redmine.as_mut() {
            if redmine.api_key.is_some() {
                redmine.api_key = Some("********".to_string());
            }
        }
        config
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `redmine.url`, `server.port`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match section {
            "redmine" => {
                let config = self.redmine.get_or_insert_with(RedmineSection::default);
                match field {
                    "url" => config.url = Some(value.to_string()),
                    "api_key" => config.api_key = Some(value.to_string()),
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown redmine config field: {}",
                            field
                        )))
                    }
                }
            }
            "server" => {
                let config = self.server.get_or_insert_with(ServerSection::default);
                match field {
                    "transport" => config.transport = Some(value.parse()?),
                    "host" => config.host = Some(value.to_string()),
                    "port" => config.port = Some(parse_port(value)?),
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown server config field: {}",
                            field
                        )))
                    }
                }
            }
            _ => {
                return Err(Error::Config(format!("Unknown config section: {}", section)));
            }
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `redmine.url`, `server.port`)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match section {
            "redmine" => {
                let config = self.redmine.as_ref();
                match field {
                    "url" => Ok(config.and_then(|c| c.url.clone())),
                    "api_key" => Ok(config.and_then(|c| c.api_key.clone())),
                    _ => Err(Error::Config(format!(
                        "Unknown redmine config field: {}",
                        field
                    ))),
                }
            }
            "server" => {
                let config = self.server.as_ref();
                match field {
                    "transport" => Ok(config.and_then(|c| c.transport).map(|t| t.to_string())),
                    "host" => Ok(config.and_then(|c| c.host.clone())),
                    "port" => Ok(config.and_then(|c| c.port).map(|p| p.to_string())),
                    _ => Err(Error::Config(format!(
                        "Unknown server config field: {}",
                        field
                    ))),
                }
            }
            _ => Err(Error::Config(format!("Unknown config section: {}", section))),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != 2 {
        return Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: section.field",
            key
        )));
    }
    Ok((parts[0], parts[1]))
}

fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid port '{}'", value)))
}

/// First non-empty value in resolution order.
fn first_present(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// =============================================================================
// Resolved settings
// =============================================================================

/// Connection settings for a Redmine instance. Immutable once resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct RedmineConfig {
    /// Base URL with trailing slashes removed
    pub url: String,
    /// Value sent in the `X-Redmine-API-Key` header
    pub api_key: String,
}

impl fmt::Debug for RedmineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedmineConfig")
            .field("url", &self.url)
            .field("api_key", &"********")
            .finish()
    }
}

impl RedmineConfig {
    /// Resolve from explicit values, the process environment and `file`.
    pub fn resolve(url: Option<String>, api_key: Option<String>, file: &Config) -> Result<Self> {
        Self::resolve_with(url, api_key, file, process_env)
    }

    /// Resolve with an injectable environment lookup.
    pub fn resolve_with<F>(
        url: Option<String>,
        api_key: Option<String>,
        file: &Config,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = file.redmine.clone().unwrap_or_default();

        let url = first_present([url, env(REDMINE_URL_ENV), section.url]).ok_or_else(|| {
            Error::Config(format!(
                "Redmine URL is not configured (pass --url, set {} or redmine.url)",
                REDMINE_URL_ENV
            ))
        })?;

        let api_key = first_present([api_key, env(REDMINE_API_KEY_ENV), section.api_key])
            .ok_or_else(|| {
                Error::Config(format!(
                    "Redmine API key is not configured (pass --api-key, set {} or redmine.api_key)",
                    REDMINE_API_KEY_ENV
                ))
            })?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

/// How and where the MCP server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Resolve from explicit values, the process environment and `file`.
    pub fn resolve(
        transport: Option<Transport>,
        host: Option<String>,
        port: Option<u16>,
        file: &Config,
    ) -> Result<Self> {
        Self::resolve_with(transport, host, port, file, process_env)
    }

    /// Resolve with an injectable environment lookup.
    pub fn resolve_with<F>(
        transport: Option<Transport>,
        host: Option<String>,
        port: Option<u16>,
        file: &Config,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = file.server.clone().unwrap_or_default();
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let transport = match transport {
            Some(t) => t,
            None => match non_empty(MCP_TRANSPORT_ENV) {
                Some(value) => value.parse().unwrap_or_else(|_| {
                    warn!(
                        "Unknown {} value '{}', serving over stdio",
                        MCP_TRANSPORT_ENV, value
                    );
                    Transport::Stdio
                }),
                None => section.transport.unwrap_or_default(),
            },
        };

        let host = first_present([host, env(MCP_HOST_ENV), section.host])
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match port {
            Some(p) => p,
            None => match non_empty(MCP_PORT_ENV) {
                Some(value) => parse_port(&value)?,
                None => section.port.unwrap_or(DEFAULT_PORT),
            },
        };

        Ok(Self {
            transport,
            host,
            port,
        })
    }

    /// `host:port` string suitable for binding. IPv6 hosts are bracketed.
    pub fn bind_address(&self) -> String {
        let host = self.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
