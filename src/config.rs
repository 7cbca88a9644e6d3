//! Configuration loading and management.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server connection entries. Malformed entries are dropped at load
    /// time so one bad block cannot stop the remaining bots.
    pub servers: Vec<ServerConfig>,
    /// Dispatch settings.
    pub dispatch: DispatchConfig,
    /// Flood guard settings.
    pub flood: FloodConfig,
    /// Factoid plugin settings.
    pub factoid: FactoidConfig,
    /// API lookup plugin settings.
    pub api: ApiConfig,
    /// Translate plugin settings.
    pub translate: TranslateConfig,
    /// Exec plugin settings; the plugin is skipped when absent.
    pub exec: Option<ExecConfig>,
}

/// Raw file shape: `[[server]]` tables are deserialized individually so a
/// malformed one can be skipped instead of failing the whole file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "server")]
    server: Vec<toml::Value>,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    flood: FloodConfig,
    #[serde(default)]
    factoid: FactoidConfig,
    #[serde(default)]
    api: ApiConfig,
    #[serde(default)]
    translate: TranslateConfig,
    exec: Option<ExecConfig>,
}

/// One IRC server connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bot nickname (also used as login and realname).
    pub nick: String,
    /// Optional services identification sent after welcome.
    pub identify: Option<IdentifyConfig>,
    /// Channels to join (and keep joined).
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,
    /// Host names whose users may run restricted commands.
    #[serde(default)]
    pub privileged: Vec<String>,
}

impl ServerConfig {
    /// `host:port` address string for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Services identification block.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyConfig {
    /// Nick or service to message (e.g. `NickServ`).
    pub target: String,
    /// The identify message itself.
    pub message: String,
    /// Optional user mode set right after identifying (e.g. `+x`).
    pub usermode: Option<String>,
}

/// A channel with an optional key.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, including the leading `#`.
    pub name: String,
    /// Channel key, if the channel is locked.
    pub key: Option<String>,
}

/// Dispatch settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// The single reserved leading character marking a command.
    #[serde(default = "default_prefix")]
    pub prefix: char,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// Flood guard settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloodConfig {
    /// When set, privileged users bypass duplicate-message suppression.
    #[serde(default)]
    pub exempt_privileged: bool,
}

/// Factoid plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FactoidConfig {
    /// Path to the factoid store file.
    #[serde(default = "default_factoid_path")]
    pub path: PathBuf,
}

impl Default for FactoidConfig {
    fn default() -> Self {
        Self {
            path: default_factoid_path(),
        }
    }
}

/// API lookup plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Path to the API index description file.
    #[serde(default = "default_api_path")]
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            path: default_api_path(),
        }
    }
}

/// Translate plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateConfig {
    /// Per-channel target language overrides.
    #[serde(default)]
    pub channel_language: HashMap<String, String>,
    /// Target language when no override matches.
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            channel_language: HashMap::new(),
            default_language: default_language(),
        }
    }
}

/// Exec plugin settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecConfig {
    /// Working directory for generated sources and build artifacts.
    pub dir: PathBuf,
    /// Name of the generated source file inside `dir`.
    pub source_file: String,
    /// Lines written before the user's code.
    #[serde(default)]
    pub prelude: Vec<String>,
    /// Lines written after the user's code.
    #[serde(default)]
    pub postlude: Vec<String>,
    /// Compile command and arguments, run inside `dir`.
    pub compile: Vec<String>,
    /// Run command and arguments, run inside `dir`.
    pub run: Vec<String>,
    /// File suffixes removed from `dir` after each execution.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Template the `exec` snippet is spliced into (`{code}`).
    #[serde(default = "default_code_template")]
    pub exec_template: String,
    /// Template the `sysout` expression is spliced into (`{code}`).
    #[serde(default = "default_code_template")]
    pub sysout_template: String,
}

fn default_code_template() -> String {
    "{code}".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_prefix() -> char {
    '-'
}

fn default_factoid_path() -> PathBuf {
    PathBuf::from("factoids.txt")
}

fn default_api_path() -> PathBuf {
    PathBuf::from("apidata/api.toml")
}

fn default_language() -> String {
    "en".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut servers = Vec::new();
        for (index, value) in raw.server.into_iter().enumerate() {
            match value.try_into::<ServerConfig>() {
                Ok(server) => servers.push(server),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed [[server]] entry");
                }
            }
        }

        Ok(Config {
            servers,
            dispatch: raw.dispatch,
            flood: raw.flood,
            factoid: raw.factoid,
            api: raw.api,
            translate: raw.translate,
            exec: raw.exec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_example() {
        let config = Config::parse(
            r##"
            [[server]]
            host = "irc.example.net"
            port = 6697
            nick = "ember"
            privileged = ["trusted.example.org"]

            [server.identify]
            target = "Q@CServe.quakenet.org"
            message = "AUTH ember hunter2"
            usermode = "+x"

            [[server.channel]]
            name = "#ember"

            [[server.channel]]
            name = "#secret"
            key = "sesame"

            [dispatch]
            prefix = "-"

            [flood]
            exempt_privileged = true

            [factoid]
            path = "data/factoids.txt"
            "##,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 1);
        let server = &config.servers[0];
        assert_eq!(server.address(), "irc.example.net:6697");
        assert_eq!(server.channels.len(), 2);
        assert_eq!(server.channels[1].key.as_deref(), Some("sesame"));
        assert_eq!(server.privileged, vec!["trusted.example.org"]);
        assert_eq!(
            server.identify.as_ref().unwrap().usermode.as_deref(),
            Some("+x")
        );
        assert_eq!(config.dispatch.prefix, '-');
        assert!(config.flood.exempt_privileged);
        assert_eq!(config.factoid.path, PathBuf::from("data/factoids.txt"));
        assert!(config.exec.is_none());
    }

    #[test]
    fn port_defaults_to_6667() {
        let config = Config::parse(
            r#"
            [[server]]
            host = "irc.example.net"
            nick = "ember"
            "#,
        )
        .unwrap();
        assert_eq!(config.servers[0].port, 6667);
    }

    #[test]
    fn malformed_server_entry_is_skipped() {
        let config = Config::parse(
            r#"
            [[server]]
            host = "irc.example.net"
            nick = "ember"

            [[server]]
            host = "irc.broken.example"
            # nick missing
            "#,
        )
        .unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].host, "irc.example.net");
    }

    #[test]
    fn defaults_when_sections_absent() {
        let config = Config::parse("").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.dispatch.prefix, '-');
        assert!(!config.flood.exempt_privileged);
        assert_eq!(config.translate.default_language, "en");
    }
}
