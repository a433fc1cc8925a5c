use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::envelope::kind;
use crate::error::BridgeError;

pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_ALLOWED_USER_IDS: &str = "ALLOWED_USER_IDS";
pub const ENV_SOCKET_PATH: &str = "BRIDGE_SOCKET_PATH";
pub const ENV_MAX_FRAME_BYTES: &str = "BRIDGE_MAX_FRAME_BYTES";
pub const ENV_CHANNEL_CAPACITY: &str = "BRIDGE_CHANNEL_CAPACITY";
pub const ENV_CHANNEL: &str = "BRIDGE_CHANNEL";
pub const ENV_KAFKA_BROKERS: &str = "KAFKA_BROKERS";
pub const ENV_KAFKA_TOPIC_IN: &str = "KAFKA_TOPIC_IN";
pub const ENV_KAFKA_TOPIC_OUT: &str = "KAFKA_TOPIC_OUT";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_socket_config")]
    pub socket: SocketConfig,
    #[serde(default = "default_bridge_config")]
    pub bridge: BridgeConfig,
    /// Presence switches the pipe processes to distributed-log mode.
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Empty means every user is bridged.
    #[serde(default)]
    pub allowed_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocketConfig {
    #[serde(default = "default_socket_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        default_socket_config()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        default_bridge_config()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_inbound_topic")]
    pub inbound_topic: String,
    #[serde(default = "default_outbound_topic")]
    pub outbound_topic: String,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/telegram-bot.sock")
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

fn default_channel_capacity() -> usize {
    64
}

fn default_channel() -> String {
    kind::BOT_CHANNEL.to_string()
}

fn default_inbound_topic() -> String {
    kind::TELEGRAM_IN.to_string()
}

fn default_outbound_topic() -> String {
    kind::TELEGRAM_OUT.to_string()
}

fn default_socket_config() -> SocketConfig {
    SocketConfig {
        path: default_socket_path(),
        max_frame_bytes: default_max_frame_bytes(),
    }
}

fn default_bridge_config() -> BridgeConfig {
    BridgeConfig {
        channel_capacity: default_channel_capacity(),
        channel: default_channel(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BridgeError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| BridgeError::InvalidConfig {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Optional config file path, the first command-line argument.
pub fn path_from_args() -> Option<PathBuf> {
    std::env::args().nth(1).map(PathBuf::from)
}

fn config_file_error(path: &Path, e: impl std::fmt::Display) -> BridgeError {
    BridgeError::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl Config {
    /// Read the optional TOML file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| config_file_error(path, e))
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&content)
                    .map_err(|e| config_file_error(path, e))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Config::default(),
        };

        Ok(config.with_env(|key| std::env::var(key).ok())?)
    }

    /// Overlay values from `lookup`; unset or empty variables leave the field alone.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_key) = get(ENV_API_KEY) {
            self.telegram.api_key = Some(api_key);
        }
        if let Some(ids) = get(ENV_ALLOWED_USER_IDS) {
            self.telegram.allowed_user_ids = split_list(&ids)
                .iter()
                .map(|id| parse_number(ENV_ALLOWED_USER_IDS, id))
                .collect::<Result<_, _>>()?;
        }
        if let Some(path) = get(ENV_SOCKET_PATH) {
            self.socket.path = PathBuf::from(path);
        }
        if let Some(max) = get(ENV_MAX_FRAME_BYTES) {
            self.socket.max_frame_bytes = parse_number(ENV_MAX_FRAME_BYTES, &max)?;
        }
        if let Some(capacity) = get(ENV_CHANNEL_CAPACITY) {
            self.bridge.channel_capacity = parse_number(ENV_CHANNEL_CAPACITY, &capacity)?;
        }
        if let Some(channel) = get(ENV_CHANNEL) {
            self.bridge.channel = channel;
        }

        if let Some(brokers) = get(ENV_KAFKA_BROKERS) {
            let brokers = split_list(&brokers);
            match self.broker.as_mut() {
                Some(broker) => broker.brokers = brokers,
                None => {
                    self.broker = Some(BrokerConfig {
                        brokers,
                        inbound_topic: default_inbound_topic(),
                        outbound_topic: default_outbound_topic(),
                    })
                }
            }
        }
        if let Some(broker) = self.broker.as_mut() {
            if let Some(topic) = get(ENV_KAFKA_TOPIC_IN) {
                broker.inbound_topic = topic;
            }
            if let Some(topic) = get(ENV_KAFKA_TOPIC_OUT) {
                broker.outbound_topic = topic;
            }
        }
        if self.broker.as_ref().is_some_and(|b| b.brokers.is_empty()) {
            self.broker = None;
        }

        if self.socket.max_frame_bytes == 0 {
            return Err(BridgeError::InvalidConfig {
                key: ENV_MAX_FRAME_BYTES.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.bridge.channel_capacity == 0 {
            return Err(BridgeError::InvalidConfig {
                key: ENV_CHANNEL_CAPACITY.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(self)
    }

    /// Bot token, required by the Telegram adapter only.
    pub fn api_key(&self) -> Result<&str, BridgeError> {
        self.telegram
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(BridgeError::MissingConfig(ENV_API_KEY))
    }

    pub fn broker(&self) -> Option<&BrokerConfig> {
        self.broker.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::default().with_env(env(&[])).unwrap();
        assert_eq!(config.socket.path, PathBuf::from("/tmp/telegram-bot.sock"));
        assert_eq!(config.socket.max_frame_bytes, 1024 * 1024);
        assert_eq!(config.bridge.channel, "telegram-bot");
        assert_eq!(config.bridge.channel_capacity, 64);
        assert!(config.broker().is_none());
        assert!(config.telegram.allowed_user_ids.is_empty());
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = Config::default().with_env(env(&[("API_KEY", "")])).unwrap();
        let err = config.api_key().unwrap_err();
        assert_eq!(err.to_string(), "API_KEY environment variable is not set.");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_api_key_from_environment() {
        let config = Config::default()
            .with_env(env(&[("API_KEY", "123:abc")]))
            .unwrap();
        assert_eq!(config.api_key().unwrap(), "123:abc");
    }

    #[test]
    fn test_brokers_switch_on_log_mode() {
        let config = Config::default()
            .with_env(env(&[
                ("KAFKA_BROKERS", "kafka-1:9092, kafka-2:9092"),
                ("KAFKA_TOPIC_OUT", "replies"),
            ]))
            .unwrap();
        let broker = config.broker().unwrap();
        assert_eq!(broker.brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(broker.inbound_topic, "telegram_in");
        assert_eq!(broker.outbound_topic, "replies");
    }

    #[test]
    fn test_topics_without_brokers_stay_in_pipe_mode() {
        let config = Config::default()
            .with_env(env(&[("KAFKA_TOPIC_IN", "x"), ("KAFKA_BROKERS", " , ")]))
            .unwrap();
        assert!(config.broker().is_none());
    }

    #[test]
    fn test_numeric_overrides() {
        let config = Config::default()
            .with_env(env(&[
                ("BRIDGE_MAX_FRAME_BYTES", "2048"),
                ("BRIDGE_CHANNEL_CAPACITY", "8"),
                ("ALLOWED_USER_IDS", "111, 222"),
                ("BRIDGE_SOCKET_PATH", "/run/bridge.sock"),
            ]))
            .unwrap();
        assert_eq!(config.socket.max_frame_bytes, 2048);
        assert_eq!(config.bridge.channel_capacity, 8);
        assert_eq!(config.telegram.allowed_user_ids, vec![111, 222]);
        assert_eq!(config.socket.path, PathBuf::from("/run/bridge.sock"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::default()
            .with_env(env(&[("BRIDGE_MAX_FRAME_BYTES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("BRIDGE_MAX_FRAME_BYTES"));
        assert!(err.is_fatal());

        let err = Config::default()
            .with_env(env(&[("BRIDGE_CHANNEL_CAPACITY", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_toml_file_with_env_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            r#"
[telegram]
api_key = "from-file"
allowed_user_ids = [7]

[socket]
path = "/tmp/custom.sock"

[broker]
brokers = ["localhost:9092"]
outbound_topic = "out"
"#,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        let config = config
            .with_env(env(&[("KAFKA_TOPIC_IN", "in")]))
            .unwrap();

        assert_eq!(config.api_key().unwrap(), "from-file");
        assert_eq!(config.telegram.allowed_user_ids, vec![7]);
        assert_eq!(config.socket.path, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(config.socket.max_frame_bytes, 1024 * 1024);
        let broker = config.broker().unwrap();
        assert_eq!(broker.inbound_topic, "in");
        assert_eq!(broker.outbound_topic, "out");
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/bridge.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
        let cause = err.downcast_ref::<BridgeError>().unwrap();
        assert_eq!(cause.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_load_reports_malformed_file_as_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[socket\npath = 3").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
        assert!(err.downcast_ref::<BridgeError>().unwrap().is_fatal());
    }
}
