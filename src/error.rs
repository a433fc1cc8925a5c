use std::path::PathBuf;

use thiserror::Error;

/// Broad classes of bridge failures.
///
/// `Parse` and `Transport` failures are recovered per message; `Configuration`
/// and `Filesystem` failures only happen at startup and end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Transport,
    Configuration,
    Filesystem,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} environment variable is not set.")]
    MissingConfig(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Config file {}: {message}", .path.display())]
    ConfigFile { path: PathBuf, message: String },

    #[error("Failed to remove existing socket at {}: {source}", .path.display())]
    SocketCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind socket at {}: {source}", .path.display())]
    SocketBind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("message log: {0}")]
    Broker(String),

    #[error("chat platform: {0}")]
    Platform(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::MissingConfig(_)
            | BridgeError::InvalidConfig { .. }
            | BridgeError::ConfigFile { .. } => ErrorKind::Configuration,
            BridgeError::SocketCleanup { .. } | BridgeError::SocketBind { .. } => {
                ErrorKind::Filesystem
            }
            BridgeError::Json(_) => ErrorKind::Parse,
            BridgeError::Connect { .. }
            | BridgeError::Io(_)
            | BridgeError::FrameTooLarge { .. }
            | BridgeError::Broker(_)
            | BridgeError::Platform(_) => ErrorKind::Transport,
        }
    }

    /// Fatal errors terminate the process; everything else is reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Filesystem
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message_names_variable() {
        let err = BridgeError::MissingConfig("API_KEY");
        assert_eq!(err.to_string(), "API_KEY environment variable is not set.");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transport_and_parse_errors_are_recoverable() {
        let connect = BridgeError::Connect {
            path: PathBuf::from("/tmp/x.sock"),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(connect.kind(), ErrorKind::Transport);
        assert!(!connect.is_fatal());
        assert!(connect.to_string().starts_with("Failed to connect to /tmp/x.sock"));

        let parse: BridgeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert!(!parse.is_fatal());
    }

    #[test]
    fn test_socket_cleanup_is_filesystem_error() {
        let err = BridgeError::SocketCleanup {
            path: PathBuf::from("/tmp/telegram-bot.sock"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert!(err.is_fatal());
    }
}
