use crate::{error::TaskError, service::backend::Credentials};
use log::error;
use serde::{Deserialize, Serialize};
use std::{fs::read, str::from_utf8};

/// Taskmaster TOML config
#[derive(Deserialize, Serialize, Debug, Default, PartialEq)]
pub struct TaskmasterToml {
    #[serde(default)]
    pub connection: ConnectionToml,
    #[serde(default)]
    pub logging: LoggingToml,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ConnectionToml {
    /// Empty for the local machine
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub password: String,
    /// Connection attempts before giving up. Zero is treated as one
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause between connection attempts in milliseconds
    #[serde(default)]
    pub pause_ms: u64,
}

impl Default for ConnectionToml {
    fn default() -> ConnectionToml {
        ConnectionToml {
            server: String::new(),
            user: String::new(),
            domain: String::new(),
            password: String::new(),
            attempts: default_attempts(),
            pause_ms: 0,
        }
    }
}

impl ConnectionToml {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            server: self.server.clone(),
            user: self.user.clone(),
            domain: self.domain.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingToml {
    /// Directory for `taskmaster.log`
    #[serde(default = "default_log_path")]
    pub path: String,
    /// error, warn, info or debug
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingToml {
    fn default() -> LoggingToml {
        LoggingToml {
            path: default_log_path(),
            level: default_log_level(),
        }
    }
}

fn default_attempts() -> u32 {
    1
}

fn default_log_path() -> String {
    String::from("./tmp")
}

fn default_log_level() -> String {
    String::from("warn")
}

/// Parse TOML config bytes
pub fn parse_config(data: &[u8]) -> Result<TaskmasterToml, TaskError> {
    let text = match from_utf8(data) {
        Ok(result) => result,
        Err(err) => {
            error!("[taskmaster] Config is not UTF8: {err:?}");
            return Err(TaskError::BadConfig);
        }
    };

    match toml::from_str(text) {
        Ok(result) => Ok(result),
        Err(err) => {
            error!("[taskmaster] Failed to parse config: {err:?}");
            Err(TaskError::BadConfig)
        }
    }
}

/// Read and parse a TOML config file
pub fn read_config(path: &str) -> Result<TaskmasterToml, TaskError> {
    let data = match read(path) {
        Ok(result) => result,
        Err(err) => {
            error!("[taskmaster] Could not read config {path}: {err:?}");
            return Err(TaskError::BadConfig);
        }
    };
    parse_config(&data)
}

#[cfg(test)]
mod tests {
    use super::{parse_config, read_config, ConnectionToml};
    use std::path::PathBuf;

    #[test]
    fn test_parse_config() {
        let data = br#"
[connection]
server = "dc01"
user = "admin"
domain = "corp"
password = "hunter2"
attempts = 3
pause_ms = 10

[logging]
level = "debug"
"#;
        let config = parse_config(data).unwrap();
        assert_eq!(config.connection.server, "dc01");
        assert_eq!(config.connection.attempts, 3);
        assert_eq!(config.connection.pause_ms, 10);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.path, "./tmp");

        let creds = config.connection.credentials();
        assert_eq!(creds.domain, "corp");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config(b"").unwrap();
        assert_eq!(config.connection, ConnectionToml::default());
        assert_eq!(config.connection.attempts, 1);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_read_config() {
        let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        test_location.push("tests/test_data/taskmaster.toml");

        let config = read_config(test_location.to_str().unwrap()).unwrap();
        assert_eq!(config.connection.attempts, 2);
        assert!(config.connection.server.is_empty());
    }

    #[test]
    #[should_panic(expected = "BadConfig")]
    fn test_bad_config() {
        let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        test_location.push("tests/test_data/bad.toml");

        let _ = read_config(test_location.to_str().unwrap()).unwrap();
    }

    #[test]
    #[should_panic(expected = "BadConfig")]
    fn test_missing_config() {
        let _ = read_config("./does/not/exist.toml").unwrap();
    }
}
