use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which question-answering route the conversation engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatEndpoint {
    /// `POST /chat`, no credentials attached.
    #[default]
    Public,
    /// `POST /protected-chat` while logged in, public route otherwise.
    Protected,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub chat_endpoint: ChatEndpoint,
    pub keep_history_on_logout: bool,
    pub request_timeout: Duration,
    /// `None` keeps the session in memory only.
    pub session_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            chat_endpoint: ChatEndpoint::default(),
            keep_history_on_logout: false,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: None,
        }
    }
}

impl Config {
    /// Reads `UFMA_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup("UFMA_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let chat_endpoint = match lookup("UFMA_CHAT_ENDPOINT") {
            None => ChatEndpoint::default(),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "public" => ChatEndpoint::Public,
                "protected" => ChatEndpoint::Protected,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "UFMA_CHAT_ENDPOINT",
                        value: raw,
                        reason: "expected 'public' or 'protected'".into(),
                    })
                }
            },
        };

        let keep_history_on_logout = match lookup("UFMA_KEEP_HISTORY_ON_LOGOUT") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| ConfigError::InvalidValue {
                name: "UFMA_KEEP_HISTORY_ON_LOGOUT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };

        let request_timeout = match lookup("UFMA_REQUEST_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::InvalidValue {
                        name: "UFMA_REQUEST_TIMEOUT_SECS",
                        value: raw,
                        reason: "must be greater than zero".into(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        name: "UFMA_REQUEST_TIMEOUT_SECS",
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            },
        };

        let session_file = match lookup("UFMA_SESSION_FILE") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("ufma-consulta")
                .join("session.json"),
        };

        Ok(Self {
            api_base_url,
            chat_endpoint,
            keep_history_on_logout,
            request_timeout,
            session_file: Some(session_file),
        })
    }
}
