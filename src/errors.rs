use thiserror::Error;

/// Shown whenever the backend could not be reached or answered garbage.
pub const CONNECTION_ERROR: &str = "Erro de conexão com o servidor";
/// Shown when a request exceeds the configured timeout.
pub const TIMEOUT_ERROR: &str = "Tempo limite excedido. Tente novamente.";
/// Shown when a protected call is rejected with 401.
pub const SESSION_EXPIRED: &str = "Sessão expirada. Faça login novamente.";

/// Top-level client error. Every variant renders a message that can be shown
/// to the end user as-is.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors (never reach the network) ──────────────────────────
    #[error("{0}")]
    Validation(String),

    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("{}", CONNECTION_ERROR)]
    Transport(#[source] reqwest::Error),

    #[error("{}", TIMEOUT_ERROR)]
    Timeout,

    #[error("{}", CONNECTION_ERROR)]
    Decode { detail: String },

    // ── Authentication rejection ─────────────────────────────────────────────
    #[error("{message}")]
    Unauthorized { message: String },

    // ── Backend-reported domain errors ───────────────────────────────────────
    #[error("{message}")]
    Backend { status: u16, message: String },

    // ── Local persistence ────────────────────────────────────────────────────
    #[error("Falha ao gravar a sessão: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        AppError::Decode { detail: detail.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// The caller should consider prompting for a new login.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. })
    }

    /// Network failure, timeout or an unreadable response.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_) | AppError::Timeout | AppError::Decode { .. }
        )
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Failures of a [`KeyValueStore`](crate::storage::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not serialise store contents: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Invalid configuration values read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Variable '{name}' has invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("No data directory available; set UFMA_SESSION_FILE")]
    NoDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        let unauthorized = AppError::Unauthorized { message: SESSION_EXPIRED.into() };
        assert!(unauthorized.needs_reauth());
        assert!(!unauthorized.is_connectivity());

        assert!(AppError::Timeout.is_connectivity());
        assert!(AppError::decode("missing field").is_connectivity());
        assert!(AppError::validation("x").is_validation());
    }

    #[test]
    fn user_messages_hide_internal_detail() {
        assert_eq!(AppError::decode("eof at line 1").user_message(), CONNECTION_ERROR);
        assert_eq!(AppError::Timeout.user_message(), TIMEOUT_ERROR);
        let backend = AppError::Backend { status: 400, message: "Email já cadastrado".into() };
        assert_eq!(backend.user_message(), "Email já cadastrado");
    }
}
