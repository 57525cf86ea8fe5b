//! Request bodies and the untrusted response shapes of the backend.
//!
//! Response envelopes only use optional fields; the `into_*` conversions are
//! where a payload is accepted, degraded to a fallback, or rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiResult;
use crate::errors::AppError;
use crate::models::{
    AccountSummary, Answer, AuthGrant, DocumentInfo, Registration, SystemStats, User,
};

/// Key under which the backend names the file a source chunk came from.
const SOURCE_FILENAME_KEY: &str = "nome do arquivo";
const REGISTERED_MESSAGE: &str = "Usuário cadastrado com sucesso";

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: String,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TraditionalLoginRequest<'a> {
    pub username: String,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GoogleLoginRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: String,
    pub email: String,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QuestionRequest<'a> {
    pub question: &'a str,
}

// ── Responses ────────────────────────────────────────────────────────────────

/// Error body of any failed call.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Server-supplied explanation, `error` taking precedence over `message`.
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// Shape shared by login, traditional login, Google login, refresh and register.
#[derive(Debug, Deserialize)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthEnvelope {
    pub fn into_grant(self, fallback: &str) -> ApiResult<AuthGrant> {
        match (self.success, self.token, self.user) {
            (true, Some(token), Some(user)) if !token.is_empty() => Ok(AuthGrant {
                token,
                user,
                message: self.message,
            }),
            _ => Err(domain_error(self.message.or(self.error), fallback)),
        }
    }

    pub fn into_registration(self, fallback: &str) -> ApiResult<Registration> {
        if !self.success {
            return Err(domain_error(self.message.or(self.error), fallback));
        }
        let grant = match (self.token, self.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some(AuthGrant {
                token,
                user,
                message: self.message.clone(),
            }),
            _ => None,
        };
        Ok(Registration {
            message: self.message.unwrap_or_else(|| REGISTERED_MESSAGE.to_string()),
            grant,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEnvelope {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerEnvelope {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub sources: Option<Value>,
}

impl AnswerEnvelope {
    /// A missing answer is unusable; missing or odd sources just mean "none".
    pub fn into_answer(self) -> ApiResult<Answer> {
        let answer = self
            .answer
            .ok_or_else(|| AppError::decode("answer payload has no 'answer' field"))?;

        let sources = match self.sources {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get(SOURCE_FILENAME_KEY)?.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Answer { answer, sources })
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentsEnvelope {
    #[serde(default)]
    pub documents: Vec<Value>,
}

impl DocumentsEnvelope {
    pub fn into_documents(self) -> Vec<DocumentInfo> {
        lenient_list(self.documents)
    }
}

#[derive(Debug, Deserialize)]
pub struct UsersEnvelope {
    #[serde(default)]
    pub users: Vec<Value>,
}

impl UsersEnvelope {
    pub fn into_users(self) -> Vec<AccountSummary> {
        lenient_list(self.users)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsEnvelope {
    #[serde(default)]
    pub stats: SystemStats,
}

fn lenient_list<T: serde::de::DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| {
            serde_json::from_value(item)
                .map_err(|e| tracing::warn!("Skipping malformed list entry: {e}"))
                .ok()
        })
        .collect()
}

fn domain_error(message: Option<String>, fallback: &str) -> AppError {
    AppError::Backend {
        status: 200,
        message: message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    }
}
