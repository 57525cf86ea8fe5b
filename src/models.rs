use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Source label used when the backend answers without naming any file.
pub const DEFAULT_SOURCE_LABEL: &str = "Documentos da UFMA";
/// Source label of an assistant message produced from a backend-reported failure.
pub const ERROR_SOURCE_LABEL: &str = "Sistema - Erro";
/// Source label of an assistant message produced from a connectivity failure.
pub const CONNECTION_ERROR_SOURCE_LABEL: &str = "Sistema - Erro de Conexão";

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    Email,
    Traditional,
    Google,
    Register,
}

/// The authenticated identity. `is_admin` is an opaque claim issued by the
/// backend; nothing on the client derives it.
///
/// Accepts both the backend spelling (`name`, `is_admin`, numeric `id`) and
/// the persisted client spelling (`displayName`, `isAdmin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "name", alias = "username")]
    pub display_name: String,
    pub email: String,
    #[serde(default, alias = "is_admin")]
    pub is_admin: bool,
    #[serde(default, alias = "avatar_url", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_method: Option<LoginMethod>,
    #[serde(default, alias = "loginTime", skip_serializing_if = "Option::is_none")]
    pub login_timestamp: Option<DateTime<Utc>>,
}

impl User {
    /// Marks the user as freshly logged in through `method`.
    pub fn stamped(mut self, method: LoginMethod) -> Self {
        self.login_method = Some(method);
        self.login_timestamp = Some(Utc::now());
        self
    }

    /// Takes the backend-owned fields from `fresh`, keeping the local login stamp.
    pub fn refreshed_from(&self, fresh: User) -> Self {
        User {
            login_method: self.login_method,
            login_timestamp: self.login_timestamp,
            ..fresh
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(i64),
        Str(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Num(n) => n.to_string(),
        Id::Str(s) => s,
    })
}

// ── Chat log ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl std::str::FromStr for Feedback {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" | "+" | "up" => Ok(Feedback::Positive),
            "negative" | "-" | "down" => Ok(Feedback::Negative),
            other => Err(format!("Unknown feedback: {other}")),
        }
    }
}

/// One entry of the live message log. Only `feedback` and `reported` change
/// after creation, and only through the conversation engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub source_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub feedback: Option<Feedback>,
    pub reported: bool,
}

impl ChatMessage {
    pub fn user(content: String) -> Self {
        Self::new(MessageRole::User, content, None)
    }

    pub fn assistant(content: String, source_label: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, Some(source_label.into()))
    }

    fn new(role: MessageRole, content: String, source_label: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            source_label,
            created_at: Utc::now(),
            feedback: None,
            reported: false,
        }
    }
}

/// A completed question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub source_label: String,
    pub timestamp: DateTime<Utc>,
}

// ── Backend payloads ─────────────────────────────────────────────────────────

/// A validated answer from either question-answering endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

impl Answer {
    /// Comma-separated source file names, or the fixed fallback label.
    pub fn source_label(&self) -> String {
        if self.sources.is_empty() {
            DEFAULT_SOURCE_LABEL.to_string()
        } else {
            self.sources.join(", ")
        }
    }
}

/// Credential pair returned by every login-style endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
    pub message: Option<String>,
}

/// Outcome of `POST /auth/register`; a grant is only present when the
/// backend chose to log the new account in directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub message: String,
    pub grant: Option<AuthGrant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    #[serde(default)]
    pub chunks: u64,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

impl DocumentInfo {
    pub fn title(&self) -> &str {
        self.filename.strip_suffix(".pdf").unwrap_or(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
    #[serde(default)]
    pub chunks: u64,
    #[serde(default)]
    pub message: String,
}

/// A row of the admin user listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

/// Free-form statistics object; its layout belongs to the backend.
pub type SystemStats = serde_json::Map<String, serde_json::Value>;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_accepts_backend_spelling() {
        let json = r#"{"id": 7, "name": "Maria", "email": "maria@ufma.br",
                       "is_admin": true, "avatar_url": null}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.display_name, "Maria");
        assert!(user.is_admin);
        assert_eq!(user.login_method, None);
    }

    #[test]
    fn user_persists_in_client_spelling() {
        let user = User {
            id: "1".into(),
            display_name: "Ana".into(),
            email: "ana@ufma.br".into(),
            is_admin: false,
            avatar_url: None,
            login_method: None,
            login_timestamp: None,
        }
        .stamped(LoginMethod::Email);

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["displayName"], "Ana");
        assert_eq!(value["isAdmin"], false);
        assert_eq!(value["loginMethod"], "email");

        let back: User = serde_json::from_value(value).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn refresh_keeps_login_stamp() {
        let local = User {
            id: "1".into(),
            display_name: "Ana".into(),
            email: "ana@ufma.br".into(),
            is_admin: false,
            avatar_url: None,
            login_method: None,
            login_timestamp: None,
        }
        .stamped(LoginMethod::Traditional);
        let fresh = User { display_name: "Ana Souza".into(), ..local.clone() };
        let fresh = User { login_method: None, login_timestamp: None, ..fresh };

        let merged = local.refreshed_from(fresh);
        assert_eq!(merged.display_name, "Ana Souza");
        assert_eq!(merged.login_method, Some(LoginMethod::Traditional));
        assert_eq!(merged.login_timestamp, local.login_timestamp);
    }

    #[test]
    fn source_label_joins_or_falls_back() {
        let answer = Answer { answer: "X".into(), sources: vec![] };
        assert_eq!(answer.source_label(), DEFAULT_SOURCE_LABEL);

        let answer = Answer {
            answer: "X".into(),
            sources: vec!["a.pdf".into(), "b.pdf".into()],
        };
        assert_eq!(answer.source_label(), "a.pdf, b.pdf");
    }

    #[test]
    fn document_title_strips_pdf_suffix() {
        let doc = DocumentInfo {
            filename: "resolucao_1892.pdf".into(),
            chunks: 12,
            upload_date: None,
            uploaded_by: None,
        };
        assert_eq!(doc.title(), "resolucao_1892");
    }

    #[test]
    fn feedback_parses_aliases() {
        assert_eq!("positive".parse::<Feedback>(), Ok(Feedback::Positive));
        assert_eq!("-".parse::<Feedback>(), Ok(Feedback::Negative));
        assert!("maybe".parse::<Feedback>().is_err());
    }
}
