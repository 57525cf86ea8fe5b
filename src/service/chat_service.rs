use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiResult};
use crate::config::{ChatEndpoint, Config};
use crate::errors::{AppError, TIMEOUT_ERROR};
use crate::models::{
    Answer, ChatMessage, Feedback, HistoryEntry, CONNECTION_ERROR_SOURCE_LABEL,
    ERROR_SOURCE_LABEL,
};

/// Canned prompts offered while typing.
pub const QUICK_SUGGESTIONS: [&str; 5] = [
    "Quais são os requisitos para transferência de curso?",
    "Como funciona o sistema de avaliação?",
    "Qual a carga horária mínima dos cursos?",
    "Normas sobre estágio supervisionado",
    "Procedimentos para colação de grau",
];

const MAX_SUGGESTIONS: usize = 3;
/// Inputs at or below this many characters get no suggestions.
const SUGGESTION_MIN_CHARS: usize = 2;

/// Reply shown when the backend could not be reached.
pub const CONNECTION_FAILURE_REPLY: &str =
    "Ocorreu um erro inesperado. Verifique sua conexão e tente novamente.";

/// Case-insensitive substring filter over [`QUICK_SUGGESTIONS`], capped at three.
pub fn filter_suggestions(text: &str) -> Vec<&'static str> {
    filter_candidates(&QUICK_SUGGESTIONS, text)
}

fn filter_candidates(candidates: &[&'static str], text: &str) -> Vec<&'static str> {
    let query = text.trim();
    if query.chars().count() <= SUGGESTION_MIN_CHARS {
        return Vec::new();
    }
    let query = query.to_lowercase();
    candidates
        .iter()
        .copied()
        .filter(|s| s.to_lowercase().contains(&query))
        .take(MAX_SUGGESTIONS)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    Empty,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// An assistant message with the answer was appended.
    Answered(Uuid),
    /// An error-surrogate assistant message was appended.
    Failed(Uuid),
    /// The log was reset while the call was in flight; the result was dropped.
    Discarded,
    Rejected(SubmitRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub fn enter() -> Self {
        Self { key: Key::Enter, shift: false }
    }

    pub fn shift_enter() -> Self {
        Self { key: Key::Enter, shift: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Submitted(SubmitOutcome),
    NewlineInserted,
    Ignored,
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    history: Vec<HistoryEntry>,
    input: String,
    suggestions: Vec<&'static str>,
    pending: bool,
    /// Bumped by every reset; results from an older generation are dropped.
    generation: u64,
    reauth_suggested: bool,
}

/// The conversation engine: the ordered message log, the single pending
/// question, suggestions and the per-message annotations.
///
/// Cheap to clone. The lock is never held across a network call, so readers
/// always observe a consistent log in submission order.
#[derive(Clone)]
pub struct ChatService {
    api: ApiClient,
    endpoint: ChatEndpoint,
    keep_history_on_logout: bool,
    state: Arc<Mutex<ChatState>>,
}

impl ChatService {
    pub fn new(api: ApiClient, config: &Config) -> Self {
        Self {
            api,
            endpoint: config.chat_endpoint,
            keep_history_on_logout: config.keep_history_on_logout,
            state: Arc::new(Mutex::new(ChatState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Appends the question, asks the backend once, and appends the reply.
    ///
    /// Rejected without touching the log when `text` is blank or a question
    /// is already pending.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let question = text.trim().to_string();

        let generation = {
            let mut state = self.state();
            if question.is_empty() {
                return SubmitOutcome::Rejected(SubmitRejection::Empty);
            }
            if state.pending {
                debug!("Question rejected: another one is still pending");
                return SubmitOutcome::Rejected(SubmitRejection::Pending);
            }
            state.messages.push(ChatMessage::user(question.clone()));
            state.input.clear();
            state.suggestions.clear();
            state.reauth_suggested = false;
            state.pending = true;
            state.generation
        };

        let (result, fell_back) = self.ask(&question).await;

        let mut state = self.state();
        state.pending = false;
        if state.generation != generation {
            info!("Dropping answer that arrived after the conversation was reset");
            return SubmitOutcome::Discarded;
        }
        state.reauth_suggested = fell_back;

        match result {
            Ok(answer) => {
                let source_label = answer.source_label();
                let reply = ChatMessage::assistant(answer.answer.clone(), source_label.clone());
                let id = reply.id;
                state.messages.push(reply);
                state.history.push(HistoryEntry {
                    question,
                    answer: answer.answer,
                    source_label,
                    timestamp: chrono::Utc::now(),
                });
                SubmitOutcome::Answered(id)
            }
            Err(err) => {
                warn!("Question failed: {err}");
                let reply = failure_reply(&err);
                let id = reply.id;
                state.messages.push(reply);
                SubmitOutcome::Failed(id)
            }
        }
    }

    /// Submits the current input.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.submit(&text).await
    }

    /// The flag is `true` when the protected route rejected the credential
    /// and the public route answered instead.
    async fn ask(&self, question: &str) -> (ApiResult<Answer>, bool) {
        if self.endpoint == ChatEndpoint::Protected && self.api.session().is_authenticated() {
            match self.api.ask_authenticated(question).await {
                Err(err) if err.needs_reauth() => {
                    warn!("Protected chat rejected the credential; retrying on the public endpoint");
                    return (self.api.ask_public(question).await, true);
                }
                other => return (other, false),
            }
        }
        (self.api.ask_public(question).await, false)
    }

    // ── Input ────────────────────────────────────────────────────────────────

    /// Stores the input text and recomputes the suggestion list.
    pub fn update_input(&self, text: &str) {
        let mut state = self.state();
        state.input = text.to_string();
        state.suggestions = filter_suggestions(text);
    }

    /// Copies the suggestion at `index` into the input.
    pub fn select_suggestion(&self, index: usize) -> Option<&'static str> {
        let mut state = self.state();
        let chosen = *state.suggestions.get(index)?;
        state.input = chosen.to_string();
        state.suggestions.clear();
        Some(chosen)
    }

    /// Enter submits; Shift+Enter inserts a newline into the input.
    pub async fn handle_key(&self, press: KeyPress) -> KeyOutcome {
        match press {
            KeyPress { key: Key::Enter, shift: false } => {
                KeyOutcome::Submitted(self.submit_input().await)
            }
            KeyPress { key: Key::Enter, shift: true } => {
                self.state().input.push('\n');
                KeyOutcome::NewlineInserted
            }
            KeyPress { key: Key::Other, .. } => KeyOutcome::Ignored,
        }
    }

    // ── Annotations ──────────────────────────────────────────────────────────

    /// Returns `false` when no message has `id`.
    pub fn set_feedback(&self, id: Uuid, feedback: Feedback) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        message.feedback = Some(feedback);
        info!(target: "ufma_consulta::feedback", message_id = %id, ?feedback, "feedback recorded");
        true
    }

    /// Flags a message as wrong. Idempotent; `false` when no message has `id`.
    pub fn report_error(&self, id: Uuid) -> bool {
        let mut state = self.state();
        let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if !message.reported {
            message.reported = true;
            info!(target: "ufma_consulta::feedback", message_id = %id, "error reported");
        }
        true
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Empties the log. History is kept only when configured to survive logout.
    /// A question still in flight keeps the engine pending until it resolves,
    /// but its answer is dropped.
    pub fn reset(&self) {
        let mut state = self.state();
        state.messages.clear();
        state.input.clear();
        state.suggestions.clear();
        state.reauth_suggested = false;
        if !self.keep_history_on_logout {
            state.history.clear();
        }
        state.generation += 1;
    }

    // ── Readers ──────────────────────────────────────────────────────────────

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    pub fn message(&self, id: Uuid) -> Option<ChatMessage> {
        self.state().messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state().history.clone()
    }

    pub fn input(&self) -> String {
        self.state().input.clone()
    }

    pub fn suggestions(&self) -> Vec<&'static str> {
        self.state().suggestions.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state().pending
    }

    /// Set when the protected endpoint rejected the credential during the
    /// last question.
    pub fn reauth_suggested(&self) -> bool {
        self.state().reauth_suggested
    }
}

fn failure_reply(err: &AppError) -> ChatMessage {
    match err {
        AppError::Timeout => {
            ChatMessage::assistant(TIMEOUT_ERROR.to_string(), CONNECTION_ERROR_SOURCE_LABEL)
        }
        err if err.is_connectivity() => ChatMessage::assistant(
            CONNECTION_FAILURE_REPLY.to_string(),
            CONNECTION_ERROR_SOURCE_LABEL,
        ),
        err => ChatMessage::assistant(format!("Erro: {}", err.user_message()), ERROR_SOURCE_LABEL),
    }
}
