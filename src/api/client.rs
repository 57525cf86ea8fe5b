use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::wire::{
    AnswerEnvelope, AuthEnvelope, DocumentsEnvelope, ErrorBody, GoogleLoginRequest, LoginRequest,
    QuestionRequest, RegisterRequest, StatsEnvelope, TraditionalLoginRequest, UsersEnvelope,
    VerifyEnvelope,
};
use crate::api::ApiResult;
use crate::config::Config;
use crate::errors::{AppError, SESSION_EXPIRED};
use crate::models::{
    AccountSummary, Answer, AuthGrant, DocumentInfo, Registration, SystemStats, UploadFile,
    UploadReceipt, User,
};
use crate::session::SessionStore;

const LOGIN_FAILED: &str = "Erro no login";
const GOOGLE_LOGIN_FAILED: &str = "Erro no login com Google";
const REGISTER_FAILED: &str = "Erro no cadastro";
const REFRESH_FAILED: &str = "Erro ao renovar token";
const ASK_FAILED: &str = "Erro ao enviar mensagem";
const DOCUMENTS_FAILED: &str = "Erro ao obter documentos";
const UPLOAD_FAILED: &str = "Erro no upload";
const USERS_FAILED: &str = "Erro ao obter usuários";
const STATS_FAILED: &str = "Erro ao obter estatísticas";

/// Whether a call carries the stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credentials {
    Anonymous,
    Bearer,
}

/// The backend gateway. Reads the current token from the [`SessionStore`] on
/// every authenticated call; only [`ApiClient::logout`] writes to it.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionStore) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(AppError::Transport)?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // ── Authentication ───────────────────────────────────────────────────────

    /// `POST /auth/login`
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthGrant> {
        let body = LoginRequest {
            email: email.trim().to_lowercase(),
            password,
        };
        let envelope: AuthEnvelope = self
            .send_json(Method::POST, "/auth/login", Some(&body), Credentials::Anonymous, LOGIN_FAILED)
            .await?;
        envelope.into_grant(LOGIN_FAILED)
    }

    /// `POST /auth/traditional`
    pub async fn login_traditional(&self, username: &str, password: &str) -> ApiResult<AuthGrant> {
        let body = TraditionalLoginRequest {
            username: username.trim().to_string(),
            password,
        };
        let envelope: AuthEnvelope = self
            .send_json(
                Method::POST,
                "/auth/traditional",
                Some(&body),
                Credentials::Anonymous,
                LOGIN_FAILED,
            )
            .await?;
        envelope.into_grant(LOGIN_FAILED)
    }

    /// `POST /auth/google` with a token obtained from the external provider.
    pub async fn login_google(&self, external_token: &str) -> ApiResult<AuthGrant> {
        let body = GoogleLoginRequest { token: external_token };
        let envelope: AuthEnvelope = self
            .send_json(
                Method::POST,
                "/auth/google",
                Some(&body),
                Credentials::Anonymous,
                GOOGLE_LOGIN_FAILED,
            )
            .await?;
        envelope.into_grant(GOOGLE_LOGIN_FAILED)
    }

    /// `POST /auth/register`
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<Registration> {
        let body = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            password,
        };
        let envelope: AuthEnvelope = self
            .send_json(
                Method::POST,
                "/auth/register",
                Some(&body),
                Credentials::Anonymous,
                REGISTER_FAILED,
            )
            .await?;
        envelope.into_registration(REGISTER_FAILED)
    }

    /// `GET /auth/verify`
    pub async fn verify_token(&self) -> ApiResult<User> {
        let envelope: VerifyEnvelope = self
            .send_json::<(), _>(Method::GET, "/auth/verify", None, Credentials::Bearer, SESSION_EXPIRED)
            .await?;
        match envelope {
            VerifyEnvelope { valid: true, user: Some(user) } => Ok(user),
            _ => Err(AppError::Unauthorized { message: SESSION_EXPIRED.to_string() }),
        }
    }

    /// `POST /auth/refresh`
    pub async fn refresh_token(&self) -> ApiResult<AuthGrant> {
        let envelope: AuthEnvelope = self
            .send_json::<(), _>(Method::POST, "/auth/refresh", None, Credentials::Bearer, REFRESH_FAILED)
            .await?;
        envelope.into_grant(REFRESH_FAILED)
    }

    /// Local only: forgets the stored credential. Always succeeds.
    pub fn logout(&self) {
        self.session.clear();
    }

    // ── Question answering ───────────────────────────────────────────────────

    /// `POST /chat`, never carries credentials.
    pub async fn ask_public(&self, question: &str) -> ApiResult<Answer> {
        self.ask("/chat", question, Credentials::Anonymous).await
    }

    /// `POST /protected-chat`
    pub async fn ask_authenticated(&self, question: &str) -> ApiResult<Answer> {
        self.ask("/protected-chat", question, Credentials::Bearer).await
    }

    async fn ask(&self, path: &str, question: &str, credentials: Credentials) -> ApiResult<Answer> {
        let body = QuestionRequest { question };
        let envelope: AnswerEnvelope = self
            .send_json(Method::POST, path, Some(&body), credentials, ASK_FAILED)
            .await?;
        envelope.into_answer()
    }

    // ── Corpus & administration ──────────────────────────────────────────────

    /// `GET /documents`
    pub async fn list_documents(&self) -> ApiResult<Vec<DocumentInfo>> {
        let envelope: DocumentsEnvelope = self
            .send_json::<(), _>(Method::GET, "/documents", None, Credentials::Bearer, DOCUMENTS_FAILED)
            .await?;
        Ok(envelope.into_documents())
    }

    /// `POST /upload` as `multipart/form-data` with a single `file` part.
    pub async fn upload_document(&self, file: UploadFile) -> ApiResult<UploadReceipt> {
        let mime = file.content_type.as_deref().unwrap_or("application/pdf");
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(mime)
            .map_err(AppError::Transport)?;
        let form = Form::new().part("file", part);

        let request = self.request(Method::POST, "/upload", Credentials::Bearer).multipart(form);
        let value = self.dispatch(request, "/upload", Credentials::Bearer, UPLOAD_FAILED).await?;
        decode(value)
    }

    /// `GET /admin/users`
    pub async fn list_users(&self) -> ApiResult<Vec<AccountSummary>> {
        let envelope: UsersEnvelope = self
            .send_json::<(), _>(Method::GET, "/admin/users", None, Credentials::Bearer, USERS_FAILED)
            .await?;
        Ok(envelope.into_users())
    }

    /// `GET /admin/stats`
    pub async fn get_stats(&self) -> ApiResult<SystemStats> {
        let envelope: StatsEnvelope = self
            .send_json::<(), _>(Method::GET, "/admin/stats", None, Credentials::Bearer, STATS_FAILED)
            .await?;
        Ok(envelope.stats)
    }

    // ── Plumbing ─────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str, credentials: Credentials) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match (credentials, self.session.token()) {
            (Credentials::Bearer, Some(token)) => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        credentials: Credentials,
        fallback: &str,
    ) -> ApiResult<T> {
        let mut request = self.request(method, path, credentials);
        if let Some(body) = body {
            request = request.json(body);
        }
        let value = self.dispatch(request, path, credentials, fallback).await?;
        decode(value)
    }

    /// Sends `request` and maps every failure mode onto [`AppError`].
    async fn dispatch(
        &self,
        request: RequestBuilder,
        path: &str,
        credentials: Credentials,
        fallback: &str,
    ) -> ApiResult<serde_json::Value> {
        debug!("→ {path}");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Request to {path} timed out");
                AppError::Timeout
            } else {
                warn!("Request to {path} failed: {e}");
                AppError::Transport(e)
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!("Reading response of {path} failed: {e}");
            if e.is_timeout() {
                AppError::Timeout
            } else {
                AppError::Transport(e)
            }
        })?;

        if status.is_success() {
            debug!("← {path} {status}");
            return serde_json::from_slice(&bytes).map_err(|e| {
                warn!("Response of {path} is not JSON: {e}");
                AppError::decode(e.to_string())
            });
        }

        let server_message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(ErrorBody::into_message);
        warn!("{path} answered {status}: {}", server_message.as_deref().unwrap_or("-"));

        if status == StatusCode::UNAUTHORIZED && credentials == Credentials::Bearer {
            return Err(AppError::Unauthorized {
                message: server_message.unwrap_or_else(|| SESSION_EXPIRED.to_string()),
            });
        }
        Err(AppError::Backend {
            status: status.as_u16(),
            message: server_message.unwrap_or_else(|| fallback.to_string()),
        })
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| {
        warn!("Unexpected response shape: {e}");
        AppError::decode(e.to_string())
    })
}
