use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiResult};
use crate::errors::AppError;
use crate::models::{AuthGrant, LoginMethod, User};
use crate::service::chat_service::ChatService;

pub const MISSING_FIELDS: &str = "Preencha todos os campos!";
pub const PASSWORD_MISMATCH: &str = "As senhas não coincidem!";
pub const NOT_AVAILABLE: &str = "Operação indisponível no momento";

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// The stored session has not been checked yet.
    Booting,
    Unauthenticated,
    /// A login-style call is in flight.
    Authenticating,
    Authenticated(User),
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Fields of the sign-up form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    fn validate(&self) -> Result<(), AppError> {
        if self.password != self.confirm_password {
            return Err(AppError::validation(PASSWORD_MISMATCH));
        }
        if [&self.name, &self.email, &self.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::validation(MISSING_FIELDS));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    /// The backend logged the new account in directly.
    LoggedIn(User),
    /// The account exists; the user still has to log in.
    AccountCreated { message: String },
}

/// The authentication state machine:
///
/// ```text
/// Booting ──► Unauthenticated ◄──► Authenticating ──► Authenticated
///    └──────────────────────────────────────────────────────┘
/// Authenticated ──logout──► Unauthenticated
/// ```
///
/// The gateway never ends a session by itself; this type does, on logout,
/// on a failed boot verification, and through [`AuthService::handle_reauth`].
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    chat: ChatService,
    state: Arc<Mutex<AuthState>>,
    boot_started: Arc<AtomicBool>,
}

impl AuthService {
    pub fn new(api: ApiClient, chat: ChatService) -> Self {
        Self {
            api,
            chat,
            state: Arc::new(Mutex::new(AuthState::Booting)),
            boot_started: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: AuthState) {
        *self.lock() = next;
    }

    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.lock().user().cloned()
    }

    pub fn is_admin(&self) -> bool {
        self.lock().user().is_some_and(|u| u.is_admin)
    }

    // ── Boot ─────────────────────────────────────────────────────────────────

    /// Checks the persisted session against the backend. Runs once per
    /// process; later calls return the current state.
    pub async fn boot(&self) -> AuthState {
        if self.boot_started.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let sessions = self.api.session();
        let Some(stored) = sessions.load() else {
            info!("No stored session");
            self.set_state(AuthState::Unauthenticated);
            return self.state();
        };

        match self.api.verify_token().await {
            Ok(fresh) => {
                let mut state = self.lock();
                if *state != AuthState::Booting {
                    info!("Discarding boot verification; state changed to {:?}", *state);
                    return state.clone();
                }
                let user = stored.user.refreshed_from(fresh);
                if let Err(e) = sessions.save(&user, &stored.token) {
                    error!("Could not persist refreshed user: {e}");
                }
                info!("Stored session for {} is valid", user.email);
                *state = AuthState::Authenticated(user);
                state.clone()
            }
            Err(err) => {
                info!("Stored session rejected ({err}); clearing it");
                let mut state = self.lock();
                if *state == AuthState::Booting {
                    self.api.logout();
                    *state = AuthState::Unauthenticated;
                }
                state.clone()
            }
        }
    }

    // ── Login family ─────────────────────────────────────────────────────────

    /// Email + password login.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        require_filled(&[email, password])?;
        self.authenticate(LoginMethod::Email, self.api.login(email, password))
            .await
    }

    /// Username + password login on the compatibility route.
    pub async fn login_traditional(&self, username: &str, password: &str) -> Result<User, AppError> {
        require_filled(&[username, password])?;
        self.authenticate(
            LoginMethod::Traditional,
            self.api.login_traditional(username, password),
        )
        .await
    }

    /// Login with a token issued by the external identity provider.
    pub async fn google_login(&self, external_token: &str) -> Result<User, AppError> {
        require_filled(&[external_token])?;
        self.authenticate(LoginMethod::Google, self.api.login_google(external_token))
            .await
    }

    pub async fn register(&self, form: &RegistrationForm) -> Result<RegisterOutcome, AppError> {
        form.validate()?;
        self.begin_authenticating()?;

        let result = self
            .api
            .register_user(&form.name, &form.email, &form.password)
            .await;

        match result {
            Ok(registration) => match registration.grant {
                Some(grant) => self
                    .commit(LoginMethod::Register, grant)
                    .map(RegisterOutcome::LoggedIn),
                None => {
                    info!("Account created for {}", form.email.trim());
                    self.finish_unauthenticated();
                    Ok(RegisterOutcome::AccountCreated { message: registration.message })
                }
            },
            Err(err) => {
                warn!("Registration failed: {err}");
                self.finish_unauthenticated();
                Err(err)
            }
        }
    }

    async fn authenticate(
        &self,
        method: LoginMethod,
        call: impl Future<Output = ApiResult<AuthGrant>>,
    ) -> Result<User, AppError> {
        self.begin_authenticating()?;
        match call.await {
            Ok(grant) => self.commit(method, grant),
            Err(err) => {
                warn!("Login ({method:?}) failed: {err}");
                self.finish_unauthenticated();
                Err(err)
            }
        }
    }

    fn begin_authenticating(&self) -> Result<(), AppError> {
        let mut state = self.lock();
        if *state != AuthState::Unauthenticated {
            warn!("Login attempted while {:?}", *state);
            return Err(AppError::validation(NOT_AVAILABLE));
        }
        *state = AuthState::Authenticating;
        Ok(())
    }

    /// Stores the grant and enters `Authenticated`, unless a logout happened
    /// while the call was in flight.
    fn commit(&self, method: LoginMethod, grant: AuthGrant) -> Result<User, AppError> {
        let mut state = self.lock();
        if *state != AuthState::Authenticating {
            info!("Discarding login result; state changed to {:?}", *state);
            return Err(AppError::validation(NOT_AVAILABLE));
        }

        let user = grant.user.stamped(method);
        if let Err(e) = self.api.session().save(&user, &grant.token) {
            error!("Could not persist session: {e}");
            *state = AuthState::Unauthenticated;
            return Err(e.into());
        }
        info!(admin = user.is_admin, "Logged in as {}", user.email);
        *state = AuthState::Authenticated(user.clone());
        Ok(user)
    }

    fn finish_unauthenticated(&self) {
        let mut state = self.lock();
        if *state == AuthState::Authenticating {
            *state = AuthState::Unauthenticated;
        }
    }

    // ── Session upkeep ───────────────────────────────────────────────────────

    /// Exchanges the current credential for a fresh one.
    pub async fn refresh(&self) -> Result<User, AppError> {
        let Some(current) = self.current_user() else {
            return Err(AppError::validation(NOT_AVAILABLE));
        };
        let grant = self.api.refresh_token().await?;

        let mut state = self.lock();
        if state.user().map(|u| &u.id) != Some(&current.id) {
            info!("Discarding refreshed token; session changed meanwhile");
            return Err(AppError::validation(NOT_AVAILABLE));
        }
        let user = current.refreshed_from(grant.user);
        self.api.session().save(&user, &grant.token)?;
        *state = AuthState::Authenticated(user.clone());
        Ok(user)
    }

    /// Ends the session when `err` says the credential was rejected.
    /// Returns whether it did.
    pub fn handle_reauth(&self, err: &AppError) -> bool {
        if !err.needs_reauth() || self.current_user().is_none() {
            return false;
        }
        warn!("Credential rejected by the backend; logging out");
        self.logout();
        true
    }

    /// Clears the stored session and the conversation. Always succeeds.
    pub fn logout(&self) {
        self.api.logout();
        self.chat.reset();
        self.set_state(AuthState::Unauthenticated);
        info!("Logged out");
    }
}

fn require_filled(fields: &[&str]) -> Result<(), AppError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::validation(MISSING_FIELDS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::SessionStore;
    use crate::storage::MemoryStore;

    fn offline_auth() -> AuthService {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".into(),
            ..Config::default()
        };
        let session = SessionStore::new(Arc::new(MemoryStore::new()));
        let api = ApiClient::new(&config, session).unwrap();
        let chat = ChatService::new(api.clone(), &config);
        AuthService::new(api, chat)
    }

    #[test]
    fn registration_form_checks_mismatch_then_blanks() {
        let form = RegistrationForm {
            name: "".into(),
            email: "a@ufma.br".into(),
            password: "123456".into(),
            confirm_password: "654321".into(),
        };
        assert_eq!(form.validate().unwrap_err().user_message(), PASSWORD_MISMATCH);

        let form = RegistrationForm { confirm_password: "123456".into(), ..form };
        assert_eq!(form.validate().unwrap_err().user_message(), MISSING_FIELDS);

        let form = RegistrationForm { name: "Ana".into(), ..form };
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn boot_without_session_is_unauthenticated_and_runs_once() {
        let auth = offline_auth();
        assert_eq!(auth.state(), AuthState::Booting);
        assert_eq!(auth.boot().await, AuthState::Unauthenticated);
        assert_eq!(auth.boot().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn login_is_unavailable_before_boot() {
        let auth = offline_auth();
        let err = auth.login("a@ufma.br", "segredo").await.unwrap_err();
        assert_eq!(err.user_message(), NOT_AVAILABLE);
        assert_eq!(auth.state(), AuthState::Booting);
    }

    #[tokio::test]
    async fn blank_credentials_never_reach_the_network() {
        let auth = offline_auth();
        auth.boot().await;

        let err = auth.login("  ", "x").await.unwrap_err();
        assert!(err.is_validation());
        let err = auth.login_traditional("joao", "").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(auth.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn transport_failure_returns_to_unauthenticated() {
        let auth = offline_auth();
        auth.boot().await;

        let err = auth.login("a@ufma.br", "segredo").await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(auth.state(), AuthState::Unauthenticated);
        assert!(!auth.api.session().is_authenticated());
    }

    #[test]
    fn reauth_is_ignored_when_logged_out() {
        let auth = offline_auth();
        let err = AppError::Unauthorized { message: "x".into() };
        assert!(!auth.handle_reauth(&err));
    }
}
