//! Client for the UFMA academic-regulations consultation service.
//!
//! The crate holds the client-side state of the consultation app: the
//! persisted session, the typed backend gateway, the authentication state
//! machine, the conversation engine and the view router. Presentation is left
//! to the caller; the `ufma-consulta` binary is a terminal front-end.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod router;
pub mod service;
pub mod session;
pub mod storage;

use std::sync::Arc;

use crate::api::{ApiClient, ApiResult};
use crate::config::Config;
use crate::service::admin_service::AdminService;
use crate::service::auth_service::AuthService;
use crate::service::chat_service::ChatService;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

/// All services wired over one gateway and one session store.
#[derive(Clone)]
pub struct App {
    pub sessions: SessionStore,
    pub api: ApiClient,
    pub auth: AuthService,
    pub chat: ChatService,
    pub admin: AdminService,
}

impl App {
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let sessions = SessionStore::new(store);
        let api = ApiClient::new(config, sessions.clone())?;
        let chat = ChatService::new(api.clone(), config);
        let auth = AuthService::new(api.clone(), chat.clone());
        let admin = AdminService::new(api.clone());
        Ok(Self { sessions, api, auth, chat, admin })
    }
}
