use std::sync::Arc;

use tracing::{error, warn};

use crate::errors::StorageError;
use crate::models::User;
use crate::storage::KeyValueStore;

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

/// A persisted credential pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Owns the two persisted session keys. Cheap to clone; all clones share the
/// same backend.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads the persisted session. Any missing or malformed part yields
    /// `None`; a half-written pair is cleared on the way out.
    pub fn load(&self) -> Option<Session> {
        let token = self.read(TOKEN_KEY);
        let raw_user = self.read(USER_KEY);

        let user = raw_user.as_deref().and_then(|raw| {
            serde_json::from_str::<User>(raw)
                .map_err(|e| warn!("Discarding malformed persisted user: {e}"))
                .ok()
        });

        match (token, user) {
            (Some(token), Some(user)) if !token.is_empty() => Some(Session { user, token }),
            (None, None) if raw_user.is_none() => None,
            _ => {
                warn!("Persisted session is incomplete; clearing it");
                self.clear();
                None
            }
        }
    }

    /// Persists both keys or neither.
    pub fn save(&self, user: &User, token: &str) -> Result<(), StorageError> {
        let user_json = serde_json::to_string(user)?;
        let previous_user = self.store.get(USER_KEY)?;

        self.store.set(USER_KEY, &user_json)?;
        if let Err(e) = self.store.set(TOKEN_KEY, token) {
            let rollback = match previous_user {
                Some(old) => self.store.set(USER_KEY, &old),
                None => self.store.remove(USER_KEY),
            };
            if let Err(rollback_err) = rollback {
                error!("Session rollback failed: {rollback_err}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes both keys. Idempotent; storage faults are logged, never raised.
    pub fn clear(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                error!("Failed to remove '{key}' from session storage: {e}");
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        let has_token = self.read(TOKEN_KEY).is_some_and(|t| !t.is_empty());
        has_token && self.user().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn user(&self) -> Option<User> {
        self.read(USER_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|e| {
            error!("Failed to read '{key}' from session storage: {e}");
            None
        })
    }
}
