#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use axum::Router;
use serde_json::{json, Value};

use ufma_consulta::config::{ChatEndpoint, Config};
use ufma_consulta::models::{LoginMethod, User};
use ufma_consulta::storage::MemoryStore;
use ufma_consulta::App;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn config(base_url: &str) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn protected_config(base_url: &str) -> Config {
    Config {
        chat_endpoint: ChatEndpoint::Protected,
        ..config(base_url)
    }
}

pub fn app(config: &Config) -> (App, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = App::new(config, store.clone()).unwrap();
    (app, store)
}

/// Every request the mock saw: path and `Authorization` header.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl Recorder {
    pub fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.0.lock().unwrap().push((path.to_string(), auth));
    }

    pub fn hits(&self) -> Vec<(String, Option<String>)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.hits().iter().filter(|(p, _)| p == path).count()
    }
}

/// User record in the backend's spelling.
pub fn backend_user(is_admin: bool) -> Value {
    json!({
        "id": 3,
        "name": "Maria Lima",
        "email": "maria.lima@discente.ufma.br",
        "is_admin": is_admin,
        "avatar_url": null
    })
}

pub fn stored_user() -> User {
    User {
        id: "3".into(),
        display_name: "Maria".into(),
        email: "maria.lima@discente.ufma.br".into(),
        is_admin: false,
        avatar_url: None,
        login_method: None,
        login_timestamp: None,
    }
    .stamped(LoginMethod::Email)
}
