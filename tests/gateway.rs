mod common;

use std::time::Duration;

use axum::extract::Multipart;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use common::{app, backend_user, config, spawn_backend, stored_user, Recorder};
use ufma_consulta::errors::{AppError, CONNECTION_ERROR, SESSION_EXPIRED};
use ufma_consulta::models::UploadFile;

fn answering_router(recorder: Recorder) -> Router {
    let chat = {
        let recorder = recorder.clone();
        move |headers: HeaderMap, Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.record("/chat", &headers);
                Json(json!({
                    "answer": format!("eco: {}", body["question"].as_str().unwrap_or("")),
                    "sources": [{"nome do arquivo": "resolucao.pdf"}]
                }))
            }
        }
    };
    let protected = {
        let recorder = recorder.clone();
        move |headers: HeaderMap| {
            let recorder = recorder.clone();
            async move {
                recorder.record("/protected-chat", &headers);
                Json(json!({"answer": "protegida", "sources": []}))
            }
        }
    };
    Router::new()
        .route("/chat", post(chat))
        .route("/protected-chat", post(protected))
}

#[tokio::test]
async fn public_ask_never_sends_credentials() {
    let recorder = Recorder::default();
    let base = spawn_backend(answering_router(recorder.clone())).await;
    let (app, _) = app(&config(&base));
    app.sessions.save(&stored_user(), "tok-123").unwrap();

    let answer = app.api.ask_public("Qual o prazo?").await.unwrap();
    assert_eq!(answer.answer, "eco: Qual o prazo?");
    assert_eq!(answer.sources, vec!["resolucao.pdf"]);

    let protected = app.api.ask_authenticated("Qual o prazo?").await.unwrap();
    assert_eq!(protected.answer, "protegida");

    assert_eq!(
        recorder.hits(),
        vec![
            ("/chat".to_string(), None),
            ("/protected-chat".to_string(), Some("Bearer tok-123".to_string())),
        ]
    );
}

#[tokio::test]
async fn protected_rejection_signals_reauth_without_clearing_session() {
    let router = Router::new().route(
        "/protected-chat",
        post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"error": "Token inválido ou expirado"}))) }),
    );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));
    app.sessions.save(&stored_user(), "stale").unwrap();

    let err = app.api.ask_authenticated("x").await.unwrap_err();
    assert!(err.needs_reauth());
    assert_eq!(err.user_message(), "Token inválido ou expirado");
    assert!(app.sessions.is_authenticated());
}

#[tokio::test]
async fn login_rejection_is_a_domain_error_with_server_message() {
    let router = Router::new().route(
        "/auth/login",
        post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"error": "Senha incorreta"}))) }),
    );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let err = app.api.login("a@ufma.br", "errada").await.unwrap_err();
    assert!(!err.needs_reauth());
    assert!(matches!(err, AppError::Backend { status: 401, .. }));
    assert_eq!(err.user_message(), "Senha incorreta");
}

#[tokio::test]
async fn login_normalises_email_and_returns_grant() {
    let router = Router::new().route(
        "/auth/login",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["email"], "maria.lima@discente.ufma.br");
            Json(json!({
                "success": true,
                "token": "tok-new",
                "user": backend_user(true),
                "message": "Login realizado com sucesso"
            }))
        }),
    );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let grant = app
        .api
        .login("  Maria.Lima@Discente.UFMA.br ", "segredo")
        .await
        .unwrap();
    assert_eq!(grant.token, "tok-new");
    assert!(grant.user.is_admin);
    // The gateway reports the grant; persisting it is the auth machine's job.
    assert!(!app.sessions.is_authenticated());
}

#[tokio::test]
async fn error_without_body_uses_operation_fallback() {
    let router = Router::new().route(
        "/documents",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let err = app.api.list_documents().await.unwrap_err();
    assert_eq!(err.user_message(), "Erro ao obter documentos");
}

#[tokio::test]
async fn non_json_success_is_a_connectivity_error() {
    let router = Router::new().route("/chat", post(|| async { "<html>proxy</html>" }));
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let err = app.api.ask_public("x").await.unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(err.user_message(), CONNECTION_ERROR);
}

#[tokio::test]
async fn unreachable_backend_is_a_connectivity_error() {
    let (app, _) = app(&config("http://127.0.0.1:9"));
    let err = app.api.list_users().await.unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn slow_backend_times_out() {
    let router = Router::new().route(
        "/admin/stats",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"stats": {}}))
        }),
    );
    let base = spawn_backend(router).await;
    let mut cfg = config(&base);
    cfg.request_timeout = Duration::from_millis(200);
    let (app, _) = app(&cfg);

    let err = app.api.get_stats().await.unwrap_err();
    assert!(matches!(err, AppError::Timeout));
}

#[tokio::test]
async fn verify_with_invalid_flag_needs_reauth() {
    let router = Router::new().route(
        "/auth/verify",
        get(|| async { Json(json!({"valid": false})) }),
    );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let err = app.api.verify_token().await.unwrap_err();
    assert!(err.needs_reauth());
    assert_eq!(err.user_message(), SESSION_EXPIRED);
}

#[tokio::test]
async fn upload_sends_multipart_file_with_bearer() {
    let recorder = Recorder::default();
    let upload = {
        let recorder = recorder.clone();
        move |headers: HeaderMap, mut multipart: Multipart| {
            let recorder = recorder.clone();
            async move {
                recorder.record("/upload", &headers);
                let field = multipart.next_field().await.unwrap().unwrap();
                assert_eq!(field.name(), Some("file"));
                let filename = field.file_name().unwrap().to_string();
                let bytes = field.bytes().await.unwrap();
                Json(json!({
                    "filename": filename,
                    "chunks": bytes.len(),
                    "message": "PDF carregado com sucesso!"
                }))
            }
        }
    };
    let router = Router::new().route("/upload", post(upload));
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));
    app.sessions.save(&stored_user(), "admin-tok").unwrap();

    let receipt = app
        .api
        .upload_document(UploadFile {
            file_name: "resolucao.pdf".into(),
            content_type: None,
            bytes: b"%PDF-1.4 conteudo".to_vec(),
        })
        .await
        .unwrap();

    assert_eq!(receipt.filename, "resolucao.pdf");
    assert_eq!(receipt.chunks, 17);
    assert_eq!(recorder.hits()[0].1.as_deref(), Some("Bearer admin-tok"));
}

#[tokio::test]
async fn admin_listings_degrade_gracefully() {
    let router = Router::new()
        .route(
            "/admin/users",
            get(|| async {
                Json(json!({"users": [
                    {"id": 1, "name": "Admin", "email": "admin.consepe@ufma.br", "is_admin": true},
                    "lixo"
                ], "total": 2}))
            }),
        )
        .route(
            "/admin/stats",
            get(|| async { Json(json!({"success": true})) }),
        );
    let base = spawn_backend(router).await;
    let (app, _) = app(&config(&base));

    let users = app.api.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(users[0].is_admin);

    let stats = app.api.get_stats().await.unwrap();
    assert!(stats.is_empty());
}

#[tokio::test]
async fn logout_is_local_and_idempotent() {
    let (app, _) = app(&config("http://127.0.0.1:9"));
    app.sessions.save(&stored_user(), "tok").unwrap();
    app.api.logout();
    app.api.logout();
    assert!(!app.sessions.is_authenticated());
}
