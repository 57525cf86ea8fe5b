use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use ufma_consulta::config::Config;
use ufma_consulta::models::{Feedback, MessageRole};
use ufma_consulta::router::{route, Screen, View};
use ufma_consulta::service::admin_service::AdminService;
use ufma_consulta::service::auth_service::{RegisterOutcome, RegistrationForm};
use ufma_consulta::service::chat_service::{KeyOutcome, KeyPress, QUICK_SUGGESTIONS};
use ufma_consulta::storage::{FileStore, KeyValueStore, MemoryStore};
use ufma_consulta::App;

const DOCUMENT_VERSION: &str = "RESOLUÇÃO Nº 1892-CONSEPE - v1.0 (28/06/2019)";

const LOGIN_HELP: &str = "\
/login <email> <senha>        entrar com email
/entrar <usuário> <senha>     entrar com usuário
/google <token>               entrar com token Google
/cadastro                     criar conta
/fim                          encerrar";

const CHAT_HELP: &str = "\
<texto>                       enviar pergunta (termine com \\ para nova linha)
/sugerir <texto>              ver sugestões
/usar <n>                     enviar a sugestão n
/util <n> | /inutil <n>       avaliar a resposta n
/reportar <n>                 reportar erro na resposta n
/chat | /historico | /admin   trocar de tela
/upload <arquivo.pdf>         enviar documento (admin)
/renovar                      renovar sessão
/sair                         sair da conta
/fim                          encerrar";

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Logs go to stderr so they stay out of the transcript
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ufma_consulta=info".into()),
        )
        .init();

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let config = Config::from_env()?;
    let store: Arc<dyn KeyValueStore> = match &config.session_file {
        Some(path) => Arc::new(FileStore::open(path)),
        None => Arc::new(MemoryStore::new()),
    };
    let app = App::new(&config, store)?;
    info!("Backend at {}", config.api_base_url);

    println!("Sistema de Consultas UFMA\n{DOCUMENT_VERSION}\n");
    println!("Carregando Sistema UFMA...");
    app.auth.boot().await;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut view = View::default();
    let mut shown = 0usize;

    loop {
        let screen = route(&app.auth.state(), view);
        match screen {
            Screen::Loading => {
                app.auth.boot().await;
            }
            Screen::Login => {
                shown = 0;
                view = View::default();
                println!("\n{LOGIN_HELP}");
                let Some(line) = prompt(&mut input, "login> ").await? else { break };
                if !login_command(&app, &mut input, line.trim()).await? {
                    break;
                }
            }
            Screen::Chat | Screen::History | Screen::Admin => {
                if screen == Screen::Chat {
                    shown = print_new_messages(&app, shown);
                }
                let Some(line) = prompt(&mut input, "> ").await? else { break };
                match chat_command(&app, &mut view, line.trim_end()).await {
                    Flow::Continue => {}
                    Flow::Quit => break,
                }
            }
        }
    }

    info!("Bye");
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Returns `false` when the user asked to quit.
async fn login_command(app: &App, input: &mut Input, line: &str) -> anyhow::Result<bool> {
    let mut words = line.split_whitespace();
    let result = match (words.next(), words.next(), words.next()) {
        (Some("/fim"), ..) => return Ok(false),
        (Some("/login"), email, password) => app
            .auth
            .login(email.unwrap_or_default(), password.unwrap_or_default())
            .await
            .map(|u| format!("Bem-vindo, {}!", u.display_name)),
        (Some("/entrar"), username, password) => app
            .auth
            .login_traditional(username.unwrap_or_default(), password.unwrap_or_default())
            .await
            .map(|u| format!("Bem-vindo, {}!", u.display_name)),
        (Some("/google"), token, _) => app
            .auth
            .google_login(token.unwrap_or_default())
            .await
            .map(|u| format!("Bem-vindo, {}!", u.display_name)),
        (Some("/cadastro"), ..) => {
            let mut form = RegistrationForm::default();
            for (label, field) in [
                ("Nome: ", &mut form.name),
                ("Email: ", &mut form.email),
                ("Senha: ", &mut form.password),
                ("Confirme a senha: ", &mut form.confirm_password),
            ] {
                *field = prompt(input, label).await?.unwrap_or_default();
            }
            app.auth.register(&form).await.map(|outcome| match outcome {
                RegisterOutcome::LoggedIn(u) => format!("Bem-vindo, {}!", u.display_name),
                RegisterOutcome::AccountCreated { message } => {
                    format!("{message} Agora você pode fazer login.")
                }
            })
        }
        _ => return Ok(true),
    };

    match result {
        Ok(message) => println!("{message}"),
        Err(err) => println!("⚠ {}", err.user_message()),
    }
    Ok(true)
}

async fn chat_command(app: &App, view: &mut View, line: &str) -> Flow {
    let (command, arg) = match line.split_once(' ') {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match command {
        "/fim" => return Flow::Quit,
        "/sair" => app.auth.logout(),
        "/chat" => *view = View::Chat,
        "/historico" => {
            *view = View::History;
            print_history(app);
        }
        "/admin" => {
            *view = View::Admin;
            if route(&app.auth.state(), *view) == Screen::Admin {
                print_dashboard(&app.admin).await;
            } else {
                println!("Acesso restrito a administradores.");
            }
        }
        "/ajuda" => println!("{CHAT_HELP}"),
        "/renovar" => match app.auth.refresh().await {
            Ok(_) => println!("Sessão renovada."),
            Err(err) => {
                println!("⚠ {}", err.user_message());
                app.auth.handle_reauth(&err);
            }
        },
        "/sugerir" => {
            app.chat.update_input(arg);
            let suggestions = app.chat.suggestions();
            if suggestions.is_empty() {
                for (i, s) in QUICK_SUGGESTIONS.iter().enumerate() {
                    println!("  [{i}] {s}");
                }
            }
            for (i, s) in suggestions.iter().enumerate() {
                println!("  [{i}] {s}");
            }
        }
        "/usar" => {
            let index = arg.parse().unwrap_or(usize::MAX);
            let chosen = app
                .chat
                .select_suggestion(index)
                .or_else(|| QUICK_SUGGESTIONS.get(index).copied());
            if let Some(text) = chosen {
                app.chat.update_input(text);
                app.chat.handle_key(KeyPress::enter()).await;
            }
        }
        "/util" | "/inutil" | "/reportar" => annotate(app, command, arg),
        "/upload" => upload(app, arg).await,
        _ if line.starts_with('/') => println!("Comando desconhecido. Use /ajuda."),
        _ => {
            // A trailing backslash stands in for Shift+Enter.
            let mut text = app.chat.input();
            match line.strip_suffix('\\') {
                Some(partial) => {
                    text.push_str(partial);
                    app.chat.update_input(&text);
                    app.chat.handle_key(KeyPress::shift_enter()).await;
                }
                None => {
                    text.push_str(line);
                    app.chat.update_input(&text);
                    println!("UFMA Assistant está analisando sua consulta...");
                    if let KeyOutcome::Submitted(outcome) = app.chat.handle_key(KeyPress::enter()).await {
                        info!(?outcome, "question resolved");
                    }
                }
            }
        }
    }
    Flow::Continue
}

fn annotate(app: &App, command: &str, arg: &str) {
    let answers: Vec<_> = app
        .chat
        .messages()
        .into_iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .collect();
    let Some(message) = arg
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| answers.get(i))
    else {
        println!("Resposta não encontrada.");
        return;
    };

    let done = match command {
        "/util" => app.chat.set_feedback(message.id, Feedback::Positive),
        "/inutil" => app.chat.set_feedback(message.id, Feedback::Negative),
        _ => app.chat.report_error(message.id),
    };
    if done {
        println!("Obrigado pelo retorno.");
    }
}

async fn upload(app: &App, arg: &str) {
    let result = match AdminService::read_upload(Path::new(arg)).await {
        Ok(file) => app.admin.upload(file).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(outcome) => {
            println!("✅ {}", outcome.receipt.message);
            if let Some(documents) = outcome.documents {
                println!("{} documento(s) no acervo.", documents.len());
            }
        }
        Err(err) => {
            println!("❌ {}", err.user_message());
            app.auth.handle_reauth(&err);
        }
    }
}

fn print_new_messages(app: &App, shown: usize) -> usize {
    let messages = app.chat.messages();
    let mut answer_number = messages
        .iter()
        .take(shown)
        .filter(|m| m.role == MessageRole::Assistant)
        .count();

    for message in messages.iter().skip(shown) {
        match message.role {
            MessageRole::User => println!("\nVocê: {}", message.content),
            MessageRole::Assistant => {
                answer_number += 1;
                println!("\n[{answer_number}] UFMA Assistant: {}", message.content);
                if let Some(source) = &message.source_label {
                    println!("    Fonte: {source} · {}", message.created_at.format("%H:%M:%S"));
                }
            }
        }
    }
    if app.chat.reauth_suggested() {
        println!("(Sua sessão expirou; respostas vieram do modo público. Use /sair e entre novamente.)");
    }
    messages.len()
}

fn print_history(app: &App) {
    let history = app.chat.history();
    if history.is_empty() {
        println!("Nenhuma consulta realizada.");
    }
    for entry in history {
        println!("\n{} — Pergunta: {}", entry.timestamp.format("%d/%m/%Y %H:%M"), entry.question);
        println!("Resposta: {}\nFonte: {}", entry.answer, entry.source_label);
    }
}

async fn print_dashboard(admin: &AdminService) {
    let dashboard = admin.load_dashboard().await;
    match dashboard.documents {
        Ok(docs) => {
            println!("Documentos ({}):", docs.len());
            for doc in docs {
                println!(
                    "  {} · {} chunks · {}",
                    doc.title(),
                    doc.chunks,
                    doc.uploaded_by.as_deref().unwrap_or("Sistema")
                );
            }
        }
        Err(err) => println!("⚠ {}", err.user_message()),
    }
    match dashboard.users {
        Ok(users) => println!("Usuários: {}", users.len()),
        Err(err) => println!("⚠ {}", err.user_message()),
    }
    match dashboard.stats {
        Ok(stats) => {
            for (key, value) in stats {
                println!("  {key}: {value}");
            }
        }
        Err(err) => println!("⚠ {}", err.user_message()),
    }
}
