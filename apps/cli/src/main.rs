use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    Endpoints, HttpArticlesApi, Route, SessionController, SessionError, SessionPhase,
};
use shared::domain::{ArticleDraft, ArticleId, Credentials, Topic};
use storage::{ScopedTokenStore, Storage, TOKEN_KEY};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod shell;
mod view;

#[derive(Parser, Debug)]
#[command(name = "articles", about = "Sign in to an articles backend and manage articles")]
struct Cli {
    /// Config file (defaults to ./articles.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Token database path or sqlite url
    #[arg(long, global = true)]
    token_db: Option<String>,
    /// Token store scope (defaults to the base url)
    #[arg(long, global = true)]
    scope: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ARTICLES_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    List,
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        topic: Topic,
    },
    /// Edit an article; omitted fields keep their current value
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        topic: Option<Topic>,
    },
    Delete {
        id: i64,
    },
    Status,
    /// Interactive session
    Shell,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(token_db) = cli.token_db {
        settings.token_database_url = config::normalize_database_url(&token_db);
    }
    if let Some(scope) = cli.scope {
        settings.token_scope = Some(scope);
    }

    let endpoints = Endpoints::with_paths(
        &settings.base_url,
        &settings.login_path,
        &settings.articles_path,
    )
    .with_context(|| format!("invalid base url '{}'", settings.base_url))?;
    let storage = Storage::new(&settings.token_database_url).await?;
    let tokens = storage.scoped(settings.scope());
    let controller = SessionController::new(
        Arc::new(HttpArticlesApi::new(endpoints)),
        Arc::new(tokens.clone()),
    );
    let route = controller.restore().await;
    info!(
        base_url = %settings.base_url,
        scope = %tokens.scope(),
        route = route.path(),
        "client ready"
    );

    let _spinner = (!matches!(cli.command, Command::Shell))
        .then(|| shell::spawn_spinner(controller.subscribe_events()));
    let outcome = run_command(cli.command, &controller, &tokens).await?;
    let status = controller.status().await;
    if let Some(banner) = view::message_banner(&status) {
        println!("{banner}");
    }

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            if err.requires_reauth() {
                eprintln!("{}", view::route_banner(Route::Login));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_command(
    command: Command,
    controller: &Arc<SessionController>,
    tokens: &ScopedTokenStore,
) -> Result<Result<(), SessionError>> {
    let outcome = match command {
        Command::Login { username, password } => {
            let credentials = Credentials::new(username, password);
            if !credentials.is_submittable() {
                anyhow::bail!(
                    "username needs at least 3 characters and password at least 8"
                );
            }
            controller.login(&credentials).await
        }
        Command::Logout => {
            controller.logout().await;
            Ok(())
        }
        Command::List => match controller.list_articles().await {
            Ok(()) => {
                println!("{}", view::articles_list(&controller.articles().await, None));
                Ok(())
            }
            Err(err) => Err(err),
        },
        Command::Create { title, text, topic } => {
            let draft = ArticleDraft::new(title, text, topic);
            if !draft.is_submittable() {
                anyhow::bail!("title and text must not be blank");
            }
            controller.create_article(&draft).await.map(|article| {
                println!("{}", view::article_line(&article, None));
            })
        }
        Command::Update {
            id,
            title,
            text,
            topic,
        } => {
            let article_id = ArticleId(id);
            if let Err(err) = controller.list_articles().await {
                return Ok(Err(err));
            }
            controller.select_article(Some(article_id)).await;
            let Some(current) = controller.current_article().await else {
                anyhow::bail!("article #{article_id} not found");
            };
            let mut draft = current.draft();
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(text) = text {
                draft.text = text;
            }
            if let Some(topic) = topic {
                draft.topic = topic;
            }
            if !draft.is_submittable() {
                anyhow::bail!("title and text must not be blank");
            }
            controller.submit_article(&draft).await.map(|article| {
                println!("{}", view::article_line(&article, None));
            })
        }
        Command::Delete { id } => controller.delete_article(ArticleId(id)).await,
        Command::Status => {
            let phase = controller.session_phase().await;
            println!("scope: {}", tokens.scope());
            match phase {
                SessionPhase::LoggedIn => {
                    let since = tokens
                        .load_entry(TOKEN_KEY)
                        .await?
                        .map(|entry| entry.updated_at.to_rfc3339())
                        .unwrap_or_default();
                    println!("session: logged in (token stored {since})");
                }
                SessionPhase::LoggedOut => println!("session: logged out"),
            }
            Ok(())
        }
        Command::Shell => {
            shell::run(controller.clone()).await?;
            Ok(())
        }
    };
    Ok(outcome)
}
