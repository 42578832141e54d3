//! Interactive front end: reads intents from stdin, renders controller state.

use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::Result;
use client_core::{ControllerEvent, Route, SessionController, SessionError};
use shared::domain::{ArticleDraft, ArticleId, Credentials, Topic};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::debug;

use crate::view;

const HELP: &str = "\
commands:
  login <username> <password>   sign in
  logout                        sign out
  list                          fetch articles
  new                           write a new article
  edit <id>                     edit an article
  cancel                        leave edit mode
  delete <id>                   delete an article
  quit                          leave the shell";

type InputLines = Lines<BufReader<Stdin>>;

/// Prints the spinner text to stderr whenever an operation starts.
pub fn spawn_spinner(mut events: broadcast::Receiver<ControllerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::StatusChanged(status)) => {
                    if let Some(text) = view::spinner(status.loading) {
                        eprintln!("{text}");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "spinner fell behind controller events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn run(controller: Arc<SessionController>) -> Result<()> {
    let _spinner = spawn_spinner(controller.subscribe_events());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let route = controller.route().await;
    println!("{}", view::route_banner(route));
    if route == Route::Articles {
        let outcome = controller.list_articles().await;
        render(&controller, outcome, Route::Articles).await;
    }

    loop {
        prompt("articles> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let route_before = controller.route().await;

        let outcome = match command {
            "quit" | "exit" => break,
            "help" => {
                println!("{HELP}");
                continue;
            }
            "login" => {
                let mut parts = rest.split_whitespace();
                let (Some(username), Some(password)) = (parts.next(), parts.next()) else {
                    println!("usage: login <username> <password>");
                    continue;
                };
                let credentials = Credentials::new(username, password);
                if !credentials.is_submittable() {
                    println!("username needs at least 3 characters and password at least 8");
                    continue;
                }
                controller.login(&credentials).await
            }
            "logout" => {
                controller.logout().await;
                Ok(())
            }
            "list" => controller.list_articles().await,
            "new" => {
                controller.select_article(None).await;
                match submit_form(&controller, &mut lines).await? {
                    Some(outcome) => outcome,
                    None => continue,
                }
            }
            "edit" => {
                let Some(article_id) = parse_id(rest) else {
                    println!("usage: edit <id>");
                    continue;
                };
                let known = controller
                    .articles()
                    .await
                    .iter()
                    .any(|article| article.article_id == article_id);
                if !known {
                    println!("article #{article_id} is not in the list; try `list`");
                    continue;
                }
                controller.select_article(Some(article_id)).await;
                match submit_form(&controller, &mut lines).await? {
                    Some(outcome) => outcome,
                    None => continue,
                }
            }
            "cancel" => {
                controller.select_article(None).await;
                Ok(())
            }
            "delete" => {
                let Some(article_id) = parse_id(rest) else {
                    println!("usage: delete <id>");
                    continue;
                };
                if controller.status().await.selected_article_id.is_some() {
                    println!("finish or `cancel` the current edit first");
                    continue;
                }
                controller.delete_article(article_id).await
            }
            other => {
                println!("unknown command '{other}'; type `help`");
                continue;
            }
        };

        render(&controller, outcome, route_before).await;
    }

    Ok(())
}

/// Walks the article form. `None` means the form was abandoned or invalid.
async fn submit_form(
    controller: &SessionController,
    lines: &mut InputLines,
) -> Result<Option<Result<(), SessionError>>> {
    let current = controller.current_article().await;
    println!("{}", view::form_heading(current.as_ref()));

    let defaults = current.as_ref().map(|article| article.draft());
    let Some(title) = read_field(lines, "title", defaults.as_ref().map(|d| d.title.as_str())).await?
    else {
        return Ok(None);
    };
    let Some(text) = read_field(lines, "text", defaults.as_ref().map(|d| d.text.as_str())).await?
    else {
        return Ok(None);
    };
    let default_topic = defaults.as_ref().map(|d| d.topic.as_str());
    let Some(raw_topic) = read_field(lines, "topic (JavaScript/React/Node)", default_topic).await?
    else {
        return Ok(None);
    };
    let topic = match raw_topic.parse::<Topic>() {
        Ok(topic) => topic,
        Err(err) => {
            println!("{err}");
            return Ok(None);
        }
    };

    let draft = ArticleDraft::new(title, text, topic);
    if !draft.is_submittable() {
        println!("title and text must not be blank");
        return Ok(None);
    }
    Ok(Some(controller.submit_article(&draft).await.map(|_| ())))
}

async fn read_field(
    lines: &mut InputLines,
    label: &str,
    default: Option<&str>,
) -> Result<Option<String>> {
    match default {
        Some(default) => prompt(&format!("  {label} [{default}]: "))?,
        None => prompt(&format!("  {label}: "))?,
    }
    let Some(line) = lines.next_line().await? else {
        return Ok(None);
    };
    let line = line.trim();
    if line.is_empty() {
        return Ok(Some(default.unwrap_or_default().to_string()));
    }
    Ok(Some(line.to_string()))
}

async fn render(
    controller: &SessionController,
    outcome: Result<(), SessionError>,
    route_before: Route,
) {
    let status = controller.status().await;
    if let Some(banner) = view::message_banner(&status) {
        println!("{banner}");
    } else if let Err(err) = &outcome {
        println!("{err}");
    }

    let route = controller.route().await;
    if route != route_before {
        println!("{}", view::route_banner(route));
    }

    if route == Route::Articles && outcome.is_ok() {
        if route_before == Route::Login {
            // entering the article screen always fetches
            let outcome = controller.list_articles().await;
            if let Err(err) = outcome {
                println!("{err}");
                return;
            }
            if let Some(banner) = view::message_banner(&controller.status().await) {
                println!("{banner}");
            }
        }
        let status = controller.status().await;
        println!(
            "{}",
            view::articles_list(&controller.articles().await, status.selected_article_id)
        );
    }
}

fn parse_id(raw: &str) -> Option<ArticleId> {
    raw.trim().trim_start_matches('#').parse().ok().map(ArticleId)
}

fn prompt(text: &str) -> io::Result<()> {
    print!("{text}");
    io::stdout().flush()
}
