//! Terminal rendering of controller state.

use std::fmt::Write as _;

use client_core::{Route, UiStatus};
use shared::domain::{Article, ArticleId};

pub const SPINNER_TEXT: &str = "Please wait...";
pub const EMPTY_ARTICLES_TEXT: &str = "No articles yet";

pub fn spinner(on: bool) -> Option<&'static str> {
    on.then_some(SPINNER_TEXT)
}

pub fn message_banner(status: &UiStatus) -> Option<String> {
    let message = status.message.trim();
    (!message.is_empty()).then(|| format!("> {message}"))
}

pub fn route_banner(route: Route) -> String {
    match route {
        Route::Login => "[login] sign in with `login <username> <password>`".to_string(),
        Route::Articles => "[articles]".to_string(),
    }
}

pub fn article_line(article: &Article, selected: Option<ArticleId>) -> String {
    let marker = if selected == Some(article.article_id) {
        "*"
    } else {
        " "
    };
    format!(
        "{marker} #{:<4} {:<10} {}",
        article.article_id, article.topic, article.title
    )
}

pub fn articles_list(articles: &[Article], selected: Option<ArticleId>) -> String {
    if articles.is_empty() {
        return EMPTY_ARTICLES_TEXT.to_string();
    }
    let mut out = String::new();
    for article in articles {
        let _ = writeln!(out, "{}", article_line(article, selected));
        let _ = writeln!(out, "        {}", article.text);
    }
    out.trim_end().to_string()
}

pub fn form_heading(current: Option<&Article>) -> String {
    match current {
        Some(article) => format!("Edit article #{}", article.article_id),
        None => "Create article".to_string(),
    }
}
