use std::fmt;

use shared::domain::{Article, ArticleId};

/// Screen the view layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Login,
    Articles,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::Articles => "/articles",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    LoggedIn,
}

/// Transient banner/spinner state rendered by the view layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiStatus {
    pub message: String,
    pub loading: bool,
    pub selected_article_id: Option<ArticleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    StatusChanged(UiStatus),
    ArticlesChanged(Vec<Article>),
    SelectionChanged(Option<ArticleId>),
    Navigated(Route),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    ListArticles,
    CreateArticle,
    UpdateArticle,
    DeleteArticle,
}

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful!";
pub const LOGOUT_MESSAGE: &str = "Goodbye!";

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::ListArticles => "list_articles",
            Operation::CreateArticle => "create_article",
            Operation::UpdateArticle => "update_article",
            Operation::DeleteArticle => "delete_article",
        }
    }

    /// Banner text shown when the server gives no usable message.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::Login => "Login failed. Please try again.",
            Operation::ListArticles => "Error fetching",
            Operation::CreateArticle => "Error posting...",
            Operation::UpdateArticle => "Error Updating....",
            Operation::DeleteArticle => "Error Deleting....",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
