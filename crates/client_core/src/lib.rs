use std::{future::Future, sync::Arc};

use shared::{
    domain::{Article, ArticleDraft, ArticleId, Credentials},
    protocol::{ArticleResponse, ArticlesResponse, MessageResponse},
};
use storage::{TokenStore, TOKEN_KEY};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod error;
pub mod transport;
pub mod types;

pub use error::{SessionError, TransportError};
pub use transport::{ArticlesApi, Endpoints, HttpArticlesApi};
pub use types::{ControllerEvent, Operation, Route, SessionPhase, UiStatus};

use types::{LOGIN_SUCCESS_MESSAGE, LOGOUT_MESSAGE};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Owns the client-side session: status banner, spinner, cached article
/// collection, selection and route. The view layer calls into it and renders
/// what it publishes through [`SessionController::subscribe_events`].
pub struct SessionController {
    api: Arc<dyn ArticlesApi>,
    tokens: Arc<dyn TokenStore>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

#[derive(Default)]
struct ControllerState {
    status: UiStatus,
    articles: Vec<Article>,
    route: Route,
    pending: Vec<ControllerEvent>,
}

impl ControllerState {
    fn navigate(&mut self, route: Route) {
        if self.route != route {
            self.route = route;
            self.pending.push(ControllerEvent::Navigated(route));
        }
    }

    fn select(&mut self, article_id: Option<ArticleId>) {
        if self.status.selected_article_id != article_id {
            self.status.selected_article_id = article_id;
            self.pending.push(ControllerEvent::SelectionChanged(article_id));
        }
    }

    fn articles_changed(&mut self) {
        self.pending
            .push(ControllerEvent::ArticlesChanged(self.articles.clone()));
    }

    fn replace_articles(&mut self, articles: Vec<Article>) {
        self.articles = articles;
        if let Some(selected) = self.status.selected_article_id {
            if !self.articles.iter().any(|a| a.article_id == selected) {
                self.select(None);
            }
        }
        self.articles_changed();
    }

    fn upsert_article(&mut self, article: Article) {
        match self
            .articles
            .iter_mut()
            .find(|existing| existing.article_id == article.article_id)
        {
            Some(existing) => *existing = article,
            None => self.articles.push(article),
        }
        self.articles_changed();
    }

    fn replace_article(&mut self, article: Article) {
        match self
            .articles
            .iter_mut()
            .find(|existing| existing.article_id == article.article_id)
        {
            Some(existing) => {
                *existing = article;
                self.articles_changed();
            }
            None => debug!(
                article_id = article.article_id.0,
                "updated article is not in the cached collection"
            ),
        }
    }

    fn remove_article(&mut self, article_id: ArticleId) {
        let before = self.articles.len();
        self.articles.retain(|a| a.article_id != article_id);
        if self.status.selected_article_id == Some(article_id) {
            self.select(None);
        }
        if self.articles.len() != before {
            self.articles_changed();
        }
    }

    fn set_message(&mut self, message: Option<String>, fallback: &str) {
        self.status.message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
    }
}

impl SessionController {
    pub fn new(api: Arc<dyn ArticlesApi>, tokens: Arc<dyn TokenStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            tokens,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    /// Picks the starting route from the token store. A stored token is
    /// trusted as-is; the first authenticated call that gets a 401 logs out.
    pub async fn restore(&self) -> Route {
        let route = match self.tokens.get(TOKEN_KEY).await {
            Ok(Some(_)) => Route::Articles,
            Ok(None) => Route::Login,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "failed to read stored session token");
                Route::Login
            }
        };
        self.apply(|state| state.navigate(route)).await;
        info!(route = route.path(), "session restored");
        route
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> UiStatus {
        self.inner.lock().await.status.clone()
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.inner.lock().await.articles.clone()
    }

    pub async fn route(&self) -> Route {
        self.inner.lock().await.route
    }

    pub async fn session_phase(&self) -> SessionPhase {
        match self.tokens.get(TOKEN_KEY).await {
            Ok(Some(_)) => SessionPhase::LoggedIn,
            Ok(None) => SessionPhase::LoggedOut,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "failed to read stored session token");
                SessionPhase::LoggedOut
            }
        }
    }

    /// The article currently being edited, if it is still in the collection.
    pub async fn current_article(&self) -> Option<Article> {
        let state = self.inner.lock().await;
        let selected = state.status.selected_article_id?;
        state
            .articles
            .iter()
            .find(|article| article.article_id == selected)
            .cloned()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let operation = Operation::Login;
        self.begin(operation).await?;

        let response = match self.api.login(credentials).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    %operation,
                    username = %credentials.username,
                    status = ?error.status(),
                    %error,
                    "login rejected"
                );
                let message = error.server_message().map(str::to_string);
                self.finish(|state| state.set_message(message, operation.failure_message()))
                    .await;
                return Err(classify(operation, error));
            }
        };

        if let Err(error) = self.tokens.set(TOKEN_KEY, &response.token).await {
            warn!(%operation, error = %format!("{error:#}"), "failed to persist session token");
            self.finish(|state| state.set_message(None, operation.failure_message()))
                .await;
            return Err(SessionError::Storage { operation, error });
        }

        info!(username = %credentials.username, "logged in");
        self.finish(|state| {
            state.set_message(response.message, LOGIN_SUCCESS_MESSAGE);
            state.navigate(Route::Articles);
        })
        .await;
        Ok(())
    }

    /// Drops the session. Safe to call with no session; never fails.
    pub async fn logout(&self) {
        if let Err(error) = self.tokens.remove(TOKEN_KEY).await {
            warn!(error = %format!("{error:#}"), "failed to remove stored session token");
        }
        info!("logged out");
        self.apply(|state| {
            state.status.message = LOGOUT_MESSAGE.to_string();
            state.select(None);
            state.navigate(Route::Login);
        })
        .await;
    }

    pub async fn list_articles(&self) -> Result<(), SessionError> {
        let api = &self.api;
        self.run_authenticated(
            Operation::ListArticles,
            |token| async move { api.list_articles(&token).await },
            |state, response: ArticlesResponse| {
                info!(count = response.articles.len(), "fetched articles");
                state.replace_articles(response.articles);
                state.set_message(response.message, "");
            },
        )
        .await
    }

    pub async fn create_article(&self, draft: &ArticleDraft) -> Result<Article, SessionError> {
        let api = &self.api;
        self.run_authenticated(
            Operation::CreateArticle,
            |token| async move { api.create_article(&token, draft).await },
            |state, response: ArticleResponse| {
                let article = response.article;
                info!(article_id = article.article_id.0, "created article");
                state.upsert_article(article.clone());
                state.set_message(response.message, "");
                article
            },
        )
        .await
    }

    pub async fn update_article(
        &self,
        article_id: ArticleId,
        draft: &ArticleDraft,
    ) -> Result<Article, SessionError> {
        let api = &self.api;
        self.run_authenticated(
            Operation::UpdateArticle,
            |token| async move { api.update_article(&token, article_id, draft).await },
            |state, response: ArticleResponse| {
                let article = response.article;
                info!(article_id = article_id.0, "updated article");
                state.replace_article(article.clone());
                if state.status.selected_article_id == Some(article_id) {
                    state.select(None);
                }
                state.set_message(response.message, "");
                article
            },
        )
        .await
    }

    pub async fn delete_article(&self, article_id: ArticleId) -> Result<(), SessionError> {
        let api = &self.api;
        self.run_authenticated(
            Operation::DeleteArticle,
            |token| async move { api.delete_article(&token, article_id).await },
            |state, response: MessageResponse| {
                info!(article_id = article_id.0, "deleted article");
                state.remove_article(article_id);
                state.set_message(response.message, "");
            },
        )
        .await
    }

    /// Records which article the form edits; `None` switches to "new article".
    pub async fn select_article(&self, article_id: Option<ArticleId>) {
        debug!(article_id = ?article_id.map(|id| id.0), "current article changed");
        self.apply(|state| state.select(article_id)).await;
    }

    /// Form submit: updates the selected article, or creates one when nothing
    /// is selected.
    pub async fn submit_article(&self, draft: &ArticleDraft) -> Result<Article, SessionError> {
        let selected = self.inner.lock().await.status.selected_article_id;
        match selected {
            Some(article_id) => self.update_article(article_id, draft).await,
            None => self.create_article(draft).await,
        }
    }

    async fn run_authenticated<T, R, F, Fut>(
        &self,
        operation: Operation,
        call: F,
        on_success: impl FnOnce(&mut ControllerState, T) -> R,
    ) -> Result<R, SessionError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.begin(operation).await?;

        let token = match self.tokens.get(TOKEN_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!(%operation, "no stored session token; redirecting to login");
                self.finish(|state| state.navigate(Route::Login)).await;
                return Err(SessionError::NotAuthenticated(operation));
            }
            Err(error) => {
                warn!(%operation, error = %format!("{error:#}"), "failed to read stored session token");
                self.finish(|state| state.set_message(None, operation.failure_message()))
                    .await;
                return Err(SessionError::Storage { operation, error });
            }
        };

        match call(token).await {
            Ok(response) => Ok(self.finish(|state| on_success(state, response)).await),
            Err(error) if error.is_unauthorized() => {
                warn!(%operation, "session token refused by server; logging out");
                if let Err(store_error) = self.tokens.remove(TOKEN_KEY).await {
                    warn!(error = %format!("{store_error:#}"), "failed to remove refused session token");
                }
                self.finish(|state| {
                    state.select(None);
                    state.navigate(Route::Login);
                })
                .await;
                Err(SessionError::SessionExpired(operation))
            }
            Err(error) => {
                warn!(%operation, status = ?error.status(), %error, "request failed");
                let message = error.server_message().map(str::to_string);
                self.finish(|state| state.set_message(message, operation.failure_message()))
                    .await;
                Err(classify(operation, error))
            }
        }
    }

    /// Starts an operation: clears the banner and raises the spinner, unless
    /// another operation is already in flight.
    async fn begin(&self, operation: Operation) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        if state.status.loading {
            warn!(%operation, "operation already in progress; ignoring");
            return Err(SessionError::Busy(operation));
        }
        state.status.message.clear();
        state.status.loading = true;
        debug!(%operation, "operation started");
        let _ = self
            .events
            .send(ControllerEvent::StatusChanged(state.status.clone()));
        Ok(())
    }

    async fn finish<R>(&self, apply: impl FnOnce(&mut ControllerState) -> R) -> R {
        self.apply(|state| {
            state.status.loading = false;
            apply(state)
        })
        .await
    }

    /// Mutates state and publishes the resulting events under the same lock,
    /// so subscribers see changes in the order they were applied.
    async fn apply<R>(&self, apply: impl FnOnce(&mut ControllerState) -> R) -> R {
        let mut state = self.inner.lock().await;
        let before = state.status.clone();
        let result = apply(&mut *state);
        let mut events = std::mem::take(&mut state.pending);
        if state.status != before {
            events.push(ControllerEvent::StatusChanged(state.status.clone()));
        }
        for event in events {
            let _ = self.events.send(event);
        }
        result
    }
}

fn classify(operation: Operation, error: TransportError) -> SessionError {
    match error {
        TransportError::Api(exception) => SessionError::Rejected {
            operation,
            status: exception.status,
            message: exception
                .message
                .unwrap_or_else(|| operation.failure_message().to_string()),
        },
        error => SessionError::Transport { operation, error },
    }
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
