use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use shared::domain::{Article, ArticleDraft, ArticleId, Credentials, Topic};
use tokio::{net::TcpListener, sync::Mutex};

pub const VALID_USERNAME: &str = "testuser";
pub const VALID_PASSWORD: &str = "testpassword";
pub const VALID_TOKEN: &str = "abc";

#[derive(Default)]
struct BackendState {
    articles: Vec<Article>,
    next_id: i64,
    token_revoked: bool,
    fail_next: Option<StatusCode>,
    garbled: bool,
    authorizations: Vec<Option<String>>,
    request_count: usize,
}

#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub async fn spawn() -> Result<Self> {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(BackendState {
            next_id: 1,
            ..BackendState::default()
        }));
        let app = Router::new()
            .route("/api/login", axum::routing::post(handle_login))
            .route("/api/articles", get(handle_list).post(handle_create))
            .route("/api/articles/:id", put(handle_update).delete(handle_delete))
            .with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            url: format!("http://{addr}"),
            state,
        })
    }

    pub async fn seed(&self, drafts: &[ArticleDraft]) -> Vec<Article> {
        let mut state = self.state.lock().await;
        for draft in drafts {
            let article = Article {
                article_id: ArticleId(state.next_id),
                title: draft.title.clone(),
                text: draft.text.clone(),
                topic: draft.topic,
            };
            state.next_id += 1;
            state.articles.push(article);
        }
        state.articles.clone()
    }

    pub async fn revoke_token(&self) {
        self.state.lock().await.token_revoked = true;
    }

    /// Makes the next request fail with `status` and a non-JSON body.
    pub async fn fail_next(&self, status: StatusCode) {
        self.state.lock().await.fail_next = Some(status);
    }

    /// Answers every later request with 200 and a body that is not JSON.
    pub async fn garble_responses(&self) {
        self.state.lock().await.garbled = true;
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.state.lock().await.articles.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.state.lock().await.request_count
    }

    pub async fn last_authorization(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .authorizations
            .last()
            .cloned()
            .flatten()
    }
}

pub fn sample_drafts() -> Vec<ArticleDraft> {
    vec![
        ArticleDraft::new("Test Title 1", "Test Text 1", Topic::React),
        ArticleDraft::new("Test Title 2", "Test Text 2", Topic::JavaScript),
        ArticleDraft::new("Test Title 3", "Test Text 3", Topic::Node),
    ]
}

type Shared = Arc<Mutex<BackendState>>;

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// Common request bookkeeping; returns an early response when the request
/// must be refused.
fn admit(state: &mut BackendState, headers: Option<&HeaderMap>) -> Option<Response> {
    state.request_count += 1;
    if let Some(status) = state.fail_next.take() {
        return Some((status, "upstream exploded").into_response());
    }
    if state.garbled {
        return Some((StatusCode::OK, "<html>maintenance</html>").into_response());
    }
    let headers = headers?;
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.authorizations.push(authorization.clone());
    if state.token_revoked || authorization.as_deref() != Some(VALID_TOKEN) {
        return Some(message(
            StatusCode::UNAUTHORIZED,
            "Ouch: jwt malformed or expired",
        ));
    }
    None
}

async fn handle_login(State(state): State<Shared>, Json(credentials): Json<Credentials>) -> Response {
    let mut state = state.lock().await;
    if let Some(response) = admit(&mut state, None) {
        return response;
    }
    if credentials.username != VALID_USERNAME || credentials.password != VALID_PASSWORD {
        return message(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    state.token_revoked = false;
    Json(json!({ "message": "Welcome", "token": VALID_TOKEN })).into_response()
}

async fn handle_list(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().await;
    if let Some(response) = admit(&mut state, Some(&headers)) {
        return response;
    }
    Json(json!({
        "message": format!("Here are your articles, {VALID_USERNAME}!"),
        "articles": state.articles,
    }))
    .into_response()
}

async fn handle_create(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(draft): Json<ArticleDraft>,
) -> Response {
    let mut state = state.lock().await;
    if let Some(response) = admit(&mut state, Some(&headers)) {
        return response;
    }
    if !draft.is_submittable() {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "title and text are required");
    }
    let article = Article {
        article_id: ArticleId(state.next_id),
        title: draft.title,
        text: draft.text,
        topic: draft.topic,
    };
    state.next_id += 1;
    state.articles.push(article.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Well done, {VALID_USERNAME}. Great article!"),
            "article": article,
        })),
    )
        .into_response()
}

async fn handle_update(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(draft): Json<ArticleDraft>,
) -> Response {
    let mut state = state.lock().await;
    if let Some(response) = admit(&mut state, Some(&headers)) {
        return response;
    }
    let Some(existing) = state
        .articles
        .iter_mut()
        .find(|article| article.article_id == ArticleId(id))
    else {
        return message(StatusCode::NOT_FOUND, "Article not found");
    };
    existing.title = draft.title;
    existing.text = draft.text;
    existing.topic = draft.topic;
    let article = existing.clone();
    Json(json!({
        "message": format!("Nice update, {VALID_USERNAME}!"),
        "article": article,
    }))
    .into_response()
}

async fn handle_delete(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().await;
    if let Some(response) = admit(&mut state, Some(&headers)) {
        return response;
    }
    let before = state.articles.len();
    state.articles.retain(|article| article.article_id != ArticleId(id));
    if state.articles.len() == before {
        return message(StatusCode::NOT_FOUND, "Article not found");
    }
    Json(json!({ "message": format!("Article {id} was deleted, {VALID_USERNAME}!") }))
        .into_response()
}
