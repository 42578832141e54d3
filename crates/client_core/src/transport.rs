//! HTTP transport for the articles backend.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ArticleDraft, ArticleId, Credentials},
    error::{ApiError, ApiException},
    protocol::{ArticleResponse, ArticlesResponse, LoginResponse, MessageResponse},
};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_LOGIN_PATH: &str = "/api/login";
pub const DEFAULT_ARTICLES_PATH: &str = "/api/articles";

#[async_trait]
pub trait ArticlesApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, TransportError>;
    async fn list_articles(&self, token: &str) -> Result<ArticlesResponse, TransportError>;
    async fn create_article(
        &self,
        token: &str,
        draft: &ArticleDraft,
    ) -> Result<ArticleResponse, TransportError>;
    async fn update_article(
        &self,
        token: &str,
        article_id: ArticleId,
        draft: &ArticleDraft,
    ) -> Result<ArticleResponse, TransportError>;
    async fn delete_article(
        &self,
        token: &str,
        article_id: ArticleId,
    ) -> Result<MessageResponse, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: Url,
    login_path: String,
    articles_path: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Self::with_paths(base_url, DEFAULT_LOGIN_PATH, DEFAULT_ARTICLES_PATH)
    }

    pub fn with_paths(
        base_url: &str,
        login_path: &str,
        articles_path: &str,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url.trim())?,
            login_path: normalize_path(login_path),
            articles_path: normalize_path(articles_path),
        })
    }

    pub fn login_url(&self) -> String {
        self.join(&self.login_path)
    }

    pub fn articles_url(&self) -> String {
        self.join(&self.articles_path)
    }

    pub fn article_url(&self, article_id: ArticleId) -> String {
        format!("{}/{}", self.articles_url(), article_id.0)
    }

    // Plain concatenation keeps any path prefix on the base url, which Url::join would drop.
    fn join(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub struct HttpArticlesApi {
    http: Client,
    endpoints: Endpoints,
}

impl HttpArticlesApi {
    pub fn new(endpoints: Endpoints) -> Self {
        Self::with_client(Client::new(), endpoints)
    }

    pub fn with_client(http: Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(ApiException::new(status.as_u16(), ApiError::from_body(&body)).into());
        }

        serde_json::from_slice(&body).map_err(|err| TransportError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ArticlesApi for HttpArticlesApi {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, TransportError> {
        self.send(self.http.post(self.endpoints.login_url()).json(credentials))
            .await
    }

    async fn list_articles(&self, token: &str) -> Result<ArticlesResponse, TransportError> {
        self.send(
            self.http
                .get(self.endpoints.articles_url())
                .header(AUTHORIZATION, token),
        )
        .await
    }

    async fn create_article(
        &self,
        token: &str,
        draft: &ArticleDraft,
    ) -> Result<ArticleResponse, TransportError> {
        self.send(
            self.http
                .post(self.endpoints.articles_url())
                .header(AUTHORIZATION, token)
                .json(draft),
        )
        .await
    }

    async fn update_article(
        &self,
        token: &str,
        article_id: ArticleId,
        draft: &ArticleDraft,
    ) -> Result<ArticleResponse, TransportError> {
        self.send(
            self.http
                .put(self.endpoints.article_url(article_id))
                .header(AUTHORIZATION, token)
                .json(draft),
        )
        .await
    }

    async fn delete_article(
        &self,
        token: &str,
        article_id: ArticleId,
    ) -> Result<MessageResponse, TransportError> {
        self.send(
            self.http
                .delete(self.endpoints.article_url(article_id))
                .header(AUTHORIZATION, token),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
