use super::*;
use crate::mock_backend::{sample_drafts, MockBackend, VALID_PASSWORD, VALID_TOKEN, VALID_USERNAME};
use axum::{http::StatusCode, routing::get, Router};
use shared::{domain::Topic, error::ErrorCode};
use tokio::net::TcpListener;

fn api_for(url: &str) -> HttpArticlesApi {
    HttpArticlesApi::new(Endpoints::new(url).expect("endpoints"))
}

#[test]
fn builds_endpoint_urls_from_base_and_paths() {
    let endpoints = Endpoints::new("http://localhost:9000").expect("endpoints");
    assert_eq!(endpoints.login_url(), "http://localhost:9000/api/login");
    assert_eq!(endpoints.articles_url(), "http://localhost:9000/api/articles");
    assert_eq!(
        endpoints.article_url(ArticleId(7)),
        "http://localhost:9000/api/articles/7"
    );
}

#[test]
fn keeps_base_path_prefix_and_normalizes_custom_paths() {
    let endpoints =
        Endpoints::with_paths("https://example.test/blog/", "auth/login/", "/v2/articles")
            .expect("endpoints");
    assert_eq!(endpoints.login_url(), "https://example.test/blog/auth/login");
    assert_eq!(
        endpoints.article_url(ArticleId(3)),
        "https://example.test/blog/v2/articles/3"
    );
}

#[test]
fn rejects_invalid_base_url() {
    assert!(Endpoints::new("not a url").is_err());
}

#[tokio::test]
async fn login_returns_token_and_message() {
    let backend = MockBackend::spawn().await.expect("spawn backend");
    let response = api_for(&backend.url)
        .login(&Credentials::new(VALID_USERNAME, VALID_PASSWORD))
        .await
        .expect("login");
    assert_eq!(response.token, VALID_TOKEN);
    assert_eq!(response.message.as_deref(), Some("Welcome"));
}

#[tokio::test]
async fn crud_round_trip_against_backend() {
    let backend = MockBackend::spawn().await.expect("spawn backend");
    backend.seed(&sample_drafts()).await;
    let api = api_for(&backend.url);

    let listed = api.list_articles(VALID_TOKEN).await.expect("list");
    assert_eq!(listed.articles.len(), 3);

    let draft = ArticleDraft::new("Another", "Body", Topic::Node);
    let created = api
        .create_article(VALID_TOKEN, &draft)
        .await
        .expect("create")
        .article;
    assert!(draft.matches(&created));

    let edit = ArticleDraft::new("Another (edited)", "Body", Topic::React);
    let updated = api
        .update_article(VALID_TOKEN, created.article_id, &edit)
        .await
        .expect("update")
        .article;
    assert!(edit.matches(&updated));

    api.delete_article(VALID_TOKEN, created.article_id)
        .await
        .expect("delete");
    assert!(!backend
        .articles()
        .await
        .iter()
        .any(|article| article.article_id == created.article_id));
}

#[tokio::test]
async fn unauthorized_status_is_classified() {
    let backend = MockBackend::spawn().await.expect("spawn backend");
    let err = api_for(&backend.url)
        .list_articles("wrong-token")
        .await
        .expect_err("must fail");

    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.server_message(), Some("Ouch: jwt malformed or expired"));
    match err {
        TransportError::Api(exception) => assert_eq!(exception.code, ErrorCode::Unauthorized),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_json_error_body_yields_no_server_message() {
    let backend = MockBackend::spawn().await.expect("spawn backend");
    backend.fail_next(StatusCode::BAD_GATEWAY).await;
    let err = api_for(&backend.url)
        .list_articles(VALID_TOKEN)
        .await
        .expect_err("must fail");

    assert!(!err.is_unauthorized());
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.server_message(), None);
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/api/articles", get(|| async { "definitely not json" }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let err = api_for(&format!("http://{addr}"))
        .list_articles(VALID_TOKEN)
        .await
        .expect_err("must fail");
    assert!(matches!(err, TransportError::Decode(_)));
    assert_eq!(err.status(), None);
}
