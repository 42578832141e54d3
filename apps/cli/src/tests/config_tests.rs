use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_point_at_local_backend() {
    let settings = ClientSettings::default();
    assert_eq!(settings.base_url, "http://localhost:9000");
    assert_eq!(settings.login_path, "/api/login");
    assert_eq!(settings.articles_path, "/api/articles");
    assert!(settings.token_database_url.starts_with("sqlite://"));
    assert_eq!(settings.scope(), "http://localhost:9000");
}

#[test]
fn file_values_override_defaults() {
    let file_cfg = parse_config(
        r#"
        base_url = "https://articles.example.test"
        token_scope = "work"
        "#,
    )
    .expect("parse");
    let mut settings = ClientSettings::default();
    apply_file_overrides(&mut settings, &file_cfg);

    assert_eq!(settings.base_url, "https://articles.example.test");
    assert_eq!(settings.scope(), "work");
    assert_eq!(settings.login_path, "/api/login");
}

#[test]
fn prefixed_env_wins_over_plain_env() {
    let mut settings = ClientSettings::default();
    apply_env_overrides(
        &mut settings,
        env_from(&[
            ("ARTICLES_BASE_URL", "http://plain:1"),
            ("APP__BASE_URL", "http://prefixed:2"),
            ("ARTICLES_ARTICLES_PATH", "/v2/articles"),
        ]),
    );
    assert_eq!(settings.base_url, "http://prefixed:2");
    assert_eq!(settings.articles_path, "/v2/articles");
    assert_eq!(settings.scope(), "http://prefixed:2");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/session.db"),
        "sqlite://./data/session.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\session.db"),
        "sqlite://C:/Users/alice/session.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[tokio::test]
async fn normalized_path_is_created_by_the_token_store() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("session.db");

    let database_url = normalize_database_url(db_path.to_string_lossy().as_ref());
    assert!(database_url.starts_with("sqlite://"));
    assert!(!temp_root.path().join("nested").exists());

    let storage = storage::Storage::new(&database_url).await.expect("open store");
    storage.health_check().await.expect("health");
    assert!(db_path.exists());
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let missing = temp_root.path().join("nope.toml");
    assert!(load_settings(Some(missing.as_path())).is_err());
}

#[test]
fn rejects_non_string_config_values() {
    assert!(parse_config("base_url = 42").is_err());
}
