use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use client_core::transport::{DEFAULT_ARTICLES_PATH, DEFAULT_LOGIN_PATH};

pub const DEFAULT_CONFIG_FILE: &str = "articles.toml";
const DATA_DIR_NAME: &str = "articles-client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub login_path: String,
    pub articles_path: String,
    pub token_database_url: String,
    pub token_scope: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".into(),
            login_path: DEFAULT_LOGIN_PATH.into(),
            articles_path: DEFAULT_ARTICLES_PATH.into(),
            token_database_url: default_token_database_url(),
            token_scope: None,
        }
    }
}

impl ClientSettings {
    /// Token store scope; one session per backend unless configured otherwise.
    pub fn scope(&self) -> &str {
        self.token_scope.as_deref().unwrap_or(&self.base_url)
    }
}

/// Defaults, then the config file, then the environment.
///
/// An explicitly named config file must exist; the default `articles.toml`
/// in the working directory is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let file_cfg = match config_path {
        Some(path) => Some(read_config_file(path)?),
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Some(parse_config(&raw).with_context(|| {
                format!("failed to parse config file '{DEFAULT_CONFIG_FILE}'")
            })?),
            Err(_) => None,
        },
    };
    if let Some(file_cfg) = file_cfg {
        apply_file_overrides(&mut settings, &file_cfg);
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.token_database_url = normalize_database_url(&settings.token_database_url);
    Ok(settings)
}

fn read_config_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn parse_config(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    Ok(toml::from_str::<HashMap<String, String>>(raw)?)
}

pub fn apply_file_overrides(settings: &mut ClientSettings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("base_url") {
        settings.base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("login_path") {
        settings.login_path = v.clone();
    }
    if let Some(v) = file_cfg.get("articles_path") {
        settings.articles_path = v.clone();
    }
    if let Some(v) = file_cfg.get("token_database_url") {
        settings.token_database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("token_scope") {
        settings.token_scope = Some(v.clone());
    }
}

/// `ARTICLES_*` variables, with `APP__*` taking precedence.
pub fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let var = |plain: &str, prefixed: &str| lookup(prefixed).or_else(|| lookup(plain));

    if let Some(v) = var("ARTICLES_BASE_URL", "APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = var("ARTICLES_LOGIN_PATH", "APP__LOGIN_PATH") {
        settings.login_path = v;
    }
    if let Some(v) = var("ARTICLES_ARTICLES_PATH", "APP__ARTICLES_PATH") {
        settings.articles_path = v;
    }
    if let Some(v) = var("ARTICLES_TOKEN_DB", "APP__TOKEN_DATABASE_URL") {
        settings.token_database_url = v;
    }
    if let Some(v) = var("ARTICLES_TOKEN_SCOPE", "APP__TOKEN_SCOPE") {
        settings.token_scope = Some(v);
    }
}

fn default_token_database_url() -> String {
    let path = dirs::data_local_dir()
        .map(|dir| dir.join(DATA_DIR_NAME).join("session.db"))
        .unwrap_or_else(|| PathBuf::from("./data/session.db"));
    normalize_database_url(&path.to_string_lossy())
}

/// Turns a plain file path into a sqlite url; the store creates the file.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return default_token_database_url();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
