use serde::{Deserialize, Serialize};

use crate::domain::Article;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlesResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub article: Article,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
