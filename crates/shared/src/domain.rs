use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype!(ArticleId);

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    JavaScript,
    React,
    Node,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::JavaScript, Topic::React, Topic::Node];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::JavaScript => "JavaScript",
            Topic::React => "React",
            Topic::Node => "Node",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic '{0}', expected one of JavaScript, React, Node")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTopic(raw.to_string()))
    }
}

/// A server-owned article record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: ArticleId,
    pub title: String,
    pub text: String,
    pub topic: Topic,
}

impl Article {
    pub fn draft(&self) -> ArticleDraft {
        ArticleDraft {
            title: self.title.clone(),
            text: self.text.clone(),
            topic: self.topic,
        }
    }
}

/// Body of create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub text: String,
    pub topic: Topic,
}

impl ArticleDraft {
    pub fn new(title: impl Into<String>, text: impl Into<String>, topic: Topic) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            topic,
        }
    }

    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty() && !self.text.trim().is_empty()
    }

    pub fn matches(&self, article: &Article) -> bool {
        self.title == article.title && self.text == article.text && self.topic == article.topic
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_submittable(&self) -> bool {
        self.username.trim().chars().count() >= MIN_USERNAME_LEN
            && self.password.trim().chars().count() >= MIN_PASSWORD_LEN
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
