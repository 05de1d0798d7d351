use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{upstream_error, Error};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub approved: bool,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Verdict {
    pub fn approved() -> Self {
        Self {
            approved: true,
            reasons: vec![],
        }
    }
}

/// Screens free text written by users.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<Verdict, Error>;
}

/// Rejects text containing any blocklisted term, ignoring case.
#[derive(Clone, Debug, Default)]
pub struct KeywordModerator {
    blocklist: Vec<String>,
}

impl KeywordModerator {
    pub fn new<I, T>(blocklist: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            blocklist: blocklist
                .into_iter()
                .map(|term| term.as_ref().trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl Moderator for KeywordModerator {
    async fn moderate(&self, text: &str) -> Result<Verdict, Error> {
        let text = text.to_lowercase();

        let reasons: Vec<String> = self
            .blocklist
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .map(|term| format!("contains blocked term \"{}\"", term))
            .collect();

        Ok(Verdict {
            approved: reasons.is_empty(),
            reasons,
        })
    }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    text: &'a str,
}

/// Asks a remote moderation service for a verdict.
#[derive(Clone, Debug)]
pub struct HttpModerator {
    client: reqwest::Client,
    url: String,
}

impl HttpModerator {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Moderator for HttpModerator {
    #[tracing::instrument(skip(self, text))]
    async fn moderate(&self, text: &str) -> Result<Verdict, Error> {
        let res = self
            .client
            .post(&self.url)
            .json(&ModerationRequest { text })
            .send()
            .await?;

        if res.status().as_u16() != 200 {
            tracing::warn!(status = %res.status(), "moderation service refused the call");
            return Err(upstream_error());
        }

        Ok(res.json().await?)
    }
}
