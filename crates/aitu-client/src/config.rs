use anyhow::{Context, Result};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Where the chat server lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    /// Existing `sid` cookie value; skips sign-in when set.
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = non_empty("AITU_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let base_url =
            Url::parse(&raw_url).with_context(|| format!("invalid AITU_BASE_URL: {raw_url}"))?;

        Ok(Self {
            base_url,
            session_id: non_empty("AITU_SESSION"),
            email: non_empty("AITU_EMAIL"),
            password: non_empty("AITU_PASSWORD"),
        })
    }

    /// Email and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}
