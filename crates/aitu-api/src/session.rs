use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

/// Name of the cookie the server issues on sign-in.
pub const SESSION_COOKIE: &str = "sid";

/// Ambient session credentials shared by the REST client and the chat socket.
///
/// The jar is handed to reqwest so `Set-Cookie` from sign-in lands here, and
/// the socket upgrade reads the same cookie back out.
#[derive(Clone)]
pub struct Session {
    jar: Arc<Jar>,
    base_url: Url,
}

impl Session {
    pub fn new(base_url: Url) -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            base_url,
        }
    }

    /// Seed the jar with an existing session id (e.g. from the environment).
    pub fn with_session_id(base_url: Url, sid: &str) -> Self {
        let session = Self::new(base_url);
        session
            .jar
            .add_cookie_str(&format!("{SESSION_COOKIE}={sid}; Path=/"), &session.base_url);
        session
    }

    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `Cookie` header value for requests to the base host, if signed in.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|v| v.to_str().ok().map(str::to_string))
    }

    pub fn is_signed_in(&self) -> bool {
        self.cookie_header()
            .is_some_and(|c| c.split(';').any(|kv| {
                kv.trim()
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
                    .is_some_and(|v| !v.is_empty())
            }))
    }
}
