use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use aitu_types::api::ErrorResponse;

use crate::error::ApiError;
use crate::session::Session;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for the platform's `/api` endpoints.
///
/// Cheap to clone; clones share the connection pool and the cookie jar.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Result<Self, ApiError> {
        let http = Client::builder()
            .cookie_provider(session.jar())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.session.base_url().join(path)?)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url.path());

        let resp = self.http.get(url).query(query).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json::<T>().await?)
    }
}

/// Turn a non-2xx response into `ApiError::Status`, keeping the server's
/// `{"error": ...}` message when there is one.
pub(crate) async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().chars().take(200).collect());

    Err(ApiError::Status { status, message })
}
