use tracing::info;

use aitu_types::api::{LoginRequest, StatusResponse};

use crate::client::{ApiClient, check_status};
use crate::error::ApiError;

impl ApiClient {
    /// Sign in with email and password. The server answers with a `sid`
    /// cookie which the shared jar keeps for every later request and for the
    /// chat socket upgrade.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint("/api/auth/login")?;
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let resp = self.http().post(url).json(&req).send().await?;
        let resp = check_status(resp).await?;
        let body: StatusResponse = resp.json().await?;

        if let Some(error) = body.error {
            return Err(ApiError::Status {
                status: reqwest::StatusCode::UNAUTHORIZED,
                message: error,
            });
        }

        info!("Signed in as {}", email);
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        let url = self.endpoint("/api/auth/logout")?;
        let resp = self.http().post(url).send().await?;
        check_status(resp).await?;
        info!("Signed out");
        Ok(())
    }
}
