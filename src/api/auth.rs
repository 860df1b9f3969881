//! Account endpoints.

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{Credentials, TokenResponse, User};
use serde_json::json;
use tracing::debug;

impl ApiClient {
    /// `POST /auth/register`. Requires a username.
    pub async fn register(&self, credentials: &Credentials) -> Result<User, ApiError> {
        if credentials.username.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::InvalidInput("username is required".to_string()));
        }
        debug!("POST /auth/register for {}", credentials.email);
        let request = self.http.post(self.url("/auth/register")).json(credentials);
        self.send_json(request).await
    }

    /// `POST /auth/login`, returning the access token without storing it.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        debug!("POST /auth/login for {}", email);
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        let response: TokenResponse = self.send_json(request).await?;
        Ok(response.access_token)
    }

    /// `GET /auth/me` with the current token.
    pub async fn me(&self) -> Result<User, ApiError> {
        let request = self.authorized(self.http.get(self.url("/auth/me")))?;
        self.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[tokio::test]
    async fn test_register_requires_username() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        let credentials = Credentials {
            username: None,
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        };
        let err = client.register(&credentials).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        assert!(matches!(client.me().await, Err(ApiError::Unauthenticated)));
    }
}
