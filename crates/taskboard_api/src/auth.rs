//! Authentication endpoints. Register and login run unauthenticated with
//! their own short-lived client; profile refresh goes through the
//! authenticated [`BoardClient`](crate::client::BoardClient).

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::models::AuthSession;

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<AuthSession>,
    #[serde(default)]
    message: Option<String>,
}

pub async fn register(base_url: &str, username: &str, password: &str) -> Result<AuthSession> {
    post_credentials(base_url, "auth/register", username, password).await
}

pub async fn login(base_url: &str, username: &str, password: &str) -> Result<AuthSession> {
    post_credentials(base_url, "auth/login", username, password).await
}

async fn post_credentials(
    base_url: &str,
    path: &str,
    username: &str,
    password: &str,
) -> Result<AuthSession> {
    let url = format!("{}/api/{}", base_url.trim_end_matches('/'), path);
    let client = Client::new();
    let response = client
        .post(url)
        .json(&CredentialsBody { username, password })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::http(status, body));
    }

    let envelope = response.json::<AuthEnvelope>().await?;
    if !envelope.success {
        return Err(ApiError::Rejected(envelope.message.unwrap_or_default()));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Serialization("auth response carried no session".to_string()))
}
