//! Refresh endpoint client
//!
//! `POST <refresh-url>` with the refresh token both as a bearer credential and
//! in the JSON body. A 2xx response must carry a complete, non-empty token
//! pair; anything else is a refresh failure.

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Successful refresh response. Both tokens are required.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchange a refresh token for a new access/refresh pair.
///
/// `client` must not carry the auth interceptor: a refresh call that itself
/// returns 401 has to fail, not trigger another refresh.
pub async fn refresh_tokens(
    client: &reqwest::Client,
    url: &str,
    refresh: &str,
    user_id: Option<&str>,
    user_id_header: &str,
) -> Result<TokenResponse> {
    let mut request = client
        .post(url)
        .header(AUTHORIZATION, format!("Bearer {refresh}"))
        .json(&RefreshRequest {
            refresh_token: refresh,
        });

    if let Some(user_id) = user_id {
        match (
            HeaderName::from_bytes(user_id_header.as_bytes()),
            HeaderValue::from_str(user_id),
        ) {
            (Ok(name), Ok(value)) => request = request.header(name, value),
            _ => warn!(header = user_id_header, "skipping invalid user id header"),
        }
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or expired
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRefresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let tokens = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("invalid refresh response: {e}")))?;

    if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
        return Err(Error::TokenRefresh(
            "refresh response is missing a token".into(),
        ));
    }

    Ok(tokens)
}
