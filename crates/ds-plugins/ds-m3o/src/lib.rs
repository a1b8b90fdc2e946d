//! # ds-m3o
//!
//! Adapters for the hosted record store (`db` service) and the hosted
//! user/session service (`user` service) behind the M3O JSON API.
//! Every call is a `POST {base}/{service}/{Endpoint}` with a bearer token.

mod db;
mod user;

pub use db::M3oRecordStore;
pub use user::M3oAccounts;

use anyhow::anyhow;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Shared HTTP client for both hosted services.
#[derive(Clone)]
pub struct M3oClient {
    http: Client,
    base_url: String,
    token: String,
}

impl M3oClient {
    /// Create a client for the API at `base_url` (e.g. `https://api.m3o.com/v1`).
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        if token.is_empty() {
            log::warn!("M3O_API_TOKEN is empty; hosted service calls will be rejected");
        }
        let http = Client::builder()
            .user_agent(concat!("distributed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn endpoint_url(&self, service: &str, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, service, endpoint)
    }

    pub(crate) async fn call<Req, Rsp>(
        &self,
        service: &str,
        endpoint: &str,
        body: &Req,
    ) -> anyhow::Result<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        let url = self.endpoint_url(service, endpoint);
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("{service}.{endpoint} request failed: {e}"))?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(anyhow!(error_detail(&text)
                .unwrap_or_else(|| format!("{service}.{endpoint} returned {status}: {text}"))));
        }
        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text)
            .map_err(|e| anyhow!("{service}.{endpoint} returned an unexpected body: {e}"))
    }
}

/// The `detail` field of an API error body, when there is one.
fn error_detail(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        detail: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|e| e.detail)
        .filter(|detail| !detail.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_ignore_trailing_slash() {
        let client = M3oClient::new("https://api.example.com/v1/", "t").unwrap();
        assert_eq!(
            client.endpoint_url("db", "Read"),
            "https://api.example.com/v1/db/Read"
        );
    }

    #[test]
    fn error_detail_is_extracted() {
        let body = r#"{"id":"db.read","code":404,"detail":"table not found","status":"Not Found"}"#;
        assert_eq!(error_detail(body).as_deref(), Some("table not found"));
        assert_eq!(error_detail("<html>bad gateway</html>"), None);
        assert_eq!(error_detail(r#"{"code":500}"#), None);
    }
}
