//! HTTP plumbing shared by single-shot and streaming requests.

use crate::Result;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Thin wrapper around a pooled [`reqwest::Client`].
///
/// Holds no endpoint state; callers pass the URL and credentials per call.
/// Attempt deadlines are enforced by the retry unit, not here, so one
/// transport instance serves attempts with different time budgets.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;
        Ok(Self { client })
    }

    /// POST a JSON body and return the raw response.
    ///
    /// Each request carries a fresh `x-request-id` correlation header;
    /// providers may ignore it, but logs on both sides can be linked by it.
    pub async fn post_json(
        &self,
        url: &Url,
        api_key: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut req = self
            .client
            .post(url.clone())
            .json(body)
            .header("x-request-id", &request_id);
        if let Some(key) = api_key {
            req = req.bearer_auth(key);
        }
        Ok(req.send().await?)
    }
}
