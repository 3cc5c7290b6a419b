//! Remote similarity service over JSON/HTTP.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | /health | - | 2xx when ready |
//! | POST | /store | `{"text": ".."}` | 2xx |
//! | POST | /search | `{"query": "..", "limit": n}` | `{"results": [{"content": "..", "similarity": 0.9}]}` |
//! | GET | /count | - | `{"count": n}` |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::service::{SimilarityHit, SimilarityService};
use crate::error::{SimilarityError, SimilarityResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct StoreRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SimilarityHit>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: usize,
}

pub struct HttpSimilarityService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSimilarityService {
    pub fn new(base_url: &str) -> SimilarityResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> SimilarityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SimilarityError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn map_reqwest(e: reqwest::Error) -> SimilarityError {
    if e.is_timeout() {
        SimilarityError::Timeout
    } else if e.is_connect() {
        SimilarityError::Unavailable
    } else {
        SimilarityError::Request(e.to_string())
    }
}

async fn check_status(res: reqwest::Response) -> SimilarityResult<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(SimilarityError::Request(format!("HTTP {}: {}", status.as_u16(), body)))
}

#[async_trait]
impl SimilarityService for HttpSimilarityService {
    async fn is_healthy(&self) -> SimilarityResult<bool> {
        let res = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(map_reqwest)?;
        Ok(res.status().is_success())
    }

    async fn store(&self, text: &str) -> SimilarityResult<()> {
        let res = self
            .client
            .post(self.url("store"))
            .json(&StoreRequest { text })
            .send()
            .await
            .map_err(map_reqwest)?;
        check_status(res).await?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> SimilarityResult<Vec<SimilarityHit>> {
        let res = self
            .client
            .post(self.url("search"))
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(map_reqwest)?;
        let parsed: SearchResponse = check_status(res)
            .await?
            .json()
            .await
            .map_err(|e| SimilarityError::InvalidResponse(e.to_string()))?;
        debug!(target: "hearth::semantic", hits = parsed.results.len(), "remote search returned");
        Ok(parsed.results)
    }

    async fn count(&self) -> SimilarityResult<usize> {
        let res = self
            .client
            .get(self.url("count"))
            .send()
            .await
            .map_err(map_reqwest)?;
        let parsed: CountResponse = check_status(res)
            .await?
            .json()
            .await
            .map_err(|e| SimilarityError::InvalidResponse(e.to_string()))?;
        Ok(parsed.count)
    }

    fn name(&self) -> &str {
        "http"
    }
}
