//! Registry backed by a small JSON HTTP service.
//!
//! Endpoints, relative to the base URL:
//!
//! | method | path                   | meaning                                  |
//! |--------|------------------------|------------------------------------------|
//! | GET    | `/identifiers`         | JSON array of every registered number    |
//! | GET    | `/identifiers/count`   | `{"count": n}`                           |
//! | GET    | `/identifiers/{id}`    | 200 when registered, 404 otherwise       |
//! | POST   | `/identifiers/{id}`    | 201 when added, 200 or 409 when present  |
//! | DELETE | `/identifiers/{id}`    | 200/204 when removed, 404 when absent    |

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use ncb_core::{domain::Identifier, errors::Error, registry::Registry, Result};
use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct HttpRegistry {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct CountBody {
    count: usize,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Registry(format!("http client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/identifiers{path}", self.base_url)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        req.send()
            .await
            .map_err(|e| Error::Registry(format!("registry request error: {e}")))
    }
}

async fn unexpected(what: &str, resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Error::Registry(format!(
        "registry {what} failed: {status} {}",
        body.chars().take(200).collect::<String>()
    ))
}

#[async_trait]
impl Registry for HttpRegistry {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_all_identifiers(&self) -> Result<HashSet<String>> {
        let resp = self.send(self.http.get(self.url(""))).await?;
        if !resp.status().is_success() {
            return Err(unexpected("fetch", resp).await);
        }
        let ids: Vec<String> = resp
            .json()
            .await
            .map_err(|e| Error::Registry(format!("registry json error: {e}")))?;
        tracing::debug!(count = ids.len(), "registry snapshot fetched");
        Ok(ids.into_iter().collect())
    }

    async fn contains(&self, id: &Identifier) -> Result<bool> {
        let resp = self
            .send(self.http.get(self.url(&format!("/{id}"))))
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected("lookup", resp).await),
        }
    }

    async fn insert(&self, id: &Identifier) -> Result<bool> {
        let resp = self
            .send(self.http.post(self.url(&format!("/{id}"))))
            .await?;
        match resp.status() {
            StatusCode::CREATED => Ok(true),
            StatusCode::OK | StatusCode::CONFLICT => Ok(false),
            _ => Err(unexpected("insert", resp).await),
        }
    }

    async fn remove(&self, id: &Identifier) -> Result<bool> {
        let resp = self
            .send(self.http.delete(self.url(&format!("/{id}"))))
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected("remove", resp).await),
        }
    }

    async fn count(&self) -> Result<usize> {
        let resp = self.send(self.http.get(self.url("/count"))).await?;
        if !resp.status().is_success() {
            return Err(unexpected("count", resp).await);
        }
        let body: CountBody = resp
            .json()
            .await
            .map_err(|e| Error::Registry(format!("registry json error: {e}")))?;
        Ok(body.count)
    }
}
