//! HTTP client for the indexer service

use anyhow::{Context, Result};
use election_core::state::{Address, ElectionId, LedgerEvent, Timestamp};
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

pub struct ServiceClient {
    base_url: String,
    http: Client,
    ingest_token: Option<String>,
}

impl ServiceClient {
    pub fn new(base_url: &str, ingest_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
            ingest_token,
        }
    }

    /// POST /events. Returns the service's batch report.
    pub async fn push_events(&self, events: &[LedgerEvent]) -> Result<Value> {
        let token = self
            .ingest_token
            .as_deref()
            .context("INGEST_AUTH_TOKEN is required to push events")?;
        let url = format!("{}/events", self.base_url);
        debug!("POST {} ({} events)", url, events.len());
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "events": events }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn meta(&self) -> Result<Value> {
        self.get("/meta").await
    }

    pub async fn candidates(&self, election_id: ElectionId) -> Result<Value> {
        self.get(&format!("/elections/{}/candidates", election_id))
            .await
    }

    pub async fn ranking(&self, election_id: ElectionId) -> Result<Value> {
        self.get(&format!("/elections/{}/ranking", election_id))
            .await
    }

    pub async fn winner(&self, election_id: ElectionId) -> Result<Value> {
        self.get(&format!("/elections/{}/winner", election_id))
            .await
    }

    pub async fn eligibility(
        &self,
        election_id: ElectionId,
        actor: &Address,
        now: Option<Timestamp>,
    ) -> Result<Value> {
        let mut path = format!("/elections/{}/voters/{}/eligibility", election_id, actor);
        if let Some(now) = now {
            path.push_str(&format!("?now={}", now));
        }
        self.get(&path).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}
