//! Delivery client for the DiMe event-collection server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `{url}/ping` | Connectivity check, any 2xx is success |
//! | `POST` | `{url}/{event_path}` | Store one event (basic auth, JSON body) |
//!
//! Timeouts are transport errors: the record is skipped and retried on the
//! next run, exactly like a refused connection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::SinkConfig;
use crate::error::DeliveryError;
use crate::models::Event;

#[async_trait]
pub trait Sink: Send + Sync {
    /// Whether the sink is reachable right now.
    async fn ping(&self) -> bool;

    /// Deliver one event; returns the number of body bytes sent.
    async fn deliver(&self, event: &Event) -> Result<u64, DeliveryError>;
}

pub struct DimeClient {
    client: reqwest::Client,
    base_url: String,
    event_path: String,
    username: Option<String>,
    password: Option<String>,
}

impl DimeClient {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            event_path: config.event_path.trim_start_matches('/').to_string(),
            username: config.username.clone(),
            password: config.resolve_password()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_ref()),
            None => req,
        }
    }
}

/// Serialize an event to the bytes posted on the wire.
pub fn encode(event: &Event) -> Result<Vec<u8>, DeliveryError> {
    Ok(serde_json::to_vec(event)?)
}

#[async_trait]
impl Sink for DimeClient {
    async fn ping(&self) -> bool {
        match self.client.post(self.endpoint("ping")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "ping failed");
                false
            }
        }
    }

    async fn deliver(&self, event: &Event) -> Result<u64, DeliveryError> {
        let body = encode(event)?;
        let len = body.len() as u64;

        let req = self
            .client
            .post(self.endpoint(&self.event_path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let resp = self.authed(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(len)
    }
}
