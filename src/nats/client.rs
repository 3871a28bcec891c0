use anyhow::{Context, Result};
use async_nats::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Request/reply connection to the inference services
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    subject_prefix: String,
    request_timeout: Duration,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: &str, request_timeout: Duration) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_string(),
            request_timeout,
        })
    }

    /// `{prefix}.{service}.{action}`
    pub fn subject(&self, service: &str, action: &str) -> String {
        format!("{}.{}.{}", self.subject_prefix, service, action)
    }

    /// Send a JSON request and wait for the JSON reply
    pub async fn request<Req, Rep>(&self, subject: String, request: &Req) -> Result<Rep>
    where
        Req: Serialize + ?Sized,
        Rep: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;
        let size = payload.len();

        let reply = tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.clone(), payload.into()),
        )
        .await
        .with_context(|| format!("Request to {} timed out after {:?}", subject, self.request_timeout))?
        .with_context(|| format!("Request to {} failed", subject))?;

        debug!(
            "Request to {} ({} bytes) answered with {} bytes",
            subject,
            size,
            reply.payload.len()
        );

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Malformed reply from {}", subject))
    }

    /// Close NATS connection
    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client.flush().await.context("Failed to flush NATS connection")?;
        Ok(())
    }
}
