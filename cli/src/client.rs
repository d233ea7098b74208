// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for a running fabric node

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use aegis_fabric::presentation::api::AGENT_HEADER;
use aegis_fabric::CoordinatorResponse;

#[derive(Debug, Clone)]
pub struct FabricClient {
    client: Client,
    base_url: String,
    agent_id: Option<String>,
}

impl FabricClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::with_base_url(format!("http://{}:{}", host, port))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent_id: None,
        })
    }

    /// Act as this agent on every request.
    pub fn with_agent(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Failed to reach fabric node")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Health check failed: {}", error_text);
        }

        response.json().await.context("Failed to parse health response")
    }

    /// Send one coordinator message. Error responses from the node are
    /// returned as [`CoordinatorResponse::Error`], not as `Err`.
    pub async fn dispatch(
        &self,
        message_type: &str,
        payload: Value,
    ) -> Result<CoordinatorResponse> {
        let mut request = self
            .client
            .post(format!("{}/v1/dispatch", self.base_url))
            .json(&json!({ "message_type": message_type, "payload": payload }));
        if let Some(agent_id) = &self.agent_id {
            request = request.header(AGENT_HEADER, agent_id);
        }

        let response = request.send().await.context("Failed to dispatch message")?;
        let status = response.status();
        let body = response.text().await.context("Failed to read dispatch response")?;

        serde_json::from_str(&body).with_context(|| {
            format!("Unexpected response from fabric node ({}): {}", status, body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_dispatch_sends_agent_header_and_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/dispatch")
            .match_header(AGENT_HEADER, "agent:cli")
            .match_body(Matcher::PartialJson(json!({
                "message_type": "create_task",
                "payload": {"name": "index"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message_type":"create_task","data":{"task_id":"task:1"}}"#)
            .create_async()
            .await;

        let client = FabricClient::with_base_url(server.url())
            .unwrap()
            .with_agent(Some("agent:cli".into()));
        let response = client.dispatch("create_task", json!({"name": "index"})).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.data().unwrap()["task_id"], "task:1");
    }

    #[tokio::test]
    async fn test_error_bodies_are_responses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/dispatch")
            .with_status(400)
            .with_body(
                r#"{"status":"error","message_type":"nope","error":{"kind":"malformed_input","message":"Unknown message_type 'nope'","retryable":false,"known_keys":["create_task"]}}"#,
            )
            .create_async()
            .await;

        let client = FabricClient::with_base_url(server.url()).unwrap();
        let response = client.dispatch("nope", json!({})).await.unwrap();
        let error = response.error().unwrap();
        assert_eq!(error.known_keys.as_deref(), Some(&["create_task".to_string()][..]));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/dispatch")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = FabricClient::with_base_url(server.url()).unwrap();
        let err = client.dispatch("query_tasks", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"healthy","uptime_seconds":3}"#)
            .create_async()
            .await;

        let client = FabricClient::with_base_url(server.url()).unwrap();
        assert_eq!(client.health().await.unwrap()["status"], "healthy");
    }
}
