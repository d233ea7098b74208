// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `aegis-fabric dispatch <message_type>`: send one coordinator message to a
//! running node and print the response.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

use aegis_fabric::CoordinatorResponse;

use crate::client::FabricClient;

#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Coordinator verb, e.g. create_task or tool_call
    #[arg(value_name = "MESSAGE_TYPE")]
    pub message_type: String,

    /// JSON payload, or @path to read it from a file
    #[arg(short, long, default_value = "{}")]
    pub payload: String,

    /// Act as this agent (sent as x-aegis-agent-id)
    #[arg(long, env = "AEGIS_FABRIC_AGENT_ID")]
    pub agent: Option<String>,
}

/// Parse `--payload`, reading `@file` references from disk.
pub fn read_payload(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read payload file {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}

pub async fn run(args: DispatchArgs, host: &str, port: u16) -> Result<()> {
    let payload = read_payload(&args.payload)?;
    let client = FabricClient::new(host, port)?.with_agent(args.agent);
    let response = client.dispatch(&args.message_type, payload).await?;

    match &response {
        CoordinatorResponse::Success { data, .. } => {
            println!("{}", serde_json::to_string_pretty(data)?);
            Ok(())
        }
        CoordinatorResponse::Error { error, .. } => {
            eprintln!("{} {}", format!("✗ {}:", error.kind).red(), error.message);
            if let Some(known) = &error.known_keys {
                eprintln!("  {} {}", "known:".dimmed(), known.join(", "));
            }
            if error.retryable {
                eprintln!("  {}", "(retryable)".yellow());
            }
            anyhow::bail!("dispatch of '{}' failed", args.message_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_and_file_payloads() {
        assert_eq!(read_payload(r#"{"name":"x"}"#).unwrap(), json!({"name": "x"}));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"{"name": "from file"}"#).unwrap();
        let payload = read_payload(&format!("@{}", path.display())).unwrap();
        assert_eq!(payload["name"], "from file");

        assert!(read_payload("not json").is_err());
    }
}
