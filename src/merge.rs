// IDE Agent Gateway - Code Merge Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// edit_file does not apply diffs itself. The original file and the
// requested change go to a remote fast-apply model which returns the
// merged file. Failures are reported, never retried.

use crate::config::MergeConfig;
use crate::error::ToolError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Merges an edit snippet into existing code
#[async_trait]
pub trait CodeMerger: Send + Sync {
    async fn merge(&self, initial_code: &str, edit_snippet: &str) -> Result<String, ToolError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyRequest<'a> {
    initial_code: &'a str,
    edit_snippet: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyResponse {
    merged_code: Option<String>,
}

/// Relace-style instant-apply endpoint
pub struct RelaceMerger {
    client: Client,
    api_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl RelaceMerger {
    pub fn new(config: &MergeConfig) -> Result<Self, String> {
        let client = Client::builder()
            .user_agent("IDE-Agent-Gate/1.0")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| format!("Failed to create merge client: {}", e))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }
}

#[async_trait]
impl CodeMerger for RelaceMerger {
    async fn merge(&self, initial_code: &str, edit_snippet: &str) -> Result<String, ToolError> {
        if self.api_key.is_empty() {
            return Err(ToolError::Execution(
                "Relace API error: RELACE_API_KEY is not configured".to_string(),
            ));
        }

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&ApplyRequest { initial_code, edit_snippet, stream: false })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(format!("Relace API timed out after {}s", self.timeout_secs))
                } else {
                    ToolError::Execution(format!("Relace API error: {}", e))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::Execution(format!(
                "Relace API error: HTTP {}: {}",
                status.as_u16(),
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: ApplyResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::Execution(format!("Relace API error: invalid response: {}", e)))?;

        parsed
            .merged_code
            .ok_or_else(|| ToolError::Execution("Relace API error: response missing mergedCode".to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_wire_names() {
        let body = serde_json::to_value(ApplyRequest {
            initial_code: "a",
            edit_snippet: "b",
            stream: false,
        })
        .unwrap();
        assert_eq!(body["initialCode"], "a");
        assert_eq!(body["editSnippet"], "b");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn response_reads_merged_code() {
        let parsed: ApplyResponse = serde_json::from_str(r#"{"mergedCode": "fn main() {}"}"#).unwrap();
        assert_eq!(parsed.merged_code.as_deref(), Some("fn main() {}"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let merger = RelaceMerger::new(&MergeConfig::default()).unwrap();
        let err = merger.merge("", "x").await.unwrap_err();
        assert!(err.to_string().starts_with("Relace API error"));
    }

    #[tokio::test]
    async fn silent_endpoint_is_a_timeout() {
        // accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let config = MergeConfig {
            api_url: format!("http://{}/v1/code/apply", addr),
            api_key: "k".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
        };
        let err = RelaceMerger::new(&config).unwrap().merge("a", "b").await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
        assert_eq!(err.to_string(), "Relace API timed out after 1s");
        hold.abort();
    }
}
