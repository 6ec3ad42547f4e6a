//! Subprocess host bridge.
//!
//! Invokes the host application's command once per request, writing the
//! request envelope as JSON to its stdin and reading the response from its
//! stdout. If stdout is not valid JSON, the trimmed output is treated as the
//! response text.

use super::{BridgeRequest, BridgeResponse, HostBridge};
use crate::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Host bridge backed by a subprocess.
pub struct ProcessBridge {
    command: String,
    args: Vec<String>,
}

impl ProcessBridge {
    /// Create a bridge for the given host command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Add fixed arguments passed on every invocation.
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }
}

#[async_trait]
impl HostBridge for ProcessBridge {
    async fn request(&self, request: BridgeRequest) -> Result<BridgeResponse> {
        let envelope = serde_json::to_string(&request)
            .map_err(|e| Error::Bridge(format!("failed to encode request: {e}")))?;

        debug!(command = %self.command, "dispatching request to host bridge");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Bridge(format!("failed to spawn host bridge: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Bridge("host bridge stdin unavailable".to_string()))?;
        stdin
            .write_all(envelope.as_bytes())
            .await
            .map_err(|e| Error::Bridge(format!("failed to write to host bridge: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Bridge(format!("failed to await host bridge: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Bridge(format!(
                "host bridge exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Ok(response) = serde_json::from_str::<BridgeResponse>(&stdout) {
            return Ok(response);
        }

        Ok(BridgeResponse {
            text: Some(stdout.trim().to_string()),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_bridge(script: &str) -> ProcessBridge {
        ProcessBridge::new("/bin/sh").with_args(["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn json_stdout_is_parsed() {
        let bridge = shell_bridge(r#"cat > /dev/null; printf '{"text":"hello"}'"#);
        let response = bridge.request(BridgeRequest::chat("hi", "main")).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn plain_stdout_becomes_text() {
        let bridge = shell_bridge("cat > /dev/null; echo plain response");
        let response = bridge.request(BridgeRequest::chat("hi", "main")).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("plain response"));
    }

    #[tokio::test]
    async fn request_envelope_reaches_the_host() {
        // The host only replies when its stdin carries the routed payload.
        let bridge =
            shell_bridge(r#"grep -q '"sessionKey":"s1"' - && printf '{"text":"seen"}'"#);
        let response = bridge.request(BridgeRequest::chat("hi", "s1")).await.unwrap();
        assert_eq!(response.text.as_deref(), Some("seen"));
    }

    #[tokio::test]
    async fn failing_host_surfaces_a_bridge_error() {
        let bridge = shell_bridge("cat > /dev/null; echo broken >&2; exit 3");
        let err = bridge
            .request(BridgeRequest::chat("hi", "main"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bridge(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn missing_command_surfaces_a_bridge_error() {
        let bridge = ProcessBridge::new("/nonexistent/coxswain-host");
        let err = bridge
            .request(BridgeRequest::chat("hi", "main"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bridge(_)));
    }
}
