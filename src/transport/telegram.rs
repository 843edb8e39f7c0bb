//! Telegram Bot API sink.

use super::{MessageSink, SendOutcome};
use crate::error::{RelayError, Result};
use crate::types::ChatId;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Public Bot API endpoint.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Envelope shared by every Bot API response.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Sends messages through the Telegram Bot API.
pub struct TelegramSink {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramSink {
    /// Default whole-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(token, TELEGRAM_API_BASE)
    }

    /// Point the sink at a different Bot API server.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .connect_timeout(Self::DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| RelayError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Call a read-only method and return its `result`.
    fn call(&self, method: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(self.method_url(method))
            .query(query)
            .send()
            .map_err(|e| RelayError::Transport(format!("{method}: {}", e.without_url())))?;

        let api: ApiResponse = resp
            .json()
            .map_err(|e| RelayError::Transport(format!("{method}: {}", e.without_url())))?;

        if !api.ok {
            return Err(RelayError::Transport(format!(
                "{method}: {}",
                api.description.unwrap_or_else(|| "request rejected".into())
            )));
        }
        Ok(api.result.unwrap_or(serde_json::Value::Null))
    }
}

/// Map an HTTP status and API envelope to a send outcome.
fn classify(status: u16, api: ApiResponse) -> SendOutcome {
    if api.ok {
        return SendOutcome::Delivered;
    }

    if status == 429 || api.error_code == Some(429) {
        let secs = api
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or_default();
        return SendOutcome::RateLimited {
            retry_after: Duration::from_secs(secs),
        };
    }

    SendOutcome::Failed {
        cause: format!(
            "HTTP {}: {}",
            status,
            api.description.unwrap_or_else(|| "request rejected".into())
        ),
    }
}

fn request_failure(e: reqwest::Error) -> SendOutcome {
    if e.is_timeout() {
        SendOutcome::TimedOut
    } else {
        SendOutcome::Failed {
            cause: e.without_url().to_string(),
        }
    }
}

impl MessageSink for TelegramSink {
    fn send(&self, destination: &ChatId, text: &str) -> SendOutcome {
        let body = SendMessageRequest {
            chat_id: destination.as_str(),
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let resp = match self.client.post(self.method_url("sendMessage")).json(&body).send() {
            Ok(resp) => resp,
            Err(e) => return request_failure(e),
        };

        let status = resp.status().as_u16();
        match resp.json::<ApiResponse>() {
            Ok(api) => classify(status, api),
            Err(e) => request_failure(e),
        }
    }

    fn probe(&self, destination: &ChatId) -> Result<()> {
        let me = self.call("getMe", &[])?;
        let username = me.get("username").and_then(|v| v.as_str()).unwrap_or("?");
        debug!(bot = username, "Bot identity confirmed");

        let chat = self.call("getChat", &[("chat_id", destination.as_str())])?;
        let kind = chat.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");
        info!(chat = %destination, kind, bot = username, "Destination reachable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify_ok() {
        let api = parse(r#"{"ok":true,"result":{"message_id":1}}"#);
        assert_eq!(classify(200, api), SendOutcome::Delivered);
    }

    #[test]
    fn test_classify_flood_control() {
        let api = parse(
            r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 17","parameters":{"retry_after":17}}"#,
        );
        assert_eq!(
            classify(429, api),
            SendOutcome::RateLimited {
                retry_after: Duration::from_secs(17)
            }
        );
    }

    #[test]
    fn test_classify_429_without_parameters() {
        let api = parse(r#"{"ok":false,"error_code":429}"#);
        assert_eq!(
            classify(429, api),
            SendOutcome::RateLimited {
                retry_after: Duration::ZERO
            }
        );
    }

    #[test]
    fn test_classify_other_failure() {
        let api = parse(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#,
        );
        match classify(400, api) {
            SendOutcome::Failed { cause } => {
                assert!(cause.contains("400"));
                assert!(cause.contains("can't parse entities"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_method_url_trims_trailing_slash() {
        let sink = TelegramSink::with_api_base("123:abc", "http://localhost:8081/").unwrap();
        assert_eq!(
            sink.method_url("sendMessage"),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }
}
