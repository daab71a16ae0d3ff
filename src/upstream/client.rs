// src/upstream/client.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{ConversationInfo, MessagePage, RawMessage, RawReminder, RawUser, UpstreamApi};
use crate::error::UpstreamError;

/// Thin `reqwest` client for the upstream messaging API.
pub struct HttpUpstreamClient {
    client: Client,
    base_url: String,
    token: String,
    link_host: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: String, token: String, link_host: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url,
            token,
            link_host,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        classify_status(&response)?;

        let body: Value = response.json().await?;
        classify_body(&body)?;

        serde_json::from_value(body)
            .map_err(|e| UpstreamError::Other(format!("unexpected response shape from {method}: {e}")))
    }
}

fn classify_status(response: &reqwest::Response) -> Result<(), UpstreamError> {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());
        return Err(UpstreamError::RateLimited { retry_after });
    }
    if response.status() == StatusCode::NOT_FOUND {
        return Err(UpstreamError::NotFound);
    }
    if response.status() == StatusCode::FORBIDDEN {
        return Err(UpstreamError::PermissionDenied);
    }
    Ok(())
}

/// The upstream API signals failure in a `200 OK` body with `ok: false`,
/// so status-code classification alone is not enough.
fn classify_body(body: &Value) -> Result<(), UpstreamError> {
    let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(true);
    if ok {
        return Ok(());
    }

    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
    match error {
        "ratelimited" => {
            let retry_after = body
                .get("headers")
                .and_then(|h| h.get("Retry-After"))
                .and_then(Value::as_str)
                .and_then(|v| v.parse::<f64>().ok());
            Err(UpstreamError::RateLimited { retry_after })
        }
        "channel_not_found" | "thread_not_found" | "user_not_found" => Err(UpstreamError::NotFound),
        "not_in_channel" | "missing_scope" => Err(UpstreamError::NotMember),
        "restricted_action" => Err(UpstreamError::PermissionDenied),
        other => Err(UpstreamError::Other(other.to_string())),
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstreamClient {
    async fn auth_test(&self) -> Result<String, UpstreamError> {
        #[derive(Deserialize)]
        struct AuthTest {
            user_id: String,
        }
        let resp: AuthTest = self.call("auth.test", &[]).await?;
        Ok(resp.user_id)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            channels: Vec<ConversationInfo>,
        }
        let resp: Resp = self.call("conversations.list", &[]).await?;
        Ok(resp.channels)
    }

    async fn channel_history(
        &self,
        channel_id: &str,
        oldest: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            messages: Vec<RawMessage>,
            has_more: bool,
            #[serde(default)]
            response_metadata: Option<ResponseMetadata>,
        }
        #[derive(Deserialize)]
        struct ResponseMetadata {
            next_cursor: Option<String>,
        }

        let mut params = vec![("channel", channel_id)];
        if let Some(oldest) = oldest {
            params.push(("oldest", oldest));
        }
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let resp: Resp = self.call("conversations.history", &params).await?;
        Ok(MessagePage {
            messages: resp.messages,
            has_more: resp.has_more,
            next_cursor: resp.response_metadata.and_then(|m| m.next_cursor),
        })
    }

    async fn thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<RawMessage>, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            messages: Vec<RawMessage>,
        }
        let resp: Resp = self
            .call("conversations.replies", &[("channel", channel_id), ("ts", thread_ts)])
            .await?;
        Ok(resp.messages)
    }

    async fn user_info(&self, user_id: &str) -> Result<RawUser, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            user: RawUser,
        }
        let resp: Resp = self.call("users.info", &[("user", user_id)]).await?;
        Ok(resp.user)
    }

    async fn user_list(&self) -> Result<Vec<RawUser>, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            members: Vec<RawUser>,
        }
        let resp: Resp = self.call("users.list", &[]).await?;
        Ok(resp.members)
    }

    async fn search_messages(&self, query: &str, limit: usize) -> Result<Vec<RawMessage>, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            messages: MatchesWrapper,
        }
        #[derive(Deserialize)]
        struct MatchesWrapper {
            matches: Vec<RawMessage>,
        }
        let count = limit.to_string();
        let resp: Resp = self
            .call("search.messages", &[("query", query), ("count", &count)])
            .await?;
        Ok(resp.messages.matches)
    }

    async fn reminders_list(&self, user_id: &str) -> Result<Vec<RawReminder>, UpstreamError> {
        #[derive(Deserialize)]
        struct Resp {
            reminders: Vec<RawReminder>,
        }
        let resp: Resp = self.call("reminders.list", &[("user", user_id)]).await?;
        Ok(resp.reminders)
    }

    fn message_link(&self, channel_id: &str, message_ts: &str, thread_ts: Option<&str>) -> String {
        let ts_formatted = message_ts.replace('.', "");
        let mut link = format!("https://{}/archives/{}/p{}", self.link_host, channel_id, ts_formatted);
        if let Some(thread_ts) = thread_ts {
            if thread_ts != message_ts {
                link.push_str(&format!("?thread_ts={}", thread_ts.replace('.', "")));
            }
        }
        link
    }
}
