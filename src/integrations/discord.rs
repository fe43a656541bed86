//! Discord 集成
//!
//! 通过 Gateway WebSocket 接收事件，REST API 回复消息。
//! READY 事件记录本 Bot 的用户 ID；每条 MESSAGE_CREATE 解码为 IncomingMessage 后在独立任务里交给 MessageHandler。
//! 连接断开或收到 Reconnect / Invalid Session 时等待片刻后重新 Identify；认证失败等不可恢复的关闭码直接结束运行。

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::bot::{IncomingMessage, MessageHandler, Replier};
use crate::core::BotError;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Intents: GUILDS (1) | GUILD_MESSAGES (512) | DIRECT_MESSAGES (4096) | MESSAGE_CONTENT (32768)
const GATEWAY_INTENTS: u64 = 1 | 512 | 4096 | 32768;

const DEFAULT_HEARTBEAT_MS: u64 = 41250;

/// 两次连接之间的等待
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Gateway opcode
const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;

/// Discord Bot：持有 token、HTTP 客户端与消息处理器
pub struct DiscordBot {
    token: String,
    client: Client,
    handler: Arc<MessageHandler>,
}

impl DiscordBot {
    pub fn new(token: impl Into<String>, handler: Arc<MessageHandler>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            handler,
        }
    }

    async fn fetch_gateway_url(&self) -> Result<String, BotError> {
        let resp = self
            .client
            .get(format!("{}/gateway/bot", DISCORD_API_BASE))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| BotError::Gateway(format!("failed to get gateway URL: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Gateway(format!(
                "gateway/bot returned {}: {}",
                status, body
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BotError::Gateway(e.to_string()))?;
        let url = body["url"]
            .as_str()
            .ok_or_else(|| BotError::Gateway("missing 'url' in gateway response".into()))?;
        Ok(format!("{}/?v=10&encoding=json", url))
    }

    /// 连接 Gateway 并处理事件，直到 shutdown 被取消或收到不可恢复的关闭码
    ///
    /// 会话因 Reconnect / Invalid Session / 断线结束时，等待 `RECONNECT_DELAY` 后重新获取网关地址并 Identify。
    /// 首次连接失败直接返回错误（通常是 token 无效或网络不可达）。
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), BotError> {
        let mut attempt: u32 = 0;
        loop {
            match self.run_session(&shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Fatal(reason)) => return Err(BotError::Gateway(reason)),
                Ok(SessionEnd::Reconnect(reason)) => {
                    tracing::warn!(
                        "Discord gateway session ended ({}), reconnecting in {}s",
                        reason,
                        RECONNECT_DELAY.as_secs()
                    );
                }
                Err(e) if attempt == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Discord gateway reconnect #{} failed: {}, retrying in {}s",
                        attempt,
                        e,
                        RECONNECT_DELAY.as_secs()
                    );
                }
            }
            attempt += 1;

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    /// 单次会话：获取网关地址、Hello、Identify，随后处理事件直到会话结束
    async fn run_session(&self, shutdown: &CancellationToken) -> Result<SessionEnd, BotError> {
        let gateway_url = self.fetch_gateway_url().await?;
        tracing::info!("Connecting to Discord Gateway: {}", gateway_url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&gateway_url)
            .await
            .map_err(|e| BotError::Gateway(format!("connect failed: {}", e)))?;
        let (ws_write, mut ws_read) = ws_stream.split();
        let ws_write = Arc::new(Mutex::new(ws_write));

        // Hello (op 10) 给出心跳间隔
        let heartbeat_ms = match ws_read.next().await {
            Some(Ok(msg)) => {
                let payload: Value =
                    serde_json::from_str(msg.to_text().unwrap_or("{}")).unwrap_or_default();
                if payload["op"].as_u64() == Some(OP_HELLO) {
                    payload["d"]["heartbeat_interval"]
                        .as_u64()
                        .unwrap_or(DEFAULT_HEARTBEAT_MS)
                } else {
                    tracing::warn!("Expected Hello (op 10), got: {}", payload);
                    DEFAULT_HEARTBEAT_MS
                }
            }
            _ => return Err(BotError::Gateway("no Hello from Discord Gateway".into())),
        };
        tracing::debug!("Discord heartbeat interval: {}ms", heartbeat_ms);

        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "memobot",
                    "device": "memobot"
                }
            }
        });
        ws_write
            .lock()
            .await
            .send(WsMessage::Text(identify.to_string()))
            .await
            .map_err(|e| BotError::Gateway(format!("identify failed: {}", e)))?;

        // 最近一次 dispatch 的序号，-1 表示尚无
        let sequence = Arc::new(AtomicI64::new(-1));

        let hb_write = Arc::clone(&ws_write);
        let hb_sequence = Arc::clone(&sequence);
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_ms));
            interval.tick().await;
            loop {
                interval.tick().await;
                let frame = heartbeat_frame(hb_sequence.load(Ordering::SeqCst));
                if let Err(e) = hb_write.lock().await.send(WsMessage::Text(frame)).await {
                    tracing::warn!("Discord heartbeat failed: {}", e);
                    break;
                }
            }
        });

        let mut bot_user_id: Option<String> = None;
        let end = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break SessionEnd::Shutdown,
                next = ws_read.next() => next,
            };

            let msg = match next {
                Some(Ok(m)) => m,
                Some(Err(e)) => break SessionEnd::Reconnect(format!("websocket error: {}", e)),
                None => break SessionEnd::Reconnect("connection closed".into()),
            };

            if let WsMessage::Close(frame) = &msg {
                let code = frame.as_ref().map(|f| u16::from(f.code));
                break session_end_for_close(code);
            }
            let Ok(text) = msg.to_text() else {
                continue;
            };
            let Ok(payload) = serde_json::from_str::<Value>(text) else {
                continue;
            };

            if let Some(s) = payload["s"].as_i64() {
                sequence.store(s, Ordering::SeqCst);
            }

            match payload["op"].as_u64() {
                Some(OP_DISPATCH) => {}
                Some(OP_HEARTBEAT) => {
                    let frame = heartbeat_frame(sequence.load(Ordering::SeqCst));
                    if let Err(e) = ws_write.lock().await.send(WsMessage::Text(frame)).await {
                        break SessionEnd::Reconnect(format!("heartbeat failed: {}", e));
                    }
                    continue;
                }
                Some(op @ (OP_RECONNECT | OP_INVALID_SESSION)) => {
                    break SessionEnd::Reconnect(format!("gateway requested reconnect (op {})", op));
                }
                _ => continue,
            }

            match payload["t"].as_str() {
                Some("READY") => {
                    bot_user_id = payload["d"]["user"]["id"].as_str().map(String::from);
                    tracing::info!(
                        "Bot is online as {} ({})",
                        payload["d"]["user"]["username"].as_str().unwrap_or("?"),
                        bot_user_id.as_deref().unwrap_or("?")
                    );
                }
                Some("MESSAGE_CREATE") => {
                    let Some(bot_id) = bot_user_id.clone() else {
                        continue;
                    };
                    let Some(incoming) = parse_message_create(&payload["d"]) else {
                        continue;
                    };
                    self.spawn_handle(incoming, bot_id);
                }
                _ => {}
            }
        };

        heartbeat.abort();
        let _ = ws_write.lock().await.close().await;
        tracing::info!("Discord gateway connection ended");
        Ok(end)
    }

    fn spawn_handle(&self, incoming: IncomingMessage, bot_id: String) {
        let handler = Arc::clone(&self.handler);
        let replier = DiscordReplier {
            client: self.client.clone(),
            token: self.token.clone(),
            channel_id: incoming.channel_id.clone(),
            message_id: incoming.message_id.clone(),
        };
        tokio::spawn(async move {
            let outcome = handler.handle(&incoming, &bot_id, &replier).await;
            tracing::debug!("Message {} handled: {:?}", incoming.message_id, outcome);
        });
    }
}

/// 会话结束方式
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect(String),
    Fatal(String),
}

/// 4004 认证失败、4010-4014 分片 / intents 配置错误：重连也无济于事
fn is_fatal_close_code(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

fn session_end_for_close(code: Option<u16>) -> SessionEnd {
    match code {
        Some(c) if is_fatal_close_code(c) => {
            SessionEnd::Fatal(format!("gateway closed with fatal code {}", c))
        }
        Some(c) => SessionEnd::Reconnect(format!("closed by server with code {}", c)),
        None => SessionEnd::Reconnect("closed by server".into()),
    }
}

fn heartbeat_frame(sequence: i64) -> String {
    let d = if sequence >= 0 { json!(sequence) } else { Value::Null };
    json!({ "op": OP_HEARTBEAT, "d": d }).to_string()
}

/// 解码 MESSAGE_CREATE 的 `d` 字段；缺少消息 ID、频道或作者时返回 None
pub fn parse_message_create(data: &Value) -> Option<IncomingMessage> {
    let message_id = data["id"].as_str()?;
    let channel_id = data["channel_id"].as_str()?;
    let author_id = data["author"]["id"].as_str()?;

    let mentions = data["mentions"]
        .as_array()
        .map(|users| {
            users
                .iter()
                .filter_map(|u| u["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Some(IncomingMessage {
        message_id: message_id.to_string(),
        channel_id: channel_id.to_string(),
        author_id: author_id.to_string(),
        author_is_bot: data["author"]["bot"].as_bool().unwrap_or(false),
        mentions,
        content: data["content"].as_str().unwrap_or_default().to_string(),
    })
}

/// 以「回复」形式发到触发消息所在频道
pub struct DiscordReplier {
    client: Client,
    token: String,
    channel_id: String,
    message_id: String,
}

#[async_trait]
impl Replier for DiscordReplier {
    async fn reply(&self, text: &str) -> Result<(), BotError> {
        let body = json!({
            "content": text,
            "message_reference": { "message_id": self.message_id },
        });
        let resp = self
            .client
            .post(format!(
                "{}/channels/{}/messages",
                DISCORD_API_BASE, self.channel_id
            ))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Delivery(format!("Discord API {}: {}", status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_intents() {
        assert_eq!(GATEWAY_INTENTS & 512, 512);
        assert_eq!(GATEWAY_INTENTS & 32768, 32768);
        assert_eq!(GATEWAY_INTENTS, 1 | 512 | 4096 | 32768);
    }

    #[test]
    fn test_fatal_close_codes() {
        assert!(is_fatal_close_code(4004));
        for code in 4010..=4014 {
            assert!(is_fatal_close_code(code));
        }
        assert!(!is_fatal_close_code(1000));
        assert!(!is_fatal_close_code(4000));
        assert!(!is_fatal_close_code(4009));
    }

    #[test]
    fn test_close_frame_decides_reconnect() {
        assert!(matches!(
            session_end_for_close(Some(4004)),
            SessionEnd::Fatal(_)
        ));
        assert!(matches!(
            session_end_for_close(Some(1001)),
            SessionEnd::Reconnect(_)
        ));
        assert!(matches!(
            session_end_for_close(Some(4009)),
            SessionEnd::Reconnect(_)
        ));
        assert!(matches!(session_end_for_close(None), SessionEnd::Reconnect(_)));
    }

    #[test]
    fn test_heartbeat_frame() {
        assert_eq!(heartbeat_frame(-1), r#"{"d":null,"op":1}"#);
        assert_eq!(heartbeat_frame(42), r#"{"d":42,"op":1}"#);
    }

    #[test]
    fn test_parse_message_create() {
        let d = json!({
            "id": "1001",
            "channel_id": "c1",
            "content": "<@42> hello",
            "author": { "id": "u1", "username": "alice" },
            "mentions": [ { "id": "42", "bot": true }, { "id": "7" } ]
        });
        let msg = parse_message_create(&d).unwrap();
        assert_eq!(msg.message_id, "1001");
        assert_eq!(msg.channel_id, "c1");
        assert_eq!(msg.author_id, "u1");
        assert!(!msg.author_is_bot);
        assert_eq!(msg.mentions, vec!["42".to_string(), "7".to_string()]);
        assert!(msg.mentions_user("42"));
        assert_eq!(msg.content, "<@42> hello");
    }

    #[test]
    fn test_parse_bot_author_and_missing_fields() {
        let d = json!({
            "id": "1",
            "channel_id": "c",
            "author": { "id": "b", "bot": true }
        });
        let msg = parse_message_create(&d).unwrap();
        assert!(msg.author_is_bot);
        assert!(msg.mentions.is_empty());
        assert_eq!(msg.content, "");

        assert!(parse_message_create(&json!({ "channel_id": "c" })).is_none());
    }
}
