//! Async WebSocket gateway client.
//!
//! Keeps one session open: answers `HELLO` with `IDENTIFY` (or `RESUME` when a
//! previous session can be picked up), heartbeats at the interval the server
//! asks for, and broadcasts every dispatch to subscribers. Dropped connections
//! are retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, Result};

/// Gateway opcodes.
pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents the relay subscribes to.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    pub const RELAY: u64 = GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT;
}

/// Close codes after which reconnecting cannot succeed.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// A raw gateway dispatch.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub event: Option<String>,
    pub data: Value,
}

impl GatewayEvent {
    pub fn name(&self) -> Option<&str> {
        self.event.as_deref()
    }
}

/// Session state carried across reconnects.
#[derive(Debug, Default)]
struct Session {
    id: Option<String>,
    resume_url: Option<String>,
    seq: Option<u64>,
}

/// Async gateway client with auto-reconnect and heartbeat.
pub struct GatewayClient {
    token: String,
    gateway_url: String,
    intents: u64,
    max_reconnect: u32,
    sender: broadcast::Sender<GatewayEvent>,
    session: Arc<Mutex<Session>>,
}

impl GatewayClient {
    pub fn new(token: impl Into<String>, gateway_url: &str) -> Self {
        // The gateway wants the bare token, unlike the REST header
        let token = {
            let t = token.into();
            t.strip_prefix("Bot ").map(str::to_owned).unwrap_or(t)
        };
        let (sender, _) = broadcast::channel(1024);
        Self {
            token,
            gateway_url: gateway_url.to_owned(),
            intents: intents::RELAY,
            max_reconnect: 10,
            sender,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Subscribe to broadcast gateway events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    /// Spawns a background task that maintains the gateway connection.
    /// Returns immediately; use [`subscribe`](Self::subscribe) to receive events.
    pub fn connect(&self) -> tokio::task::JoinHandle<()> {
        let token = self.token.clone();
        let url = self.gateway_url.clone();
        let intents = self.intents;
        let max_reconnect = self.max_reconnect;
        let tx = self.sender.clone();
        let session = Arc::clone(&self.session);

        tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                match run_once(&token, &url, intents, &tx, &session).await {
                    Ok(()) => {
                        attempts = 0;
                    }
                    Err(GatewayError::Fatal { code, reason }) => {
                        error!(code, reason = %reason, "Gateway: closed with a fatal code");
                        break;
                    }
                    Err(e) => {
                        attempts += 1;
                        if attempts > max_reconnect {
                            error!(error = %e, "Gateway: max reconnect attempts reached");
                            break;
                        }
                        let delay = Duration::from_secs(u64::min(2u64.pow(attempts), 30));
                        warn!(error = %e, ?delay, attempt = attempts, "Gateway: disconnected, reconnecting");
                        sleep(delay).await;
                    }
                }
            }
        })
    }
}

async fn run_once(
    token: &str,
    url: &str,
    intents: u64,
    tx: &broadcast::Sender<GatewayEvent>,
    session: &Arc<Mutex<Session>>,
) -> Result<()> {
    let connect_url = session
        .lock()
        .await
        .resume_url
        .clone()
        .map(|resume| with_query(&resume, url))
        .unwrap_or_else(|| url.to_owned());
    let (ws, _) = connect_async(connect_url.as_str()).await?;
    let (sink, mut stream) = ws.split();
    let sink = Arc::new(Mutex::new(sink));
    let mut hb_task: Option<tokio::task::JoinHandle<()>> = None;

    let result = async {
        while let Some(msg) = stream.next().await {
            let text = match msg? {
                Message::Text(t) => t.as_str().to_owned(),
                Message::Close(frame) => return close_result(frame),
                _ => continue,
            };
            let payload: Value = serde_json::from_str(&text)?;
            let op_code = payload["op"].as_u64().unwrap_or(255) as u8;
            let data = payload.get("d").cloned().unwrap_or(Value::Null);
            let event_name = payload.get("t").and_then(|v| v.as_str()).map(str::to_owned);
            if let Some(s) = payload.get("s").and_then(|v| v.as_u64()) {
                session.lock().await.seq = Some(s);
            }

            match op_code {
                op::HELLO => {
                    let interval = data["heartbeat_interval"].as_u64().unwrap_or(41_250);
                    hb_task = Some(spawn_heartbeat(
                        Arc::clone(&sink),
                        Arc::clone(session),
                        Duration::from_millis(interval),
                    ));

                    let frame = {
                        let s = session.lock().await;
                        match (&s.id, s.seq) {
                            (Some(sid), Some(seq)) => json!({
                                "op": op::RESUME,
                                "d": { "token": token, "session_id": sid, "seq": seq }
                            }),
                            _ => json!({
                                "op": op::IDENTIFY,
                                "d": {
                                    "token": token,
                                    "intents": intents,
                                    "properties": { "os": std::env::consts::OS, "browser": "wormhole", "device": "wormhole" }
                                }
                            }),
                        }
                    };
                    sink.lock().await.send(Message::Text(frame.to_string().into())).await?;
                }
                op::DISPATCH => {
                    match event_name.as_deref() {
                        Some("READY") => {
                            let mut s = session.lock().await;
                            s.id = data.get("session_id").and_then(|v| v.as_str()).map(str::to_owned);
                            s.resume_url = data
                                .get("resume_gateway_url")
                                .and_then(|v| v.as_str())
                                .map(str::to_owned);
                            info!("Gateway: session ready");
                        }
                        Some("RESUMED") => info!("Gateway: session resumed"),
                        _ => {}
                    }
                    let _ = tx.send(GatewayEvent { event: event_name, data });
                }
                op::HEARTBEAT => {
                    let s = session.lock().await.seq;
                    let msg = json!({ "op": op::HEARTBEAT, "d": s }).to_string();
                    sink.lock().await.send(Message::Text(msg.into())).await?;
                }
                op::RECONNECT => {
                    info!("Gateway: server requested reconnect");
                    return Ok(());
                }
                op::INVALID_SESSION => {
                    if !data.as_bool().unwrap_or(false) {
                        *session.lock().await = Session::default();
                    }
                    warn!(resumable = data.as_bool().unwrap_or(false), "Gateway: invalid session");
                    return Err(GatewayError::InvalidSession);
                }
                op::HEARTBEAT_ACK => debug!("Gateway: heartbeat ack"),
                _ => {}
            }
        }
        Ok::<(), GatewayError>(())
    }
    .await;

    if let Some(task) = hb_task {
        task.abort();
    }
    result
}

fn spawn_heartbeat<S>(
    sink: Arc<Mutex<S>>,
    session: Arc<Mutex<Session>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    S: futures_util::Sink<Message> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let seq = session.lock().await.seq;
            let msg = json!({ "op": op::HEARTBEAT, "d": seq }).to_string();
            if sink.lock().await.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

fn close_result(frame: Option<CloseFrame>) -> Result<()> {
    match frame {
        Some(frame) if FATAL_CLOSE_CODES.contains(&u16::from(frame.code)) => Err(GatewayError::Fatal {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_owned(),
        }),
        Some(frame) => Err(GatewayError::Other(format!(
            "closed by server: {} {}",
            u16::from(frame.code),
            frame.reason.as_str()
        ))),
        None => Ok(()),
    }
}

/// Carry the configured query string (version, encoding) over to a resume URL.
fn with_query(resume: &str, configured: &str) -> String {
    match configured.split_once('?') {
        Some((_, query)) if !resume.contains('?') => {
            format!("{}/?{query}", resume.trim_end_matches('/'))
        }
        _ => resume.to_owned(),
    }
}
