//! Server side of one Socket.IO session on the push channel.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use potholecore::channel::{EnginePacket, Handshake, PushEnvelope, SocketPacket};
use potholecore::SyncResult;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use warp::ws::{Message, WebSocket};

const MAX_PAYLOAD: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub greeting: Option<String>,
}

/// `42["message", <envelope json>]` frame for a broadcast envelope.
pub fn message_frame(envelope_json: &str) -> SyncResult<String> {
    EnginePacket::Message(SocketPacket::event(
        "message",
        vec![Value::String(envelope_json.to_string())],
    ))
    .encode()
}

pub fn open_frame(sid: &str, config: &SessionConfig) -> SyncResult<String> {
    EnginePacket::Open(Handshake {
        sid: sid.to_string(),
        upgrades: Vec::new(),
        ping_interval: config.ping_interval.as_millis() as u64,
        ping_timeout: config.ping_timeout.as_millis() as u64,
        max_payload: MAX_PAYLOAD,
    })
    .encode()
}

fn new_sid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

pub async fn run_session(
    socket: WebSocket,
    mut events: broadcast::Receiver<String>,
    config: SessionConfig,
) {
    let sid = new_sid();
    let (mut tx, mut rx) = socket.split();

    macro_rules! send_frame {
        ($frame:expr) => {
            match $frame {
                Ok(text) => {
                    if let Err(err) = tx.send(Message::text(text)).await {
                        debug!("[feed] session {sid} send failed: {err}");
                        return;
                    }
                }
                Err(err) => {
                    warn!("[feed] session {sid} could not encode frame: {err}");
                    return;
                }
            }
        };
    }

    send_frame!(open_frame(&sid, &config));

    let connected = timeout(config.ping_timeout, async {
        while let Some(Ok(message)) = rx.next().await {
            let Ok(text) = message.to_str() else { continue };
            if let Ok(EnginePacket::Message(SocketPacket::Connect { .. })) =
                EnginePacket::decode(text)
            {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    if !connected {
        info!("[feed] session {sid} never joined the namespace");
        return;
    }

    let ack = SocketPacket::connect(Some(json!({ "sid": sid.as_str() })));
    send_frame!(EnginePacket::Message(ack).encode());
    info!("[feed] session {sid} connected");

    if let Some(greeting) = config.greeting.as_deref() {
        let envelope = PushEnvelope::simple_text(greeting).to_json();
        send_frame!(envelope.and_then(|json| message_frame(&json)));
    }

    let mut heartbeat = interval(config.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(envelope_json) => send_frame!(message_frame(&envelope_json)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[feed] session {sid} lagged, skipped {skipped} messages");
                }
                Err(RecvError::Closed) => break,
            },
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > config.ping_interval + config.ping_timeout {
                    info!("[feed] session {sid} missed heartbeat");
                    break;
                }
                send_frame!(EnginePacket::Ping.encode());
            }
            incoming = rx.next() => match incoming {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(message)) => {
                    let Ok(text) = message.to_str() else { continue };
                    match EnginePacket::decode(text) {
                        Ok(EnginePacket::Pong) => last_pong = Instant::now(),
                        Ok(EnginePacket::Close)
                        | Ok(EnginePacket::Message(SocketPacket::Disconnect { .. })) => break,
                        Ok(other) => debug!("[feed] session {sid} ignoring {other:?}"),
                        Err(err) => debug!("[feed] session {sid} bad frame: {err}"),
                    }
                }
                Some(Err(err)) => {
                    debug!("[feed] session {sid} socket error: {err}");
                    break;
                }
                None => break,
            },
        }
    }

    let _ = tx.close().await;
    info!("[feed] session {sid} closed");
}
