use super::packet::{EnginePacket, Handshake, SocketPacket};
use super::{ChannelEvent, PushChannel, Signal, SignalRegistry};
use crate::config::ChannelConfig;
use crate::prelude::{SyncError, SyncResult};
use crate::telemetry::LogManager;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO client over a WebSocket transport.
///
/// Nothing is connected until the first call to `next_event`. A lost socket
/// surfaces `Disconnected` and is re-opened after the configured delay.
pub struct SocketChannel {
    config: ChannelConfig,
    registry: SignalRegistry,
    stream: Option<WsStream>,
    pending: VecDeque<ChannelEvent>,
    /// `pingInterval + pingTimeout` of the live session.
    heartbeat: Option<Duration>,
    failed_attempts: u32,
    closed: bool,
    logger: LogManager,
}

impl SocketChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            registry: SignalRegistry::new(),
            stream: None,
            pending: VecDeque::new(),
            heartbeat: None,
            failed_attempts: 0,
            closed: false,
            logger: LogManager::new("channel"),
        }
    }

    /// Transport URL derived from the configured channel address.
    pub fn transport_url(&self) -> String {
        transport_url(&self.config.url)
    }

    async fn open(&self) -> SyncResult<(WsStream, Handshake)> {
        let url = self.transport_url();
        let (mut stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| SyncError::Channel(format!("connecting {url}: {err}")))?;

        let handshake = loop {
            match read_packet(&mut stream).await? {
                EnginePacket::Open(handshake) => {
                    self.logger.debug(&format!(
                        "engine open sid={} ping={}ms timeout={}ms",
                        handshake.sid, handshake.ping_interval, handshake.ping_timeout
                    ));
                    break handshake;
                }
                EnginePacket::Noop => continue,
                other => {
                    return Err(SyncError::Channel(format!(
                        "expected open packet, got {other:?}"
                    )))
                }
            }
        };

        send_packet(&mut stream, &EnginePacket::Message(SocketPacket::connect(None))).await?;

        loop {
            match read_packet(&mut stream).await? {
                EnginePacket::Message(SocketPacket::Connect { .. }) => {
                    return Ok((stream, handshake))
                }
                EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                    return Err(SyncError::Channel(format!(
                        "connect refused: {}",
                        data.map(|d| d.to_string()).unwrap_or_default()
                    )))
                }
                EnginePacket::Ping => send_packet(&mut stream, &EnginePacket::Pong).await?,
                EnginePacket::Close => {
                    return Err(SyncError::Channel("closed during handshake".into()))
                }
                _ => continue,
            }
        }
    }

    async fn connect_with_retry(&mut self) -> bool {
        loop {
            if self.closed {
                return false;
            }
            if let Some(limit) = self.config.max_reconnect_attempts {
                if self.failed_attempts > limit {
                    self.logger.warn(&format!(
                        "giving up on {} after {} attempts",
                        self.config.url, self.failed_attempts
                    ));
                    self.closed = true;
                    return false;
                }
            }
            if self.failed_attempts > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.reconnect_delay_ms)).await;
            }
            match self.open().await {
                Ok((stream, handshake)) => {
                    let window = handshake.ping_interval.saturating_add(handshake.ping_timeout);
                    self.heartbeat = (window > 0).then_some(Duration::from_millis(window));
                    self.stream = Some(stream);
                    self.failed_attempts = 0;
                    self.logger.record(&format!("connected to {}", self.config.url));
                    self.pending.push_back(ChannelEvent::Connected);
                    return true;
                }
                Err(err) => {
                    self.failed_attempts += 1;
                    self.logger.warn(&format!("connect attempt {} failed: {err}", self.failed_attempts));
                }
            }
        }
    }

    fn drop_stream(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            self.logger.record(&format!("disconnected: {reason}"));
            self.pending.push_back(ChannelEvent::Disconnected);
            // A lost connection waits one delay before the next attempt.
            self.failed_attempts = self.failed_attempts.max(1);
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(err) => {
                self.logger.warn(&format!("dropping frame: {err}"));
                return;
            }
        };
        match packet {
            EnginePacket::Ping => {
                if let Some(stream) = self.stream.as_mut() {
                    if let Err(err) = send_packet(stream, &EnginePacket::Pong).await {
                        self.drop_stream(&err.to_string());
                        return;
                    }
                }
                self.pending.push_back(ChannelEvent::Pong);
            }
            EnginePacket::Close => self.drop_stream("server closed the session"),
            EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
                self.drop_stream("server disconnected the namespace")
            }
            EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
                if name == Signal::Message.event_name() {
                    match args.into_iter().next() {
                        Some(Value::String(text)) => {
                            self.pending.push_back(ChannelEvent::Message(text))
                        }
                        Some(other) => self
                            .pending
                            .push_back(ChannelEvent::Message(other.to_string())),
                        None => self.logger.warn("message event without payload"),
                    }
                } else {
                    self.logger.debug(&format!("ignoring event {name}"));
                }
            }
            other => self.logger.debug(&format!("ignoring packet {other:?}")),
        }
    }
}

impl PushChannel for SocketChannel {
    fn subscribe(&mut self, signal: Signal) {
        self.registry.subscribe(signal);
    }

    fn unsubscribe(&mut self, signal: Signal) {
        self.registry.unsubscribe(signal);
        if self.registry.is_empty() {
            self.logger.debug("no signals subscribed");
        }
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if self.registry.allows(event.signal()) {
                    return Some(event);
                }
                continue;
            }
            if self.closed {
                return None;
            }

            // A server that stops pinging is treated as gone.
            let polled = match self.stream.as_mut() {
                Some(stream) => match self.heartbeat {
                    Some(window) => tokio::time::timeout(window, stream.next()).await.ok(),
                    None => Some(stream.next().await),
                },
                None => {
                    if !self.connect_with_retry().await {
                        return None;
                    }
                    continue;
                }
            };
            let Some(frame) = polled else {
                self.drop_stream("no ping within the heartbeat window");
                continue;
            };

            match frame {
                Some(Ok(WsMessage::Text(text))) => self.handle_text(&text).await,
                Some(Ok(WsMessage::Close(_))) | None => self.drop_stream("socket closed"),
                Some(Ok(_)) => {}
                Some(Err(err)) => self.drop_stream(&err.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        if let Some(mut stream) = self.stream.take() {
            let disconnect = EnginePacket::Message(SocketPacket::Disconnect {
                namespace: super::packet::DEFAULT_NAMESPACE.to_string(),
            });
            if let Err(err) = send_packet(&mut stream, &disconnect).await {
                self.logger.debug(&format!("disconnect not delivered: {err}"));
            }
            let _ = stream.close(None).await;
        }
        self.pending.clear();
    }
}

/// Appends the Socket.IO transport path to a bare channel address.
pub fn transport_url(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.contains("/socket.io") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/socket.io/?EIO=4&transport=websocket")
    }
}

async fn read_packet(stream: &mut WsStream) -> SyncResult<EnginePacket> {
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => return EnginePacket::decode(&text),
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(SyncError::Channel("socket closed".into()))
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(SyncError::Channel(err.to_string())),
        }
    }
}

async fn send_packet(stream: &mut WsStream, packet: &EnginePacket) -> SyncResult<()> {
    stream
        .send(WsMessage::text(packet.encode()?))
        .await
        .map_err(|err| SyncError::Channel(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PushEnvelope;
    use std::future::Future;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_async;

    type ServerSocket = WebSocketStream<TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    /// Accepts one client on a local port and hands its socket to `script`.
    async fn local_server<F, Fut>(script: F) -> (ChannelConfig, JoinHandle<()>)
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let socket = accept_async(tcp).await.unwrap();
            script(socket).await;
        });
        let config = ChannelConfig {
            url: format!("ws://{addr}"),
            reconnect_delay_ms: 10,
            max_reconnect_attempts: Some(0),
        };
        (config, server)
    }

    async fn send_text(socket: &mut ServerSocket, text: &str) {
        socket.send(WsMessage::text(text)).await.unwrap();
    }

    async fn recv_text(socket: &mut ServerSocket) -> String {
        loop {
            if let WsMessage::Text(text) = socket.next().await.unwrap().unwrap() {
                return text;
            }
        }
    }

    /// Server half of the open, `40`, connect-ack exchange.
    async fn accept_session(socket: &mut ServerSocket, ping_ms: u64) {
        let open = format!(
            r#"0{{"sid":"s1","upgrades":[],"pingInterval":{ping_ms},"pingTimeout":{ping_ms},"maxPayload":1000000}}"#
        );
        send_text(socket, &open).await;
        assert_eq!(recv_text(socket).await, "40");
        send_text(socket, r#"40{"sid":"n1"}"#).await;
    }

    /// Keeps the socket open until the client goes away.
    async fn hold(socket: &mut ServerSocket) {
        while let Some(Ok(_)) = socket.next().await {}
    }

    fn subscribed(config: ChannelConfig) -> SocketChannel {
        let mut channel = SocketChannel::new(config);
        for signal in Signal::ALL {
            channel.subscribe(signal);
        }
        channel
    }

    async fn next(channel: &mut SocketChannel) -> Option<ChannelEvent> {
        tokio::time::timeout(WAIT, channel.next_event())
            .await
            .unwrap()
    }

    #[test]
    fn transport_url_appends_socket_io_path() {
        assert_eq!(
            transport_url("ws://localhost:3030"),
            "ws://localhost:3030/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            transport_url("ws://localhost:3030/"),
            "ws://localhost:3030/socket.io/?EIO=4&transport=websocket"
        );
        let explicit = "wss://feed.example/socket.io/?EIO=4&transport=websocket";
        assert_eq!(transport_url(explicit), explicit);
    }

    #[tokio::test]
    async fn message_event_arrives_after_handshake() {
        let payload = PushEnvelope::simple_text("hello").to_json().unwrap();
        let frame = serde_json::json!(["message", payload.clone()]).to_string();
        let (config, server) = local_server(move |mut socket| async move {
            accept_session(&mut socket, 25_000).await;
            send_text(&mut socket, &format!("42{frame}")).await;
            hold(&mut socket).await;
        })
        .await;

        let mut channel = subscribed(config);
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Connected));
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Message(payload)));
        channel.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_ping_is_answered_with_pong() {
        let (config, server) = local_server(|mut socket| async move {
            accept_session(&mut socket, 25_000).await;
            send_text(&mut socket, "2").await;
            assert_eq!(recv_text(&mut socket).await, "3");
        })
        .await;

        let mut channel = subscribed(config);
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Connected));
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Pong));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_close_surfaces_disconnect_then_gives_up() {
        for goodbye in ["41", "1"] {
            let (config, server) = local_server(move |mut socket| async move {
                accept_session(&mut socket, 25_000).await;
                send_text(&mut socket, goodbye).await;
                hold(&mut socket).await;
            })
            .await;

            let mut channel = subscribed(config);
            assert_eq!(next(&mut channel).await, Some(ChannelEvent::Connected));
            assert_eq!(next(&mut channel).await, Some(ChannelEvent::Disconnected));
            // max_reconnect_attempts = 0: no second session.
            assert_eq!(next(&mut channel).await, None);
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn silent_server_is_dropped_after_heartbeat_window() {
        let (config, server) = local_server(|mut socket| async move {
            accept_session(&mut socket, 50).await;
            hold(&mut socket).await;
        })
        .await;

        let mut channel = subscribed(config);
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Connected));
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Disconnected));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_error_counts_as_failed_attempt() {
        let (config, server) = local_server(|mut socket| async move {
            let open = r#"0{"sid":"s1","pingInterval":25000,"pingTimeout":20000}"#;
            send_text(&mut socket, open).await;
            assert_eq!(recv_text(&mut socket).await, "40");
            send_text(&mut socket, r#"44{"message":"Not authorized"}"#).await;
        })
        .await;

        let mut channel = subscribed(config);
        assert_eq!(next(&mut channel).await, None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_stops_at_attempt_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = subscribed(ChannelConfig {
            url: format!("ws://{addr}"),
            reconnect_delay_ms: 10,
            max_reconnect_attempts: Some(1),
        });
        assert_eq!(next(&mut channel).await, None);
    }

    #[tokio::test]
    async fn unsubscribed_signals_are_filtered() {
        let (config, server) = local_server(|mut socket| async move {
            accept_session(&mut socket, 25_000).await;
            send_text(&mut socket, "2").await;
            send_text(&mut socket, "41").await;
            hold(&mut socket).await;
        })
        .await;

        let mut channel = SocketChannel::new(config);
        channel.subscribe(Signal::Disconnect);
        assert_eq!(next(&mut channel).await, Some(ChannelEvent::Disconnected));
        assert_eq!(next(&mut channel).await, None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_channel_yields_nothing() {
        let mut channel = subscribed(ChannelConfig::default());
        channel.close().await;
        assert_eq!(channel.next_event().await, None);
    }
}
