//! The websocket to the audio server.
//!
//! [`Socket`] knows nothing about what travels over it. It dials with retries,
//! funnels every outgoing frame through one write loop, and hands every
//! incoming frame to a [`SocketHandler`] from one read loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::error::ClientError;

pub const PROTOCOL_VERSION_HEADER: &str = "Lavalink-Major-Version";
pub const SUPPORTED_MAJOR_VERSION: &str = "3";

/// Status code used when the server closes without giving one.
const NO_STATUS_RECEIVED: u16 = 1005;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something the read loop received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// The server closed the connection. Nothing else arrives after this.
    Closed { code: u16, reason: String },
}

#[async_trait]
pub trait SocketHandler: Send + Sync {
    /// Runs once the connection is up and both loops are running, so it may
    /// already [`send`](Socket::send).
    async fn on_open(&self) {}

    /// Called once per frame, in the order frames arrived. Returning an error
    /// stops the read loop and marks the socket disconnected.
    async fn on_frame(&self, frame: Frame) -> Result<(), ClientError>;

    async fn on_error(&self, err: ClientError) {
        let _ = err;
    }
}

/// Wait before retry number `attempt` (1-based).
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit * attempt
}

struct Outgoing {
    payload: String,
    done: oneshot::Sender<Result<(), ClientError>>,
}

struct Live {
    tx: mpsc::Sender<Outgoing>,
    writer: JoinHandle<()>,
    /// Stops both loops and closes the transport.
    transport: CancellationToken,
    /// Stops only the read loop. Child of `transport`.
    reader: CancellationToken,
}

pub struct Socket {
    url: Url,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    handshake_timeout: Duration,
    connected: Arc<AtomicBool>,
    attempts: AtomicU32,
    dialing: Mutex<()>,
    live: Mutex<Option<Live>>,
}

impl Socket {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        Ok(Self {
            url: config.socket_endpoint()?,
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: config.reconnect_delay,
            handshake_timeout: config.handshake_timeout,
            connected: Arc::new(AtomicBool::new(false)),
            attempts: AtomicU32::new(0),
            dialing: Mutex::new(()),
            live: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Retries made by the last [`connect`](Self::connect) call.
    pub fn connection_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// How long the last retry waited.
    pub fn reconnect_interval(&self) -> Duration {
        backoff_delay(self.reconnect_delay, self.connection_attempts())
    }

    /// Dial the server, retrying transport failures with a growing delay.
    ///
    /// A wrong protocol version is never retried. Once this returns `Ok` the
    /// read loop is feeding `handler` and [`SocketHandler::on_open`] has run.
    /// Drops after this point are reported through the handler, not retried.
    pub async fn connect(
        &self,
        headers: HeaderMap,
        handler: Arc<dyn SocketHandler>,
    ) -> Result<(), ClientError> {
        let _dialing = self.dialing.lock().await;
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        let stale = self.live.lock().await.take();
        if let Some(stale) = stale {
            // the read loop stopped on its own, clear out what's left
            stale.transport.cancel();
            drop(stale.tx);
            let _ = stale.writer.await;
        }

        if self.url.scheme() == "wss" {
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        self.attempts.store(0, Ordering::SeqCst);
        let stream = loop {
            match self.dial(&headers).await {
                Ok(stream) => break stream,
                Err(err @ ClientError::ProtocolVersionMismatch { .. }) => return Err(err),
                Err(err) => {
                    let attempt = self.attempts.load(Ordering::SeqCst);
                    if attempt >= self.reconnect_attempts {
                        error!("Giving up on {} after {} retries: {}", self.url, attempt, err);
                        return Err(err);
                    }
                    let attempt = attempt + 1;
                    self.attempts.store(attempt, Ordering::SeqCst);
                    let wait = backoff_delay(self.reconnect_delay, attempt);
                    warn!(
                        "Connecting to {} failed ({}), retry {}/{} in {:?}",
                        self.url, err, attempt, self.reconnect_attempts, wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        };

        let (write, read) = stream.split();
        let (tx, rx) = mpsc::channel::<Outgoing>(32);
        let transport = CancellationToken::new();
        let reader = transport.child_token();

        let writer = tokio::spawn(write_loop(write, rx, transport.clone()));
        *self.live.lock().await = Some(Live {
            tx,
            writer,
            transport: transport.clone(),
            reader: reader.clone(),
        });
        self.connected.store(true, Ordering::SeqCst);
        tokio::spawn(read_loop(
            read,
            handler.clone(),
            self.connected.clone(),
            transport,
            reader,
        ));

        info!("Connected to {}", self.url);
        handler.on_open().await;
        Ok(())
    }

    async fn dial(&self, headers: &HeaderMap) -> Result<WsStream, ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().extend(headers.clone());

        let (stream, response) = tokio::time::timeout(self.handshake_timeout, connect_async(request))
            .await
            .map_err(|_| ClientError::Timeout)??;

        let found = response
            .headers()
            .get(PROTOCOL_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if found.as_deref() != Some(SUPPORTED_MAJOR_VERSION) {
            return Err(ClientError::ProtocolVersionMismatch {
                expected: SUPPORTED_MAJOR_VERSION,
                found,
            });
        }
        Ok(stream)
    }

    /// Queue `payload` behind every earlier send and wait until it has been
    /// written.
    pub async fn send(&self, payload: impl Into<String>) -> Result<(), ClientError> {
        let payload = payload.into();
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if payload.is_empty() {
            return Err(ClientError::EmptyPayload);
        }

        let tx = self
            .live
            .lock()
            .await
            .as_ref()
            .map(|live| live.tx.clone())
            .ok_or(ClientError::NotConnected)?;

        let (done, result) = oneshot::channel();
        tx.send(Outgoing { payload, done })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        result.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let payload = serde_json::to_string(value)?;
        self.send(payload).await
    }

    /// Whether there is a connection for [`close`](Self::close) to tear down,
    /// including one whose read loop already stopped.
    pub async fn has_transport(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Stop accepting sends, flush what's queued and close the connection.
    ///
    /// Fails with [`NotConnected`](ClientError::NotConnected) if there is
    /// nothing to close, including on a second call.
    pub async fn close(&self) -> Result<(), ClientError> {
        let live = self
            .live
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;
        self.connected.store(false, Ordering::SeqCst);

        live.reader.cancel();
        drop(live.tx);
        if let Err(e) = live.writer.await {
            warn!("Write loop ended abnormally: {}", e);
        }
        info!("Closed connection to {}", self.url);
        Ok(())
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut rx: mpsc::Receiver<Outgoing>,
    transport: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = transport.cancelled() => break,
            next = rx.recv() => next,
        };
        let Some(Outgoing { payload, done }) = next else {
            break;
        };
        debug!("-> {}", payload);
        let result = sink
            .send(WsMessage::Text(payload.into()))
            .await
            .map_err(ClientError::from);
        let _ = done.send(result);
    }
    if let Err(e) = sink.close().await {
        debug!("Closing websocket: {}", e);
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    handler: Arc<dyn SocketHandler>,
    connected: Arc<AtomicBool>,
    transport: CancellationToken,
    reader: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = reader.cancelled() => return,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(WsMessage::Text(text))) => {
                debug!("<- {}", text.as_str());
                if let Err(err) = handler.on_frame(Frame::Text(text.as_str().to_owned())).await {
                    error!("Dropping connection: {}", err);
                    connected.store(false, Ordering::SeqCst);
                    handler.on_error(err).await;
                    break;
                }
            }
            Some(Ok(WsMessage::Close(frame))) => {
                connected.store(false, Ordering::SeqCst);
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                    .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                warn!("Server closed the connection: {} {}", code, reason);
                if let Err(err) = handler.on_frame(Frame::Closed { code, reason }).await {
                    handler.on_error(err).await;
                }
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                connected.store(false, Ordering::SeqCst);
                handler.on_error(e.into()).await;
                break;
            }
            None => {
                connected.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
    // nothing more will be read, take the write half down with us
    transport.cancel();
}
