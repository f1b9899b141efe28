#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lavaplay::prelude::*;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A single-connection stand-in for the audio server.
pub struct MockServer {
    pub port: u16,
    frames: mpsc::UnboundedReceiver<String>,
    push: mpsc::UnboundedSender<Message>,
    headers: Option<oneshot::Receiver<HeaderMap>>,
    closed: Option<oneshot::Receiver<()>>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::with_version(Some("3")).await
    }

    /// `None` leaves the version header out of the handshake response.
    pub async fn with_version(version: Option<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let port = listener.local_addr().expect("mock server address").port();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<Message>();
        let (headers_tx, headers) = oneshot::channel();
        let (closed_tx, closed) = oneshot::channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let callback = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
                let _ = headers_tx.send(request.headers().clone());
                if let Some(version) = version {
                    response
                        .headers_mut()
                        .insert("lavalink-major-version", HeaderValue::from_static(version));
                }
                Ok(response)
            };
            let Ok(ws) = accept_hdr_async(stream, callback).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = frames_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    outgoing = push_rx.recv() => match outgoing {
                        Some(message) => {
                            if write.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = closed_tx.send(());
        });

        Self {
            port,
            frames,
            push,
            headers: Some(headers),
            closed: Some(closed),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            hostname: "127.0.0.1".to_string(),
            port: self.port,
            reconnect_attempts: 0,
            handshake_timeout: WAIT,
            enable_resume: false,
            ..Config::default()
        }
    }

    /// Next frame the client sent, as JSON.
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("mock server stopped");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    pub async fn next_raw_frame(&mut self) -> String {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("mock server stopped")
    }

    /// Nothing else arrives within a short grace period.
    pub async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(200), self.frames.recv()).await;
        assert!(next.is_err(), "unexpected frame: {:?}", next);
    }

    pub async fn handshake_headers(&mut self) -> HeaderMap {
        let rx = self.headers.take().expect("headers already taken");
        tokio::time::timeout(WAIT, rx)
            .await
            .expect("timed out waiting for handshake")
            .expect("no handshake happened")
    }

    /// Waits for the client to close the connection or drop the transport.
    pub async fn wait_closed(&mut self) {
        let rx = self.closed.take().expect("already waited for close");
        tokio::time::timeout(WAIT, rx)
            .await
            .expect("client kept the connection open")
            .expect("mock server task panicked");
    }

    pub fn push(&self, frame: Value) {
        self.push_text(frame.to_string());
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let text: String = text.into();
        self.push
            .send(Message::Text(text.into()))
            .expect("mock server stopped");
    }

    pub fn close_connection(&self) {
        let _ = self.push.send(Message::Close(None));
    }
}

/// Voice gateway that remembers what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingVoice {
    pub joins: Arc<Mutex<Vec<(String, String)>>>,
    pub leaves: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl VoiceGateway for RecordingVoice {
    async fn join(&self, guild_id: &str, channel_id: &str, _self_deaf: bool) -> Result<(), ClientError> {
        self.joins
            .lock()
            .unwrap()
            .push((guild_id.to_string(), channel_id.to_string()));
        Ok(())
    }

    async fn leave(&self, guild_id: &str) -> Result<(), ClientError> {
        self.leaves.lock().unwrap().push(guild_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub server: MockServer,
    pub node: Node,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub voice: RecordingVoice,
}

/// A node connected to a fresh mock server.
pub async fn connected() -> Harness {
    init_logging();
    let server = MockServer::start().await;
    let voice = RecordingVoice::default();
    let (tx, events) = mpsc::unbounded_channel();
    let node = Node::builder(server.config(), "1000", voice.clone())
        .event_handler(tx)
        .build()
        .expect("build node");
    node.connect().await.expect("connect to mock server");
    Harness {
        server,
        node,
        events,
        voice,
    }
}

impl Harness {
    pub async fn next_event(&mut self) -> Event {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }
}

pub fn track(id: &str, length: u64) -> Track {
    Track {
        track: format!("encoded-{}", id),
        info: TrackInfo {
            identifier: id.to_string(),
            is_seekable: true,
            length,
            title: format!("Track {}", id),
            ..TrackInfo::default()
        },
    }
}
