//! The connection to one audio server and every player living on it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::Config;
use crate::error::ClientError;
use crate::event::{
    Disconnected, EventHandler, PlayerUpdated, TrackEnded, TrackException, TrackStarted, TrackStuck,
    WebSocketClosed,
};
use crate::http::Http;
use crate::model::voice::VoiceSession;
use crate::model::{SearchResult, SearchType, Stats};
use crate::player::{Player, PlayerState};
use crate::protocol::{self, Envelope, EventPayload, OutgoingFrame, PlayerUpdatePayload, TrackEndReason, VoiceServerEvent};
use crate::socket::{Frame, Socket, SocketHandler};
use crate::voice::VoiceGateway;

const USER_ID: &str = "user-id";
const NUM_SHARDS: &str = "num-shards";
const AUTHORIZATION: &str = "authorization";
const CLIENT_NAME: &str = "client-name";
const RESUME_KEY: &str = "resume-key";
const USER_AGENT: &str = "user-agent";

pub struct NodeBuilder {
    config: Config,
    user_id: String,
    shard_count: u64,
    voice: Arc<dyn VoiceGateway>,
    handler: Option<Arc<dyn EventHandler>>,
}

impl NodeBuilder {
    pub fn new(config: Config, user_id: impl Into<String>, voice: impl VoiceGateway + 'static) -> Self {
        Self {
            config,
            user_id: user_id.into(),
            shard_count: 1,
            voice: Arc::new(voice),
            handler: None,
        }
    }

    pub fn shard_count(mut self, shard_count: u64) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Node, ClientError> {
        let http = Http::new(
            &self.config.authorization,
            self.config.user_agent.as_deref(),
            self.config.http_endpoint(),
        )?;
        let socket = Arc::new(Socket::new(&self.config)?);
        Ok(Node {
            inner: Arc::new(NodeInner {
                config: self.config,
                user_id: self.user_id,
                shard_count: self.shard_count,
                socket,
                http,
                voice: self.voice,
                handler: self.handler,
                players: DashMap::new(),
                voice_sessions: DashMap::new(),
                stats: RwLock::new(None),
            }),
        })
    }
}

struct NodeInner {
    config: Config,
    user_id: String,
    shard_count: u64,
    socket: Arc<Socket>,
    http: Http,
    voice: Arc<dyn VoiceGateway>,
    handler: Option<Arc<dyn EventHandler>>,
    players: DashMap<String, Arc<Player>>,
    voice_sessions: DashMap<String, VoiceSession>,
    stats: RwLock<Option<Stats>>,
}

/// Routes frames from the audio server to players and event handlers, and
/// owns the guild to player registry.
///
/// Cheap to clone, every clone talks to the same connection.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

fn header(name: &'static str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let value = HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name))?;
    Ok((HeaderName::from_static(name), value))
}

impl Node {
    pub fn builder(config: Config, user_id: impl Into<String>, voice: impl VoiceGateway + 'static) -> NodeBuilder {
        NodeBuilder::new(config, user_id, voice)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.socket.is_connected()
    }

    pub fn socket(&self) -> &Socket {
        &self.inner.socket
    }

    /// Headers identifying this client on the websocket handshake.
    pub fn handshake_headers(&self) -> Result<HeaderMap, ClientError> {
        let config = &self.inner.config;
        let mut pairs = vec![
            header(USER_ID, &self.inner.user_id)?,
            header(NUM_SHARDS, &self.inner.shard_count.to_string())?,
            header(AUTHORIZATION, &config.authorization)?,
            header(CLIENT_NAME, &config.client_name)?,
        ];
        if config.enable_resume {
            pairs.push(header(RESUME_KEY, &config.resume_key)?);
        }
        if let Some(agent) = &config.user_agent {
            pairs.push(header(USER_AGENT, agent)?);
        }
        Ok(pairs.into_iter().collect())
    }

    /// Open the websocket, retrying per the config's reconnect settings.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let headers = self.handshake_headers()?;
        info!("Connecting to audio server at {}", self.inner.socket.url());
        self.inner
            .socket
            .connect(headers, Arc::new(self.clone()))
            .await
    }

    /// Close every player, forget all voice sessions and close the websocket.
    ///
    /// Without a connection to close this fails and leaves everything as it
    /// was.
    pub async fn close(&self) -> Result<(), ClientError> {
        if !self.inner.socket.has_transport().await {
            return Err(ClientError::NotConnected);
        }
        let players: Vec<Arc<Player>> = self
            .inner
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.inner.players.clear();
        self.inner.voice_sessions.clear();

        if self.is_connected() {
            for player in players {
                if let Err(e) = player.close().await {
                    warn!("[{}] Failed to close player: {}", player.guild_id(), e);
                }
            }
        }
        self.inner.socket.close().await
    }

    /// Get the guild's player, joining `channel_id` first if there isn't one.
    pub async fn join(&self, guild_id: &str, channel_id: &str) -> Result<Arc<Player>, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if channel_id.is_empty() {
            return Err(ClientError::InvalidChannel);
        }
        if let Some(player) = self.get_player(guild_id) {
            return Ok(player);
        }

        self.inner
            .voice
            .join(guild_id, channel_id, self.inner.config.self_deaf)
            .await?;

        // a concurrent join may have won the race, keep whichever got in first
        let player = self
            .inner
            .players
            .entry(guild_id.to_string())
            .or_insert_with(|| Arc::new(Player::new(guild_id, self.inner.socket.clone())))
            .value()
            .clone();
        info!("[{}] Joined voice channel {}", guild_id, channel_id);
        Ok(player)
    }

    /// Close and drop the guild's player. Nothing happens if there is none.
    pub async fn leave(&self, guild_id: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let Some((_, player)) = self.inner.players.remove(guild_id) else {
            return Ok(());
        };

        let closed = player.close().await;
        self.inner.voice.leave(guild_id).await?;
        info!("[{}] Left voice", guild_id);
        closed
    }

    pub fn has_player(&self, guild_id: &str) -> bool {
        self.inner.players.contains_key(guild_id)
    }

    pub fn get_player(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.inner
            .players
            .get(guild_id)
            .map(|player| player.value().clone())
    }

    pub fn player_count(&self) -> usize {
        self.inner.players.len()
    }

    /// The most recent statistics the server pushed.
    pub async fn stats(&self) -> Option<Stats> {
        self.inner.stats.read().await.clone()
    }

    pub fn voice_session(&self, guild_id: &str) -> Option<VoiceSession> {
        self.inner
            .voice_sessions
            .get(guild_id)
            .map(|session| session.value().clone())
    }

    pub async fn search(&self, search_type: SearchType, query: &str) -> Result<SearchResult, ClientError> {
        self.inner.http.load_tracks(search_type, query).await
    }

    /// Feed a voice state update from the chat gateway.
    ///
    /// Only updates about this bot's own user are kept.
    pub fn on_voice_state_update(
        &self,
        shard_user_id: &str,
        event_user_id: &str,
        guild_id: &str,
        session_id: &str,
    ) {
        if shard_user_id != event_user_id {
            return;
        }
        self.inner
            .voice_sessions
            .entry(guild_id.to_string())
            .and_modify(|session| session.session_id = session_id.to_string())
            .or_insert_with(|| VoiceSession {
                guild_id: guild_id.to_string(),
                session_id: session_id.to_string(),
                endpoint: None,
                token: None,
            });
    }

    /// Feed a voice server update from the chat gateway and hand the complete
    /// voice session to the audio server.
    ///
    /// If the matching voice state update hasn't arrived yet this does
    /// nothing.
    pub async fn on_voice_server_update(
        &self,
        guild_id: &str,
        endpoint: &str,
        token: &str,
    ) -> Result<(), ClientError> {
        let session = match self.inner.voice_sessions.get_mut(guild_id) {
            Some(mut session) => {
                session.endpoint = Some(endpoint.to_string());
                session.token = Some(token.to_string());
                session.clone()
            }
            None => {
                debug!("[{}] Voice server update before voice state, ignoring", guild_id);
                return Ok(());
            }
        };

        self.inner
            .socket
            .send_json(&OutgoingFrame::VoiceUpdate {
                guild_id,
                session_id: &session.session_id,
                event: VoiceServerEvent { token, endpoint },
            })
            .await
    }

    /// Decode one frame from the audio server and act on it.
    ///
    /// Anything malformed or of an unknown kind is an error; the read loop
    /// treats that as fatal for the connection.
    pub async fn on_frame_received(&self, data: &[u8]) -> Result<(), ClientError> {
        let envelope: Envelope = protocol::decode("envelope", data)?;

        match envelope.op.as_str() {
            protocol::STATS => {
                let stats: Stats = protocol::decode(protocol::STATS, data)?;
                *self.inner.stats.write().await = Some(stats.clone());
                if let Some(handler) = &self.inner.handler {
                    handler.on_stats(stats).await;
                }
            }
            protocol::PLAYER_UPDATE => {
                let payload: PlayerUpdatePayload = protocol::decode(protocol::PLAYER_UPDATE, data)?;
                let Some(player) = self.routed_player(envelope.guild_id.as_deref()) else {
                    return Ok(());
                };
                player.update_position(&payload.state).await;
                if let Some(handler) = &self.inner.handler {
                    handler
                        .on_player_update(PlayerUpdated {
                            player,
                            position: payload.state.position,
                            time: payload.state.time,
                            connected: payload.state.connected,
                        })
                        .await;
                }
            }
            protocol::EVENT => {
                let payload: EventPayload = protocol::decode(protocol::EVENT, data)?;
                self.route_event(envelope.guild_id, payload).await?;
            }
            other => return Err(ClientError::UnknownFrame(other.to_string())),
        }
        Ok(())
    }

    async fn route_event(&self, guild_id: Option<String>, event: EventPayload) -> Result<(), ClientError> {
        let handler = self.inner.handler.as_ref();

        match event.kind.as_str() {
            protocol::TRACK_START => {
                let Some(player) = self.routed_player(guild_id.as_deref()) else {
                    return Ok(());
                };
                player.set_state(PlayerState::Playing).await;
                if let Some(handler) = handler {
                    handler
                        .on_track_start(TrackStarted {
                            player,
                            track: event.track,
                        })
                        .await;
                }
            }
            protocol::TRACK_END => {
                let reason = TrackEndReason::parse(event.reason.as_deref().unwrap_or_default())?;
                let Some(player) = self.routed_player(guild_id.as_deref()) else {
                    return Ok(());
                };
                player.set_state(PlayerState::Stopped).await;
                if let Some(handler) = handler {
                    handler
                        .on_track_end(TrackEnded {
                            player,
                            track: event.track,
                            reason,
                        })
                        .await;
                }
            }
            protocol::TRACK_EXCEPTION => {
                let message = event
                    .error
                    .or_else(|| event.exception.and_then(|e| e.message))
                    .unwrap_or_default();
                let Some(player) = self.routed_player(guild_id.as_deref()) else {
                    return Ok(());
                };
                warn!("[{}] Track exception: {}", player.guild_id(), message);
                player.set_state(PlayerState::Stopped).await;
                if let Some(handler) = handler {
                    handler
                        .on_track_exception(TrackException {
                            player,
                            track: event.track,
                            message,
                        })
                        .await;
                }
            }
            protocol::TRACK_STUCK => {
                let threshold = Duration::from_millis(event.threshold_ms.unwrap_or_default());
                let Some(player) = self.routed_player(guild_id.as_deref()) else {
                    return Ok(());
                };
                warn!("[{}] Track stuck for {:?}", player.guild_id(), threshold);
                player.set_state(PlayerState::Stopped).await;
                if let Some(handler) = handler {
                    handler
                        .on_track_stuck(TrackStuck {
                            player,
                            track: event.track,
                            threshold,
                        })
                        .await;
                }
            }
            protocol::WEBSOCKET_CLOSED => {
                let closed = WebSocketClosed {
                    guild_id: guild_id.unwrap_or_default(),
                    code: event.code.unwrap_or_default(),
                    reason: event.reason.unwrap_or_default(),
                    by_remote: event.by_remote.unwrap_or_default(),
                };
                warn!(
                    "[{}] Voice websocket closed: {} {}",
                    closed.guild_id, closed.code, closed.reason
                );
                if let Some(handler) = handler {
                    handler.on_websocket_closed(closed).await;
                }
            }
            other => return Err(ClientError::UnknownEvent(other.to_string())),
        }
        Ok(())
    }

    /// The player a frame is addressed to. A missing one usually means it was
    /// just removed, so the frame is dropped.
    fn routed_player(&self, guild_id: Option<&str>) -> Option<Arc<Player>> {
        let guild_id = guild_id?;
        let player = self.get_player(guild_id);
        if player.is_none() {
            debug!("[{}] No player for frame, dropping it", guild_id);
        }
        player
    }
}

#[async_trait]
impl SocketHandler for Node {
    async fn on_open(&self) {
        let config = &self.inner.config;
        if !config.enable_resume {
            return;
        }
        let frame = OutgoingFrame::ConfigureResuming {
            key: &config.resume_key,
            timeout: config.resume_timeout.as_secs(),
        };
        if let Err(e) = self.inner.socket.send_json(&frame).await {
            warn!("Failed to configure resuming: {}", e);
        }
    }

    async fn on_frame(&self, frame: Frame) -> Result<(), ClientError> {
        match frame {
            Frame::Text(text) => self.on_frame_received(text.as_bytes()).await,
            Frame::Closed { code, reason } => {
                if let Some(handler) = &self.inner.handler {
                    handler.on_disconnect(Disconnected { code, reason }).await;
                }
                Ok(())
            }
        }
    }

    async fn on_error(&self, err: ClientError) {
        error!("Connection to {} failed: {}", self.inner.socket.url(), err);
    }
}
