use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::Stats;
use crate::player::Player;
use crate::protocol::TrackEndReason;

/// A player's position moved.
#[derive(Debug, Clone)]
pub struct PlayerUpdated {
    pub player: Arc<Player>,
    /// Milliseconds into the current track, if anything is playing.
    pub position: Option<u64>,
    /// Server clock, unix milliseconds.
    pub time: u64,
    /// Whether the server's voice connection for the guild is up.
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub struct TrackStarted {
    pub player: Arc<Player>,
    /// Encoded handle of the track, as reported by the server.
    pub track: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackEnded {
    pub player: Arc<Player>,
    pub track: Option<String>,
    pub reason: TrackEndReason,
}

#[derive(Debug, Clone)]
pub struct TrackException {
    pub player: Arc<Player>,
    pub track: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TrackStuck {
    pub player: Arc<Player>,
    pub track: Option<String>,
    pub threshold: Duration,
}

/// The server's voice connection for a guild was closed. This is about the
/// voice transport, not the connection to the audio server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketClosed {
    pub guild_id: String,
    /// 4xxx codes come from the voice server and are usually fatal.
    pub code: u16,
    pub reason: String,
    pub by_remote: bool,
}

/// The audio server closed the control connection. Nothing reconnects
/// automatically; call [`Node::connect`](crate::node::Node::connect) again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    pub code: u16,
    pub reason: String,
}

/// Everything a [`Node`](crate::node::Node) reports, as one type.
#[derive(Debug, Clone)]
pub enum Event {
    PlayerUpdated(PlayerUpdated),
    StatsReceived(Stats),
    TrackStarted(TrackStarted),
    TrackEnded(TrackEnded),
    TrackException(TrackException),
    TrackStuck(TrackStuck),
    WebSocketClosed(WebSocketClosed),
    Disconnected(Disconnected),
}

/// Receives events from the node's read loop.
///
/// Handlers run inline, one at a time and in the order the frames arrived.
/// A slow handler holds up every frame behind it, so hand long work off to a
/// task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_player_update(&self, event: PlayerUpdated) {
        let _ = event;
    }

    async fn on_stats(&self, stats: Stats) {
        let _ = stats;
    }

    async fn on_track_start(&self, event: TrackStarted) {
        let _ = event;
    }

    async fn on_track_end(&self, event: TrackEnded) {
        let _ = event;
    }

    async fn on_track_exception(&self, event: TrackException) {
        let _ = event;
    }

    async fn on_track_stuck(&self, event: TrackStuck) {
        let _ = event;
    }

    async fn on_websocket_closed(&self, event: WebSocketClosed) {
        let _ = event;
    }

    async fn on_disconnect(&self, event: Disconnected) {
        let _ = event;
    }
}

/// Forwards everything into a channel. Events are dropped once the receiver
/// is gone.
#[async_trait]
impl EventHandler for mpsc::UnboundedSender<Event> {
    async fn on_player_update(&self, event: PlayerUpdated) {
        let _ = self.send(Event::PlayerUpdated(event));
    }

    async fn on_stats(&self, stats: Stats) {
        let _ = self.send(Event::StatsReceived(stats));
    }

    async fn on_track_start(&self, event: TrackStarted) {
        let _ = self.send(Event::TrackStarted(event));
    }

    async fn on_track_end(&self, event: TrackEnded) {
        let _ = self.send(Event::TrackEnded(event));
    }

    async fn on_track_exception(&self, event: TrackException) {
        let _ = self.send(Event::TrackException(event));
    }

    async fn on_track_stuck(&self, event: TrackStuck) {
        let _ = self.send(Event::TrackStuck(event));
    }

    async fn on_websocket_closed(&self, event: WebSocketClosed) {
        let _ = self.send(Event::WebSocketClosed(event));
    }

    async fn on_disconnect(&self, event: Disconnected) {
        let _ = self.send(Event::Disconnected(event));
    }
}
