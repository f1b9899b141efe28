//! Client for the Lavalink audio server.
//!
//! A [`Node`](node::Node) holds the websocket to one server, keeps a
//! [`Player`](player::Player) per guild and turns what the server pushes into
//! [`events`](event::EventHandler).

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod model;
pub mod node;
pub mod player;
pub mod protocol;
pub mod socket;
pub mod voice;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::ClientError;
    pub use crate::event::{Event, EventHandler};
    pub use crate::model::voice::VoiceSession;
    pub use crate::model::*;
    pub use crate::node::{Node, NodeBuilder};
    pub use crate::player::{PlayArgs, Player, PlayerState};
    pub use crate::protocol::TrackEndReason;
    pub use crate::voice::{GatewayVoiceJoiner, VoiceGateway};
}
