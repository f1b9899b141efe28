//! JSON frames exchanged over the control websocket.
//!
//! Outgoing frames are one tagged enum so every command serializes the same
//! way. Incoming frames are decoded in two steps: a small [`Envelope`] to find
//! out what arrived, then the payload for that kind.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Commands sent to the audio server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutgoingFrame<'a> {
    VoiceUpdate {
        guild_id: &'a str,
        session_id: &'a str,
        event: VoiceServerEvent<'a>,
    },
    ConfigureResuming {
        key: &'a str,
        /// Seconds.
        timeout: u64,
    },
    Play {
        guild_id: &'a str,
        track: &'a str,
        no_replace: bool,
        /// Milliseconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        start_time: Option<u64>,
        /// Milliseconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<u64>,
        volume: i32,
        pause: bool,
    },
    Stop {
        guild_id: &'a str,
    },
    Pause {
        guild_id: &'a str,
        pause: bool,
    },
    Seek {
        guild_id: &'a str,
        /// Milliseconds.
        position: u64,
    },
    Volume {
        guild_id: &'a str,
        volume: i32,
    },
    Destroy {
        guild_id: &'a str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceServerEvent<'a> {
    pub token: &'a str,
    pub endpoint: &'a str,
}

pub(crate) const STATS: &str = "stats";
pub(crate) const PLAYER_UPDATE: &str = "playerUpdate";
pub(crate) const EVENT: &str = "event";

pub(crate) const TRACK_START: &str = "TrackStartEvent";
pub(crate) const TRACK_END: &str = "TrackEndEvent";
pub(crate) const TRACK_EXCEPTION: &str = "TrackExceptionEvent";
pub(crate) const TRACK_STUCK: &str = "TrackStuckEvent";
pub(crate) const WEBSOCKET_CLOSED: &str = "WebSocketClosedEvent";

/// Just enough of an incoming frame to route it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub op: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayerUpdatePayload {
    pub state: PlayerUpdateState,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct PlayerUpdateState {
    /// Server clock, unix milliseconds.
    #[serde(default)]
    pub time: u64,
    /// Absent while nothing is playing.
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub connected: bool,
}

/// Every `event` frame, whatever its type. Which fields are present depends
/// on `kind`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub track: Option<String>,
    /// Track end reason, or the close reason of a voice websocket.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub exception: Option<ExceptionPayload>,
    #[serde(default)]
    pub threshold_ms: Option<u64>,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub by_remote: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExceptionPayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// Decode a frame's payload, tagging failures with the frame kind.
pub(crate) fn decode<'de, T: Deserialize<'de>>(kind: &str, data: &'de [u8]) -> Result<T, ClientError> {
    serde_json::from_slice(data).map_err(|source| ClientError::MalformedFrame {
        kind: kind.to_string(),
        source,
    })
}

/// Why a track stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndReason {
    /// The track reached its end, or emitted a terminator after an exception.
    Finished,
    /// The track failed before producing any audio.
    LoadFailed,
    /// The player was stopped.
    Stopped,
    /// Another track was started in its place.
    Replaced,
    /// The server's cleanup threshold kicked in, usually a leaked player.
    Cleanup,
}

impl TrackEndReason {
    /// Accepts the single character codes (`F`, `L`, ...) as well as the
    /// spelled out names (`FINISHED`, `LOAD_FAILED`, ...).
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let reason = match raw {
            "F" | "FINISHED" => TrackEndReason::Finished,
            "L" | "LOAD_FAILED" => TrackEndReason::LoadFailed,
            "S" | "STOPPED" => TrackEndReason::Stopped,
            "R" | "REPLACED" => TrackEndReason::Replaced,
            "C" | "CLEANUP" => TrackEndReason::Cleanup,
            other => return Err(ClientError::UnknownEndReason(other.to_string())),
        };
        Ok(reason)
    }

    pub fn code(self) -> char {
        match self {
            TrackEndReason::Finished => 'F',
            TrackEndReason::LoadFailed => 'L',
            TrackEndReason::Stopped => 'S',
            TrackEndReason::Replaced => 'R',
            TrackEndReason::Cleanup => 'C',
        }
    }

    /// Whether it makes sense to start the next queued track.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}
