//! Error types used across the library.

use thiserror::Error;

/// The error type returned by pretty much everything in the library.
///
/// Variants fall into three groups. Precondition failures like
/// [`PlayerNotReady`](ClientError::PlayerNotReady) or
/// [`VolumeOutOfRange`](ClientError::VolumeOutOfRange) come straight back from
/// the call that caused them and leave everything untouched. Transport failures
/// ([`WebSocket`](ClientError::WebSocket), [`NotConnected`](ClientError::NotConnected), ...)
/// mean the frame never made it to the server. Protocol violations
/// ([`MalformedFrame`](ClientError::MalformedFrame),
/// [`UnknownFrame`](ClientError::UnknownFrame), ...) are raised while reading and
/// take the connection down with them.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Not for bad status codes like 401 or 500 -- those show up as
    /// [`Api`](ClientError::Api). This is for transport-level stuff like
    /// DNS failures, TLS errors, timeouts, etc.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("timed out during websocket handshake")]
    Timeout,

    /// The write loop went away before it could report back on a send.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The string contains the status and body, like
    /// `"HTTP 401: Unauthorized"`.
    #[error("API error: {0}")]
    Api(String),

    #[error("not connected to the audio server")]
    NotConnected,

    #[error("already connected to the audio server")]
    AlreadyConnected,

    #[error("can't send an empty payload")]
    EmptyPayload,

    /// The server answered the handshake with a major version we don't speak,
    /// or didn't report one at all.
    #[error("unsupported protocol version {found:?}, expected {expected}")]
    ProtocolVersionMismatch {
        expected: &'static str,
        found: Option<String>,
    },

    #[error("voice channel id is empty")]
    InvalidChannel,

    #[error("no track given or loaded")]
    MissingTrack,

    #[error("volume {0} is outside 0..=1000")]
    VolumeOutOfRange(i32),

    /// The player hasn't been set up yet, or was closed.
    #[error("player is not ready, make sure it is connected to a voice channel")]
    PlayerNotReady,

    #[error("position {requested}ms is past the end of the track ({length}ms)")]
    PositionOutOfRange { requested: u64, length: u64 },

    #[error("current track is not seekable")]
    TrackNotSeekable,

    #[error("search query is empty")]
    EmptyQuery,

    #[error("malformed '{kind}' frame: {source}")]
    MalformedFrame {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown frame kind '{0}'")]
    UnknownFrame(String),

    #[error("unknown event type '{0}'")]
    UnknownEvent(String),

    #[error("unknown track end reason '{0}'")]
    UnknownEndReason(String),

    /// Joining or leaving through the voice gateway failed.
    #[error("Voice error: {0}")]
    Voice(String),
}

impl ClientError {
    /// Whether this error came from a frame the server should never have sent.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ClientError::MalformedFrame { .. }
                | ClientError::UnknownFrame(_)
                | ClientError::UnknownEvent(_)
                | ClientError::UnknownEndReason(_)
        )
    }
}
