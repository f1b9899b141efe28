use serde::{Deserialize, Serialize};

/// What the audio server needs to route audio into a guild's voice channel.
///
/// `session_id` comes from the chat gateway's voice state update, `endpoint`
/// and `token` from the voice server update that usually follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSession {
    pub guild_id: String,
    pub session_id: String,
    pub endpoint: Option<String>,
    pub token: Option<String>,
}
