//! Joining and leaving voice channels through the chat gateway.
//!
//! The node never talks to the chat platform itself. It asks a
//! [`VoiceGateway`] to move the bot into a channel, and the platform answers
//! with voice state and voice server updates that the owner feeds back into
//! [`Node::on_voice_state_update`](crate::node::Node::on_voice_state_update)
//! and [`Node::on_voice_server_update`](crate::node::Node::on_voice_server_update).

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Opcode of a voice state update sent to the chat gateway.
const VOICE_STATE_UPDATE: u8 = 4;

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild_id: &str, channel_id: &str, self_deaf: bool) -> Result<(), ClientError>;

    async fn leave(&self, guild_id: &str) -> Result<(), ClientError> {
        let _ = guild_id;
        Ok(())
    }
}

/// Writes voice state updates into the channel feeding the chat gateway
/// connection.
#[derive(Debug, Clone)]
pub struct GatewayVoiceJoiner {
    gateway_tx: mpsc::Sender<String>,
}

impl GatewayVoiceJoiner {
    pub fn new(gateway_tx: mpsc::Sender<String>) -> Self {
        Self { gateway_tx }
    }

    async fn update_voice_state(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
        self_deaf: bool,
    ) -> Result<(), ClientError> {
        let payload = json!({
            "op": VOICE_STATE_UPDATE,
            "d": {
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": false,
                "self_deaf": self_deaf
            }
        });
        self.gateway_tx
            .send(payload.to_string())
            .await
            .map_err(|e| ClientError::Voice(e.to_string()))
    }
}

#[async_trait]
impl VoiceGateway for GatewayVoiceJoiner {
    async fn join(&self, guild_id: &str, channel_id: &str, self_deaf: bool) -> Result<(), ClientError> {
        self.update_voice_state(guild_id, Some(channel_id), self_deaf)
            .await
    }

    async fn leave(&self, guild_id: &str) -> Result<(), ClientError> {
        self.update_voice_state(guild_id, None, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_and_leave_send_voice_state_updates() {
        let (tx, mut rx) = mpsc::channel(4);
        let joiner = GatewayVoiceJoiner::new(tx);

        joiner.join("1", "2", true).await.unwrap();
        joiner.leave("1").await.unwrap();

        let join: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(join["op"], 4);
        assert_eq!(join["d"]["channel_id"], "2");
        assert_eq!(join["d"]["self_deaf"], true);

        let leave: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert!(leave["d"]["channel_id"].is_null());
    }

    #[tokio::test]
    async fn closed_gateway_is_a_voice_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let joiner = GatewayVoiceJoiner::new(tx);
        assert!(matches!(
            joiner.join("1", "2", false).await,
            Err(ClientError::Voice(_))
        ));
    }
}
