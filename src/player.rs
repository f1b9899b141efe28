use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::model::Track;
use crate::protocol::{OutgoingFrame, PlayerUpdateState};
use crate::socket::Socket;

pub const DEFAULT_VOLUME: i32 = 100;
pub const MAX_VOLUME: i32 = 1000;

/// What a [`Player`] is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Freshly created, or closed. Nothing but `play`, `stop` and `close`
    /// work in this state.
    #[default]
    None,
    Playing,
    Paused,
    Stopped,
}

/// Arguments for [`Player::play`].
#[derive(Debug, Clone)]
pub struct PlayArgs {
    pub track: Option<Track>,
    /// Leave the current track alone if one is playing.
    pub no_replace: bool,
    pub volume: i32,
    /// Load the track but don't start it yet.
    pub pause: bool,
    pub start_time: Option<Duration>,
    pub end_time: Option<Duration>,
}

impl Default for PlayArgs {
    fn default() -> Self {
        Self {
            track: None,
            no_replace: false,
            volume: DEFAULT_VOLUME,
            pause: false,
            start_time: None,
            end_time: None,
        }
    }
}

impl PlayArgs {
    pub fn new(track: Track) -> Self {
        Self {
            track: Some(track),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct PlayerInner {
    state: PlayerState,
    track: Option<Track>,
    queue: VecDeque<Track>,
    volume: i32,
    last_update: u64,
}

/// Playback state and command surface for one guild.
///
/// Every command updates the local state first and then sends its frame, so
/// nobody can see a command on the wire that isn't reflected here yet. The
/// state lock is never held across a send.
pub struct Player {
    guild_id: String,
    socket: Arc<Socket>,
    inner: Mutex<PlayerInner>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn check_volume(volume: i32) -> Result<(), ClientError> {
    if !(0..=MAX_VOLUME).contains(&volume) {
        return Err(ClientError::VolumeOutOfRange(volume));
    }
    Ok(())
}

impl Player {
    pub(crate) fn new(guild_id: impl Into<String>, socket: Arc<Socket>) -> Self {
        Self {
            guild_id: guild_id.into(),
            socket,
            inner: Mutex::new(PlayerInner {
                state: PlayerState::None,
                track: None,
                queue: VecDeque::new(),
                volume: DEFAULT_VOLUME,
                last_update: 0,
            }),
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn track(&self) -> Option<Track> {
        self.inner.lock().await.track.clone()
    }

    pub async fn volume(&self) -> i32 {
        self.inner.lock().await.volume
    }

    /// Server time of the last position update, unix milliseconds.
    pub async fn last_update(&self) -> u64 {
        self.inner.lock().await.last_update
    }

    async fn send(&self, frame: OutgoingFrame<'_>) -> Result<(), ClientError> {
        self.socket.send_json(&frame).await
    }

    pub async fn play(&self, args: PlayArgs) -> Result<(), ClientError> {
        let track = args.track.ok_or(ClientError::MissingTrack)?;
        check_volume(args.volume)?;

        let payload = serde_json::to_string(&OutgoingFrame::Play {
            guild_id: &self.guild_id,
            track: &track.track,
            no_replace: args.no_replace,
            start_time: args.start_time.map(millis),
            end_time: args.end_time.map(millis),
            volume: args.volume,
            pause: args.pause,
        })?;

        debug!("[{}] Playing '{}'", self.guild_id, track.info.title);
        {
            let mut inner = self.inner.lock().await;
            inner.state = if args.pause {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            };
            inner.volume = args.volume;
            inner.track = Some(track);
        }
        self.socket.send(payload).await
    }

    /// Play `track` right away at the default volume.
    pub async fn play_track(&self, track: Track) -> Result<(), ClientError> {
        self.play(PlayArgs::new(track)).await
    }

    pub async fn stop(&self) -> Result<(), ClientError> {
        self.inner.lock().await.state = PlayerState::Stopped;
        self.send(OutgoingFrame::Stop {
            guild_id: &self.guild_id,
        })
        .await
    }

    pub async fn pause(&self) -> Result<(), ClientError> {
        self.set_paused(true).await
    }

    pub async fn resume(&self) -> Result<(), ClientError> {
        self.set_paused(false).await
    }

    async fn set_paused(&self, pause: bool) -> Result<(), ClientError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::None {
                return Err(ClientError::PlayerNotReady);
            }
            let state = match (inner.track.is_some(), pause) {
                (false, _) => PlayerState::Stopped,
                (true, true) => PlayerState::Paused,
                (true, false) => PlayerState::Playing,
            };
            inner.state = state;
        }
        self.send(OutgoingFrame::Pause {
            guild_id: &self.guild_id,
            pause,
        })
        .await
    }

    /// Move on to the next queued track, waiting `delay` first if given.
    ///
    /// Returns the track that is now playing. With an empty queue playback
    /// stops and `None` comes back; that is not an error. If the next track
    /// can't be sent it goes back to the front of the queue.
    pub async fn skip(&self, delay: Option<Duration>) -> Result<Option<Track>, ClientError> {
        let next = {
            let mut inner = self.inner.lock().await;
            if inner.state == PlayerState::None {
                return Err(ClientError::PlayerNotReady);
            }
            inner.queue.pop_front()
        };

        let Some(next) = next else {
            debug!("[{}] Queue is empty, stopping", self.guild_id);
            self.stop().await?;
            return Ok(None);
        };

        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = self.play_track(next.clone()).await {
            self.inner.lock().await.queue.push_front(next);
            return Err(e);
        }
        Ok(Some(next))
    }

    pub async fn seek(&self, position: Duration) -> Result<(), ClientError> {
        let requested = millis(position);
        {
            let inner = self.inner.lock().await;
            if inner.state == PlayerState::None {
                return Err(ClientError::PlayerNotReady);
            }
            let track = inner.track.as_ref().ok_or(ClientError::MissingTrack)?;
            if !track.info.is_seekable {
                return Err(ClientError::TrackNotSeekable);
            }
            if requested > track.info.length {
                return Err(ClientError::PositionOutOfRange {
                    requested,
                    length: track.info.length,
                });
            }
        }
        self.send(OutgoingFrame::Seek {
            guild_id: &self.guild_id,
            position: requested,
        })
        .await
    }

    /// Same bounds as [`play`](Self::play): `0..=1000`.
    pub async fn update_volume(&self, volume: i32) -> Result<(), ClientError> {
        check_volume(volume)?;
        self.inner.lock().await.volume = volume;
        self.send(OutgoingFrame::Volume {
            guild_id: &self.guild_id,
            volume,
        })
        .await
    }

    /// Stop, forget the queue and track, and release the player on the server.
    ///
    /// Use [`Node::leave`](crate::node::Node::leave) instead of calling this
    /// directly, it also drops the player from the node.
    pub async fn close(&self) -> Result<(), ClientError> {
        {
            let mut inner = self.inner.lock().await;
            inner.queue.clear();
            inner.track = None;
            inner.state = PlayerState::None;
        }
        info!("[{}] Closing player", self.guild_id);

        let stopped = self
            .send(OutgoingFrame::Stop {
                guild_id: &self.guild_id,
            })
            .await;
        let destroyed = self
            .send(OutgoingFrame::Destroy {
                guild_id: &self.guild_id,
            })
            .await;
        stopped.and(destroyed)
    }

    pub async fn enqueue(&self, track: Track) {
        self.inner.lock().await.queue.push_back(track);
    }

    pub async fn queue(&self) -> Vec<Track> {
        self.inner.lock().await.queue.iter().cloned().collect()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Returns how many tracks were dropped.
    pub async fn clear_queue(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let count = inner.queue.len();
        inner.queue.clear();
        count
    }

    pub async fn remove(&self, index: usize) -> Option<Track> {
        self.inner.lock().await.queue.remove(index)
    }

    pub async fn shuffle_queue(&self) {
        let mut inner = self.inner.lock().await;
        inner.queue.make_contiguous().shuffle(&mut rand::rng());
    }

    pub(crate) async fn set_state(&self, state: PlayerState) {
        self.inner.lock().await.state = state;
    }

    pub(crate) async fn update_position(&self, update: &PlayerUpdateState) {
        let mut inner = self.inner.lock().await;
        if let (Some(track), Some(position)) = (inner.track.as_mut(), update.position) {
            track.info.position = position;
        }
        inner.last_update = update.time;
    }
}
