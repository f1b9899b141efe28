pub mod voice;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A playable track as handed out by the audio server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque handle, only the server knows how to read it.
    pub track: String,
    pub info: TrackInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Milliseconds.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    /// Milliseconds. Only moves when the server reports a position update.
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub title: String,
    pub uri: Option<String>,
    pub source_name: Option<String>,
}

impl Track {
    pub fn length(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.info.position)
    }
}

/// Server telemetry pushed roughly once a minute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub players: u32,
    pub playing_players: u32,
    /// Milliseconds since the server started.
    pub uptime: u64,
    pub memory: Memory,
    pub cpu: Cpu,
    /// Missing until the server has been sending audio for a while.
    #[serde(rename = "frameStats", alias = "frames", default)]
    pub frames: Option<FrameStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Average per-minute frame counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

/// Response of the track loading endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub load_type: LoadType,
    /// Only filled in for [`LoadType::PlaylistLoaded`].
    #[serde(default)]
    pub playlist_info: Option<PlaylistInfo>,
    /// Only filled in for [`LoadType::LoadFailed`].
    #[serde(default)]
    pub exception: Option<LoadException>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    TrackLoaded,
    PlaylistLoaded,
    /// A `ytsearch:`-style query matched something.
    SearchResult,
    NoMatches,
    LoadFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: Option<String>,
    /// -1 when the playlist link didn't point at a specific track.
    pub selected_track: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadException {
    pub message: Option<String>,
    #[serde(default)]
    pub severity: String,
}

/// Where a search query gets sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    YouTube,
    YouTubeMusic,
    SoundCloud,
    /// The query is a URL or a raw identifier.
    Direct,
}

impl SearchType {
    pub fn prefix(self) -> &'static str {
        match self {
            SearchType::YouTube => "ytsearch:",
            SearchType::YouTubeMusic => "ytmsearch:",
            SearchType::SoundCloud => "scsearch:",
            SearchType::Direct => "",
        }
    }

    pub fn identifier(self, query: &str) -> String {
        format!("{}{}", self.prefix(), query)
    }
}
