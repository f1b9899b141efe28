use std::time::Duration;

use url::Url;

use crate::error::ClientError;

/// Connection settings for a [`Node`](crate::node::Node).
#[derive(Debug, Clone)]
pub struct Config {
    /// Password configured on the audio server.
    pub authorization: String,
    pub hostname: String,
    pub port: u16,
    /// Use `wss://` and `https://` instead of the plain schemes.
    pub ssl: bool,
    /// Sent as `User-Agent` on the websocket handshake when set.
    pub user_agent: Option<String>,
    /// Sent as `Client-Name` on the websocket handshake.
    pub client_name: String,
    /// How many times a failed initial connect is retried.
    pub reconnect_attempts: u32,
    /// Retry `n` waits `n * reconnect_delay`.
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub enable_resume: bool,
    pub resume_key: String,
    /// How long the server keeps a dropped session around for resuming.
    pub resume_timeout: Duration,
    pub self_deaf: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authorization: "youshallnotpass".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 2333,
            ssl: false,
            user_agent: None,
            client_name: "lavaplay".to_string(),
            reconnect_attempts: 10,
            reconnect_delay: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(45),
            enable_resume: true,
            resume_key: "lavaplay".to_string(),
            resume_timeout: Duration::from_secs(30),
            self_deaf: true,
        }
    }
}

impl Config {
    /// Defaults, overridden by `LAVALINK_HOST`, `LAVALINK_PORT`,
    /// `LAVALINK_PASSWORD` and `LAVALINK_SSL` where those are set and parse.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("LAVALINK_HOST") {
            config.hostname = host;
        }
        if let Some(port) = std::env::var("LAVALINK_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
        {
            config.port = port;
        }
        if let Ok(password) = std::env::var("LAVALINK_PASSWORD") {
            config.authorization = password;
        }
        if let Some(ssl) = std::env::var("LAVALINK_SSL")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
        {
            config.ssl = ssl;
        }
        config
    }

    pub fn socket_endpoint(&self) -> Result<Url, ClientError> {
        let scheme = if self.ssl { "wss" } else { "ws" };
        Ok(Url::parse(&format!(
            "{}://{}:{}",
            scheme, self.hostname, self.port
        ))?)
    }

    pub fn http_endpoint(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.hostname, self.port)
    }
}
