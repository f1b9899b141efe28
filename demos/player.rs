use async_trait::async_trait;
use lavaplay::event::{TrackEnded, TrackStarted, WebSocketClosed};
use lavaplay::prelude::*;
use tokio::sync::mpsc;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn on_track_start(&self, event: TrackStarted) {
        if let Some(track) = event.player.track().await {
            println!("[{}] Now playing {}", event.player.guild_id(), track.info.title);
        }
    }

    async fn on_track_end(&self, event: TrackEnded) {
        if !event.reason.may_start_next() {
            return;
        }
        match event.player.skip(None).await {
            Ok(Some(next)) => println!("[{}] Up next: {}", event.player.guild_id(), next.info.title),
            Ok(None) => println!("[{}] Queue finished", event.player.guild_id()),
            Err(e) => eprintln!("[{}] Skip failed: {}", event.player.guild_id(), e),
        }
    }

    async fn on_websocket_closed(&self, event: WebSocketClosed) {
        eprintln!("[{}] Voice closed: {} {}", event.guild_id, event.code, event.reason);
    }

    async fn on_stats(&self, stats: Stats) {
        println!("{} players, {} playing", stats.players, stats.playing_players);
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let user_id = std::env::var("BOT_USER_ID").expect("Set BOT_USER_ID to your bot's user id");
    let guild_id = std::env::var("GUILD_ID").expect("Set GUILD_ID");
    let channel_id = std::env::var("CHANNEL_ID").expect("Set CHANNEL_ID to a voice channel id");
    let query = std::env::args().nth(1).unwrap_or_else(|| "never gonna give you up".to_string());

    // stand-in for the chat gateway connection
    let (gateway_tx, mut gateway_rx) = mpsc::channel::<String>(8);
    tokio::spawn(async move {
        while let Some(payload) = gateway_rx.recv().await {
            println!("gateway <- {}", payload);
        }
    });

    let node = Node::builder(Config::from_env(), user_id, GatewayVoiceJoiner::new(gateway_tx))
        .event_handler(Handler)
        .build()
        .expect("Invalid config");

    if let Err(e) = node.connect().await {
        eprintln!("Error: {}", e);
        return;
    }

    let result = match node.search(SearchType::YouTube, &query).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            return;
        }
    };

    let player = match node.join(&guild_id, &channel_id).await {
        Ok(player) => player,
        Err(e) => {
            eprintln!("Join failed: {}", e);
            return;
        }
    };

    let mut tracks = result.tracks.into_iter();
    let Some(first) = tracks.next() else {
        println!("Nothing found for {}", query);
        return;
    };
    for track in tracks.take(4) {
        player.enqueue(track).await;
    }
    if let Err(e) = player.play_track(first).await {
        eprintln!("Play failed: {}", e);
    }

    let _ = tokio::signal::ctrl_c().await;
    if let Err(e) = node.close().await {
        eprintln!("Error: {}", e);
    }
}
