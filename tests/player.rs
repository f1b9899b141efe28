mod common;

use std::time::{Duration, Instant};

use common::track;
use lavaplay::prelude::*;
use serde_json::json;

#[tokio::test]
async fn volume_outside_bounds_is_never_sent() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();

    for volume in [-1, 1001] {
        let args = PlayArgs {
            volume,
            ..PlayArgs::new(track("a", 1_000))
        };
        assert!(matches!(
            player.play(args).await,
            Err(ClientError::VolumeOutOfRange(v)) if v == volume
        ));
        assert!(matches!(
            player.update_volume(volume).await,
            Err(ClientError::VolumeOutOfRange(_))
        ));
    }
    assert_eq!(player.state().await, PlayerState::None);

    let args = PlayArgs {
        volume: 0,
        ..PlayArgs::new(track("a", 1_000))
    };
    player.play(args).await.unwrap();
    assert_eq!(h.server.next_frame().await["volume"], 0);

    let args = PlayArgs {
        volume: 1000,
        ..PlayArgs::new(track("b", 1_000))
    };
    player.play(args).await.unwrap();
    let frame = h.server.next_frame().await;
    assert_eq!(frame["volume"], 1000);
    assert_eq!(frame["track"], "encoded-b");

    player.update_volume(1000).await.unwrap();
    assert_eq!(
        h.server.next_frame().await,
        json!({ "op": "volume", "guildId": "1", "volume": 1000 })
    );
    assert_eq!(player.volume().await, 1000);
}

#[tokio::test]
async fn play_sends_only_the_bounds_it_was_given() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();

    player.play_track(track("a", 60_000)).await.unwrap();
    assert_eq!(
        h.server.next_frame().await,
        json!({
            "op": "play",
            "guildId": "1",
            "track": "encoded-a",
            "noReplace": false,
            "volume": 100,
            "pause": false
        })
    );
    assert_eq!(player.state().await, PlayerState::Playing);

    let args = PlayArgs {
        start_time: Some(Duration::from_secs(5)),
        end_time: Some(Duration::from_secs(30)),
        pause: true,
        no_replace: true,
        ..PlayArgs::new(track("b", 60_000))
    };
    player.play(args).await.unwrap();
    let frame = h.server.next_frame().await;
    assert_eq!(frame["startTime"], 5_000);
    assert_eq!(frame["endTime"], 30_000);
    assert_eq!(frame["noReplace"], true);
    assert_eq!(player.state().await, PlayerState::Paused);
    assert_eq!(player.track().await.unwrap().info.identifier, "b");
}

#[tokio::test]
async fn pause_and_resume_toggle_state() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;

    player.pause().await.unwrap();
    assert_eq!(
        h.server.next_frame().await,
        json!({ "op": "pause", "guildId": "1", "pause": true })
    );
    assert_eq!(player.state().await, PlayerState::Paused);

    player.resume().await.unwrap();
    assert_eq!(h.server.next_frame().await["pause"], false);
    assert_eq!(player.state().await, PlayerState::Playing);
}

#[tokio::test]
async fn skip_with_empty_queue_stops() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;

    assert!(player.skip(None).await.unwrap().is_none());
    assert_eq!(
        h.server.next_frame().await,
        json!({ "op": "stop", "guildId": "1" })
    );
    assert_eq!(player.state().await, PlayerState::Stopped);
}

#[tokio::test]
async fn skip_plays_the_next_queued_track() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;
    player.enqueue(track("b", 60_000)).await;
    player.enqueue(track("c", 60_000)).await;

    let next = player.skip(None).await.unwrap().unwrap();
    assert_eq!(next.info.identifier, "b");
    assert_eq!(h.server.next_frame().await["track"], "encoded-b");
    assert_eq!(player.track().await.unwrap().info.identifier, "b");
    assert_eq!(player.queue_len().await, 1);
    assert_eq!(player.state().await, PlayerState::Playing);
}

#[tokio::test]
async fn skip_waits_for_the_delay() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;
    player.enqueue(track("b", 60_000)).await;

    let started = Instant::now();
    player.skip(Some(Duration::from_millis(100))).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(h.server.next_frame().await["track"], "encoded-b");
}

#[tokio::test]
async fn seek_checks_the_current_track() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;

    assert!(matches!(
        player.seek(Duration::from_secs(61)).await,
        Err(ClientError::PositionOutOfRange { requested: 61_000, length: 60_000 })
    ));

    player.seek(Duration::from_secs(30)).await.unwrap();
    assert_eq!(
        h.server.next_frame().await,
        json!({ "op": "seek", "guildId": "1", "position": 30_000 })
    );

    let mut live = track("live", 0);
    live.info.is_seekable = false;
    live.info.is_stream = true;
    player.play_track(live).await.unwrap();
    h.server.next_frame().await;
    assert!(matches!(
        player.seek(Duration::ZERO).await,
        Err(ClientError::TrackNotSeekable)
    ));
    h.server.assert_quiet().await;
}

#[tokio::test]
async fn close_resets_the_player() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;
    player.enqueue(track("b", 60_000)).await;

    player.close().await.unwrap();

    assert_eq!(h.server.next_frame().await["op"], "stop");
    assert_eq!(h.server.next_frame().await["op"], "destroy");
    assert_eq!(player.state().await, PlayerState::None);
    assert!(player.track().await.is_none());
    assert_eq!(player.queue_len().await, 0);
    assert!(matches!(player.pause().await, Err(ClientError::PlayerNotReady)));
}

#[tokio::test]
async fn stop_racing_track_end_settles_on_stopped() {
    let mut h = common::connected().await;
    let player = h.node.join("1", "2").await.unwrap();
    player.play_track(track("a", 60_000)).await.unwrap();
    h.server.next_frame().await;

    h.server.push(json!({
        "op": "event",
        "type": "TrackEndEvent",
        "guildId": "1",
        "track": "encoded-a",
        "reason": "FINISHED"
    }));
    player.stop().await.unwrap();

    assert!(matches!(h.next_event().await, Event::TrackEnded(_)));
    assert_eq!(h.server.next_frame().await["op"], "stop");
    assert_eq!(player.state().await, PlayerState::Stopped);
}
