//! End-to-end media reconciliation tests
//!
//! Exercises the reconciliation guarantees through the adapters rather than
//! against the registry directly: duplicate engine announcements must not
//! duplicate sinks or attachments, identity changes must swap exactly one
//! track, and call teardown must clear every sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use roomlink_compat_core::{
    CompatContext, MediaKind, SessionEvent, SessionOptions, SubscriberProperties,
    init_session,
};
use roomlink_engine_core::mock::MockCallClient;
use roomlink_engine_core::{
    EngineEvent, MediaTracks, Participant, ParticipantId, TrackInfo, TrackKind,
    TrackState,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("roomlink_compat_core=debug,roomlink_engine_core=debug")
        .with_test_writer()
        .try_init();
}

fn playable(id: &str, kind: TrackKind) -> TrackInfo {
    TrackInfo::new(id, kind, TrackState::Playable)
}

async fn wait_for_sink(ctx: &Arc<CompatContext>, pid: &ParticipantId) {
    let ctx = ctx.clone();
    let pid = pid.clone();
    timeout(Duration::from_secs(1), async move {
        while ctx.sinks().get(&pid).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sink never appeared");
}

async fn wait_for_track(
    ctx: &Arc<CompatContext>,
    pid: &ParticipantId,
    kind: MediaKind,
    id: &str,
) {
    let ctx = ctx.clone();
    let pid = pid.clone();
    let id = id.to_string();
    timeout(Duration::from_secs(1), async move {
        loop {
            if let Some(sink) = ctx.sinks().get(&pid) {
                if sink.track(kind).map(|t| t.id) == Some(id.clone()) {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("expected track identity never observed");
}

/// Set up a connected session with one subscribed remote participant.
async fn subscribed_remote(
    ctx: &Arc<CompatContext>,
    mock: &Arc<MockCallClient>,
    remote_id: &str,
) {
    ctx.elements().create_element("media-root");
    let session = init_session(ctx, "partner", "room-1", SessionOptions::new());
    let mut events = session.subscribe_events();
    session.connect("token").await.unwrap();

    mock.join_remote(Participant::new(remote_id, false).with_tracks(MediaTracks {
        audio: None,
        video: Some(playable(&format!("{remote_id}-video-1"), TrackKind::Video)),
        screen_video: None,
    }));
    let stream = loop {
        match timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap() {
            SessionEvent::StreamCreated { stream } if stream.id == remote_id => break stream,
            _ => continue,
        }
    };
    session
        .subscribe(&stream, "media-root", SubscriberProperties::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn changed_track_identity_replaces_exactly_one_track() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());
    subscribed_remote(&ctx, &mock, "peer-1").await;

    let pid = ParticipantId::new("peer-1");
    mock.start_remote_track(&pid, playable("peer-1-video-1", TrackKind::Video));
    wait_for_track(&ctx, &pid, MediaKind::Video, "peer-1-video-1").await;

    // The camera restarts: same participant, new track identity.
    mock.start_remote_track(&pid, playable("peer-1-video-2", TrackKind::Video));
    wait_for_track(&ctx, &pid, MediaKind::Video, "peer-1-video-2").await;

    let sink = ctx.sinks().get(&pid).unwrap();
    let tracks = sink.tracks();
    assert_eq!(
        tracks.iter().filter(|t| t.kind == MediaKind::Video).count(),
        1,
        "stale video track left attached"
    );
    assert_eq!(ctx.sinks().len(), 1);
}

#[tokio::test]
async fn a_kind_arriving_later_joins_the_existing_sink() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());
    subscribed_remote(&ctx, &mock, "peer-1").await;

    let pid = ParticipantId::new("peer-1");
    mock.start_remote_track(&pid, playable("peer-1-video-1", TrackKind::Video));
    wait_for_sink(&ctx, &pid).await;
    let sink = ctx.sinks().get(&pid).unwrap();
    assert!(sink.track(MediaKind::Audio).is_none());

    mock.start_remote_track(&pid, playable("peer-1-audio-1", TrackKind::Audio));
    wait_for_track(&ctx, &pid, MediaKind::Audio, "peer-1-audio-1").await;

    // Same sink instance, now carrying both kinds.
    let after = ctx.sinks().get(&pid).unwrap();
    assert!(Arc::ptr_eq(&sink, &after));
    assert_eq!(after.tracks().len(), 2);
}

#[tokio::test]
async fn engine_teardown_clears_every_sink() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());
    subscribed_remote(&ctx, &mock, "peer-1").await;

    let pid = ParticipantId::new("peer-1");
    mock.start_remote_track(&pid, playable("peer-1-video-1", TrackKind::Video));
    wait_for_sink(&ctx, &pid).await;

    mock.emit(EngineEvent::LeftMeeting);
    timeout(Duration::from_secs(1), async {
        while !ctx.sinks().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sinks survived call teardown");

    let root = ctx.elements().get("media-root").unwrap();
    assert!(root.children().is_empty(), "sink left attached to its mount point");
}
