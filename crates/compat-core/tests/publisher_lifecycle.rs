//! Integration tests for the publisher adapter
//!
//! Covers access grant/denial, local media reconciliation, the
//! missing-target completion contract, publish/unpublish through a session,
//! and the deliberate capability gaps.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use roomlink_compat_core::{
    CompatContext, CompatError, Dimensions, InsertMode, PublisherEvent,
    PublisherProperties, SessionEvent, SessionOptions, init_publisher, init_session,
    sink_element_id,
};
use roomlink_engine_core::mock::{ControlCall, MockCallClient};
use roomlink_engine_core::{CallClient, CameraErrorReason, ParticipantId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("roomlink_compat_core=debug,roomlink_engine_core=debug")
        .with_test_writer()
        .try_init();
}

async fn eventually(description: &str, condition: impl Fn() -> bool) {
    let outcome = timeout(Duration::from_secs(1), async {
        loop {
            if condition() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(outcome.is_ok(), "timed out waiting for: {description}");
}

#[tokio::test]
async fn missing_target_invokes_completion_but_returns_usable_publisher() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());

    let reported: Arc<Mutex<Option<CompatError>>> = Arc::new(Mutex::new(None));
    let sink = reported.clone();
    let publisher = init_publisher(
        &ctx,
        None,
        PublisherProperties::default(),
        Some(Box::new(move |err| {
            *sink.lock().unwrap() = err;
        })),
    )
    .await
    .unwrap();

    let err = reported.lock().unwrap().clone().expect("completion saw no error");
    assert_eq!(err.to_string(), "No target element provided");

    // Still a fully usable publisher.
    publisher.publish_audio(true).await.unwrap();
    assert!(mock
        .control_log()
        .contains(&ControlCall::SetLocalAudio(true)));
}

#[tokio::test]
async fn camera_start_grants_access() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");

    let publisher = init_publisher(&ctx, Some("pub-root"), PublisherProperties::default(), None)
        .await
        .unwrap();

    // The construction-time camera start flips the flag.
    {
        let publisher = publisher.clone();
        eventually("device access to be granted", move || publisher.access_allowed()).await;
    }

    // The engine re-announcing the camera re-emits the access event.
    let mut events = publisher.subscribe_events();
    mock.emit(roomlink_engine_core::EngineEvent::StartedCamera);
    match timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for accessAllowed")
        .expect("publisher event channel closed")
    {
        PublisherEvent::AccessAllowed => {}
        other => panic!("expected accessAllowed, got {other:?}"),
    }
}

#[tokio::test]
async fn camera_denial_emits_access_denied() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    mock.fail_next_camera(CameraErrorReason::NotAllowed, "permission dismissed");
    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");

    let publisher = init_publisher(&ctx, Some("pub-root"), PublisherProperties::default(), None)
        .await
        .unwrap();
    assert!(!publisher.access_allowed());

    let mut events = publisher.subscribe_events();
    mock.emit(roomlink_engine_core::EngineEvent::CameraError {
        reason: CameraErrorReason::NotAllowed,
        message: "permission dismissed".to_string(),
    });
    match timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for accessDenied")
        .expect("publisher event channel closed")
    {
        PublisherEvent::AccessDenied => {}
        other => panic!("expected accessDenied, got {other:?}"),
    }
    assert!(!publisher.access_allowed());
}

#[tokio::test]
async fn local_tracks_create_one_sink_attached_once() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new().with_local_id("me"));
    let ctx = CompatContext::with_client(mock.clone());
    let root = ctx.elements().create_element("pub-root");

    let properties = PublisherProperties::default().with_dimensions(Dimensions::new(320, 240));
    let publisher = init_publisher(&ctx, Some("pub-root"), properties, None)
        .await
        .unwrap();

    let local_id = ParticipantId::new("me");
    {
        let ctx = ctx.clone();
        let local_id = local_id.clone();
        eventually("local sink to appear", move || ctx.sinks().get(&local_id).is_some()).await;
    }

    let sink = ctx.sinks().get(&local_id).unwrap();
    assert_eq!(sink.dimensions(), Some(Dimensions::new(320, 240)));
    assert_eq!(root.children(), vec![sink_element_id(&local_id)]);

    // The engine re-announcing the same tracks changes nothing.
    mock.set_local_video(true).await.unwrap();
    mock.set_local_video(true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.sinks().len(), 1);
    assert_eq!(root.children().len(), 1);

    let stream = publisher.stream().await.expect("publisher derived no stream");
    assert_eq!(stream.id, "me");
    assert!(stream.has_video);
}

#[tokio::test]
async fn already_live_media_reconciles_without_starting_the_camera() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new().with_local_id("me"));
    // Local media is on before the publisher exists.
    mock.join(roomlink_engine_core::JoinRequest::new("room-1"))
        .await
        .unwrap();
    mock.set_local_video(true).await.unwrap();

    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");
    let publisher = init_publisher(&ctx, Some("pub-root"), PublisherProperties::default(), None)
        .await
        .unwrap();

    assert!(publisher.access_allowed());
    assert!(ctx.sinks().get(&ParticipantId::new("me")).is_some());
    assert!(
        !mock.control_log().contains(&ControlCall::StartCamera),
        "camera must not be restarted when media is already live"
    );
}

#[tokio::test]
async fn destroy_emits_stream_destroyed_then_destroyed() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new().with_local_id("me"));
    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");

    let publisher = init_publisher(&ctx, Some("pub-root"), PublisherProperties::default(), None)
        .await
        .unwrap();
    timeout(Duration::from_secs(1), async {
        while publisher.stream().await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("published stream never appeared");

    let mut events = publisher.subscribe_events();
    publisher.destroy().await;

    // Skip any late reconciliation events; the tail must be the destroyed
    // pair in order.
    let mut tail = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(200), events.recv()).await {
        tail.push(event);
    }
    let destroyed_pair: Vec<_> = tail
        .iter()
        .filter(|e| {
            matches!(e, PublisherEvent::StreamDestroyed { .. } | PublisherEvent::Destroyed)
        })
        .collect();
    assert_eq!(destroyed_pair.len(), 2);
    assert!(matches!(destroyed_pair[0], PublisherEvent::StreamDestroyed { .. }));
    assert!(matches!(destroyed_pair[1], PublisherEvent::Destroyed));

    assert!(mock.control_log().contains(&ControlCall::Leave));
    assert!(ctx.sinks().is_empty());
}

#[tokio::test]
async fn non_append_insert_modes_are_rejected() {
    init_tracing();
    let ctx = CompatContext::with_client(Arc::new(MockCallClient::new()));
    ctx.elements().create_element("pub-root");

    let err = init_publisher(
        &ctx,
        Some("pub-root"),
        PublisherProperties::default().with_insert_mode(InsertMode::Replace),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CompatError::NotImplemented { .. }));
}

#[tokio::test]
async fn publish_completes_on_the_next_local_update() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new().with_local_id("me"));
    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");

    let session = init_session(&ctx, "partner", "room-1", SessionOptions::new());
    session.connect("token").await.unwrap();
    let mut events = session.subscribe_events();
    // Consume the connect pair.
    events.recv().await.unwrap();
    events.recv().await.unwrap();

    let publisher = session
        .publish_element(Some("pub-root"), PublisherProperties::default())
        .await
        .unwrap();
    assert_eq!(publisher.session_id().await.as_deref(), Some("room-1"));

    // The session handler translated the local update into streamCreated.
    let mut saw_local_stream = false;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(300), events.recv()).await {
        if let SessionEvent::StreamCreated { stream } = event {
            if stream.id == "me" {
                saw_local_stream = true;
                break;
            }
        }
    }
    assert!(saw_local_stream, "local streamCreated translation never fired");

    session.unpublish(&publisher).await.unwrap();
    assert_eq!(publisher.session_id().await, None);
    let log = mock.control_log();
    assert!(log.contains(&ControlCall::SetLocalAudio(false)));
    assert!(log.contains(&ControlCall::SetLocalVideo(false)));
}

#[tokio::test]
async fn device_selection_delegates_to_the_engine() {
    init_tracing();
    let mock = Arc::new(MockCallClient::new());
    let ctx = CompatContext::with_client(mock.clone());
    ctx.elements().create_element("pub-root");

    let publisher = init_publisher(&ctx, Some("pub-root"), PublisherProperties::default(), None)
        .await
        .unwrap();

    publisher.set_audio_source("mock-mic-0").await.unwrap();
    assert_eq!(
        publisher.get_audio_source().await.unwrap().unwrap().device_id,
        "mock-mic-0"
    );

    publisher.set_video_source("mock-cam-1").await.unwrap();
    let cycled = publisher.cycle_video().await.unwrap().unwrap();
    assert_ne!(cycled.device_id, "mock-cam-1");

    let err = publisher.set_video_source("no-such-device").await.unwrap_err();
    assert!(matches!(err, CompatError::EngineOperationFailed { .. }));
}
