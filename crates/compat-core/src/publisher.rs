//! The publisher adapter
//!
//! `Publisher` represents local outgoing media. Its engine event pump drives
//! the camera/microphone lifecycle: camera start and denial become the
//! legacy access events, local track changes re-run media reconciliation
//! and re-derive the published stream, and leaving the call clears every
//! rendering sink. Mutator methods delegate straight to the call client.
//!
//! A sizable part of the legacy publisher surface (stats, filters, styling,
//! captions) has no engine equivalent; those methods fail loudly with a
//! not-implemented error and are a documented capability gap, not a bug.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use roomlink_engine_core::{CameraErrorReason, EngineEvent, MediaDeviceInfo, Participant};

use crate::config::PublisherProperties;
use crate::context::CompatContext;
use crate::error::{CompatError, CompatResult};
use crate::events::{EventHub, HandlerId, PublisherEvent};
use crate::stream::{ActiveTracks, Connection, Stream};

/// Local-outgoing-media handle of the legacy surface
pub struct Publisher {
    context: Arc<CompatContext>,
    properties: PublisherProperties,
    target: Option<String>,
    hub: Arc<EventHub<PublisherEvent>>,
    access_allowed: AtomicBool,
    stream: RwLock<Option<Stream>>,
    session_id: RwLock<Option<String>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("properties", &self.properties)
            .field("target", &self.target)
            .field(
                "access_allowed",
                &self.access_allowed.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Build the handle without touching the engine. Used by [`create`] and
    /// by tests that need a publisher over an uninitialized context.
    pub(crate) fn bare(
        context: Arc<CompatContext>,
        target: Option<&str>,
        properties: PublisherProperties,
    ) -> Arc<Self> {
        Arc::new(Self {
            context,
            properties,
            target: target.map(str::to_string),
            hub: Arc::new(EventHub::new()),
            access_allowed: AtomicBool::new(false),
            stream: RwLock::new(None),
            session_id: RwLock::new(None),
            pump: Mutex::new(None),
        })
    }

    /// Create a publisher: wires the engine event pump, then either
    /// reconciles immediately (local media already live) or starts the
    /// camera.
    pub(crate) async fn create(
        context: Arc<CompatContext>,
        target: Option<&str>,
        properties: PublisherProperties,
    ) -> Arc<Self> {
        let client = context.call_client();
        let rx = client.subscribe();
        let publisher = Self::bare(context, target, properties);

        let pump_owner = publisher.clone();
        let pump = tokio::spawn(async move {
            let mut rx = rx;
            loop {
                match rx.recv().await {
                    Ok(event) => pump_owner.on_engine_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "publisher event pump lagged behind the engine");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *publisher.pump.lock().await = Some(pump);

        match client.local_participant().await {
            Some(local) if !ActiveTracks::from_participant(&local).is_empty() => {
                debug!("local media already live; reconciling");
                publisher.access_allowed.store(true, Ordering::SeqCst);
                publisher.reconcile_local(&local);
            }
            _ => {
                if let Err(e) = client.start_camera().await {
                    warn!(error = %e, "camera start failed");
                }
            }
        }

        publisher
    }

    /// The event hub callers register legacy-named handlers on
    pub fn events(&self) -> &EventHub<PublisherEvent> {
        &self.hub
    }

    /// Register a persistent handler for a legacy publisher event name
    pub fn on(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&PublisherEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.hub.on(event_name, handler)
    }

    /// Register a one-shot handler for a legacy publisher event name
    pub fn once(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&PublisherEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.hub.once(event_name, handler)
    }

    /// Remove a previously registered handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.hub.off(id)
    }

    /// Subscribe to the broadcast mirror of the publisher's events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<PublisherEvent> {
        self.hub.subscribe()
    }

    /// Whether device access has been granted
    pub fn access_allowed(&self) -> bool {
        self.access_allowed.load(Ordering::SeqCst)
    }

    /// The target element this publisher renders under, if one was given
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn properties(&self) -> PublisherProperties {
        self.properties.clone()
    }

    /// The currently published stream, if any
    pub async fn stream(&self) -> Option<Stream> {
        self.stream.read().await.clone()
    }

    /// The session this publisher is attached to, if any
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    pub(crate) async fn set_session(&self, session_id: &str) {
        *self.session_id.write().await = Some(session_id.to_string());
    }

    pub(crate) async fn clear_session(&self) {
        *self.session_id.write().await = None;
    }

    /// Destroy the publisher: leaves the call and emits `streamDestroyed`
    /// then `destroyed`
    pub async fn destroy(&self) {
        let client = self.context.try_call_client();
        if let Some(client) = client {
            if let Err(e) = client.leave().await {
                warn!(error = %e, "leave on publisher destroy failed; discarding");
            }
        }
        self.context.clear_sinks();

        if let Some(stream) = self.stream.write().await.take() {
            self.hub.emit(PublisherEvent::StreamDestroyed { stream });
        }
        self.hub.emit(PublisherEvent::Destroyed);
        info!("publisher destroyed");

        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
    }

    /// Start or stop publishing the microphone
    pub async fn publish_audio(&self, publish: bool) -> CompatResult<()> {
        let client = self.call_client()?;
        client
            .set_local_audio(publish)
            .await
            .map_err(|e| CompatError::engine_op("publishAudio", e))
    }

    /// Start or stop publishing the camera
    pub async fn publish_video(&self, publish: bool) -> CompatResult<()> {
        let client = self.call_client()?;
        client
            .set_local_video(publish)
            .await
            .map_err(|e| CompatError::engine_op("publishVideo", e))
    }

    /// Switch the microphone to a specific input device
    pub async fn set_audio_source(&self, device_id: &str) -> CompatResult<()> {
        let client = self.call_client()?;
        client
            .set_input_devices(Some(device_id.to_string()), None)
            .await
            .map_err(|e| CompatError::engine_op("setAudioSource", e))
    }

    /// Switch the camera to a specific input device
    pub async fn set_video_source(&self, device_id: &str) -> CompatResult<()> {
        let client = self.call_client()?;
        client
            .set_input_devices(None, Some(device_id.to_string()))
            .await
            .map_err(|e| CompatError::engine_op("setVideoSource", e))
    }

    /// Switch to the next available camera
    pub async fn cycle_video(&self) -> CompatResult<Option<MediaDeviceInfo>> {
        let client = self.call_client()?;
        client
            .cycle_camera()
            .await
            .map_err(|e| CompatError::engine_op("cycleVideo", e))
    }

    /// The active microphone device
    pub async fn get_audio_source(&self) -> CompatResult<Option<MediaDeviceInfo>> {
        let client = self.call_client()?;
        client
            .audio_input_device()
            .await
            .map_err(|e| CompatError::engine_op("getAudioSource", e))
    }

    /// The active camera device
    pub async fn get_video_source(&self) -> CompatResult<Option<MediaDeviceInfo>> {
        let client = self.call_client()?;
        client
            .video_input_device()
            .await
            .map_err(|e| CompatError::engine_op("getVideoSource", e))
    }

    /// Publisher statistics. Not implemented by design.
    pub async fn get_stats(&self) -> CompatResult<()> {
        Err(CompatError::not_implemented("getStats"))
    }

    /// Raw RTC statistics report. Not implemented by design.
    pub async fn get_rtc_stats_report(&self) -> CompatResult<()> {
        Err(CompatError::not_implemented("getRtcStatsReport"))
    }

    /// Apply a video filter. Not implemented by design.
    pub async fn apply_video_filter(&self, _filter: &str) -> CompatResult<()> {
        Err(CompatError::not_implemented("applyVideoFilter"))
    }

    /// Clear the active video filter. Not implemented by design.
    pub async fn clear_video_filter(&self) -> CompatResult<()> {
        Err(CompatError::not_implemented("clearVideoFilter"))
    }

    /// Change display styling. Not implemented by design.
    pub async fn set_style(&self, _style: &str, _value: &str) -> CompatResult<()> {
        Err(CompatError::not_implemented("setStyle"))
    }

    /// Toggle caption publishing. Not implemented by design.
    pub async fn set_publish_captions(&self, _publish: bool) -> CompatResult<()> {
        Err(CompatError::not_implemented("setPublishCaptions"))
    }

    fn call_client(&self) -> CompatResult<Arc<dyn roomlink_engine_core::CallClient>> {
        self.context
            .try_call_client()
            .ok_or(CompatError::CallObjectNotInitialized)
    }

    async fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::StartedCamera => {
                self.access_allowed.store(true, Ordering::SeqCst);
                self.hub.emit(PublisherEvent::AccessAllowed);
            }
            EngineEvent::CameraError { reason, message } => {
                if reason == CameraErrorReason::NotAllowed {
                    self.access_allowed.store(false, Ordering::SeqCst);
                    self.hub.emit(PublisherEvent::AccessDenied);
                } else {
                    warn!(?reason, %message, "camera error");
                }
            }
            EngineEvent::TrackStarted { participant, .. } if participant.local => {
                self.on_local_track_started(participant).await;
            }
            EngineEvent::TrackStopped { participant, .. } if participant.local => {
                self.reconcile_local(&participant);
            }
            EngineEvent::LeftMeeting => {
                self.context.clear_sinks();
            }
            _ => {}
        }
    }

    async fn on_local_track_started(&self, participant: Participant) {
        self.reconcile_local(&participant);
        let connection = Connection::from_participant(&participant, None);
        let stream = Stream::from_participant(&participant, connection);
        *self.stream.write().await = Some(stream.clone());
        self.hub.emit(PublisherEvent::StreamCreated { stream });
    }

    fn reconcile_local(&self, participant: &Participant) {
        let tracks = ActiveTracks::from_participant(participant);
        let (sink, created) = self.context.sinks().reconcile(
            &participant.id,
            &tracks,
            self.target.as_deref(),
            self.properties.dimensions,
        );
        if created {
            if let Some(target) = &self.target {
                if let Some(root) = self.context.elements().get(target) {
                    root.append_child(sink.element_id());
                }
            }
        }
    }
}
