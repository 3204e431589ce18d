//! The subscriber adapter
//!
//! `Subscriber` renders one remote stream under one root element. Its
//! engine event pump is scoped to the subscribed participant: track starts
//! re-run media reconciliation for that participant only, and their
//! departure removes the rendering sink. Local-participant updates are
//! ignored here; the publisher owns local media.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use roomlink_engine_core::{EngineEvent, Participant};

use crate::config::SubscriberProperties;
use crate::context::CompatContext;
use crate::events::{EventHub, HandlerId, SubscriberEvent};
use crate::stream::{ActiveTracks, Stream};

/// Remote-stream handle bound to one rendering root element
pub struct Subscriber {
    id: Uuid,
    context: Arc<CompatContext>,
    stream: Stream,
    target: String,
    properties: SubscriberProperties,
    hub: Arc<EventHub<SubscriberEvent>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .field("target", &self.target)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl Subscriber {
    /// Create the subscriber and start its scoped engine event pump
    pub(crate) fn spawn(
        context: Arc<CompatContext>,
        stream: Stream,
        target: &str,
        properties: SubscriberProperties,
    ) -> Arc<Self> {
        let client = context.call_client();
        let rx = client.subscribe();
        let subscriber = Arc::new(Self {
            id: Uuid::new_v4(),
            context,
            stream,
            target: target.to_string(),
            properties,
            hub: Arc::new(EventHub::new()),
            pump: Mutex::new(None),
        });

        let pump_owner = subscriber.clone();
        let pump = tokio::spawn(async move {
            let mut rx = rx;
            loop {
                match rx.recv().await {
                    Ok(event) => pump_owner.on_engine_event(event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "subscriber event pump lagged behind the engine");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Ok(mut slot) = subscriber.pump.try_lock() {
            *slot = Some(pump);
        }
        subscriber
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The stream this subscriber renders
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// The root element this subscriber renders under
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The event hub callers register legacy-named handlers on
    pub fn events(&self) -> &EventHub<SubscriberEvent> {
        &self.hub
    }

    /// Register a persistent handler for a legacy subscriber event name
    pub fn on(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&SubscriberEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.hub.on(event_name, handler)
    }

    /// Remove a previously registered handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.hub.off(id)
    }

    /// Subscribe to the broadcast mirror of the subscriber's events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SubscriberEvent> {
        self.hub.subscribe()
    }

    /// Stop the scoped pump and report destruction.
    ///
    /// The `destroyed` event is emitted immediately, without waiting for
    /// the engine to confirm track teardown; that timing matches the
    /// legacy surface.
    pub(crate) async fn shutdown(&self, reason: &str) {
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        self.hub.emit(SubscriberEvent::Destroyed { reason: reason.to_string() });
    }

    fn is_subscribed_participant(&self, participant: &Participant) -> bool {
        !participant.local && participant.id.as_str() == self.stream.id
    }

    fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::TrackStarted { participant, .. }
                if self.is_subscribed_participant(&participant) =>
            {
                self.on_track_started(&participant);
            }
            EngineEvent::ParticipantLeft { participant }
                if self.is_subscribed_participant(&participant) =>
            {
                self.on_participant_left(&participant);
            }
            _ => {}
        }
    }

    fn on_track_started(&self, participant: &Participant) {
        debug!(participant = %participant.id, "subscriber reconciling remote media");
        let tracks = ActiveTracks::from_participant(participant);
        let (sink, created) = self.context.sinks().reconcile(
            &participant.id,
            &tracks,
            Some(&self.target),
            self.properties.dimensions,
        );
        if created {
            if let Some(root) = self.context.elements().get(&self.target) {
                root.append_child(sink.element_id());
            }
        }
    }

    fn on_participant_left(&self, participant: &Participant) {
        // Only an actually rendered participant produces a destroyed event.
        if let Some(sink) = self.context.sinks().remove(&participant.id) {
            self.context.detach_sink(&sink);
            info!(participant = %participant.id, "subscribed participant left");
            self.hub.emit(SubscriberEvent::Destroyed {
                reason: "clientDisconnected".to_string(),
            });
        }
    }
}
