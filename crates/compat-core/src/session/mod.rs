//! The session adapter
//!
//! `Session` reproduces the legacy call-level lifecycle - connect, publish,
//! subscribe, unpublish, unsubscribe, disconnect, signal - on top of the
//! engine's call client. All engine events are translated by the owned
//! [`handler::SessionEventHandler`], which runs on a pump task spawned at
//! connect time and aborted at disconnect.
//!
//! # State machine
//!
//! ```text
//! disconnected -> connecting -> connected <-> reconnecting -> disconnected
//! ```
//!
//! Reconnecting is entered only from connected (on transport interruption)
//! and `sessionReconnected` fires only when leaving it, so a first connect
//! can never look like a recovery.
//!
//! # Usage
//!
//! ```rust,no_run
//! # use roomlink_compat_core::{init_session, CompatContext, SessionOptions, SessionEvent};
//! # use roomlink_engine_core::mock::MockCallClient;
//! # use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = CompatContext::with_client(Arc::new(MockCallClient::new()));
//! let session = init_session(&ctx, "partner", "room-1", SessionOptions::new());
//!
//! let mut events = session.subscribe_events();
//! session.connect("token").await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         SessionEvent::StreamCreated { stream } => {
//!             println!("stream {} appeared", stream.id);
//!         }
//!         SessionEvent::SessionDisconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod handler;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use roomlink_engine_core::{EngineEvent, JoinRequest, ParticipantId, TrackSubscription};

use crate::config::{InsertMode, PublisherProperties, SessionOptions, SignalOptions, SubscriberProperties};
use crate::context::CompatContext;
use crate::error::{CompatError, CompatResult};
use crate::events::{EventHub, HandlerId, SessionEvent};
use crate::publisher::Publisher;
use crate::stream::{Connection, Stream};
use crate::subscriber::Subscriber;
use crate::token;

use handler::{SessionEventHandler, SignalPayload};

/// Connection state of a session adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Moderation and media capabilities of a session
///
/// The legacy surface reports these as a fixed-on bitset; every flag is
/// always granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub force_disconnect: bool,
    pub force_unpublish: bool,
    pub force_mute: bool,
    pub publish: bool,
    pub subscribe: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            force_disconnect: true,
            force_unpublish: true,
            force_mute: true,
            publish: true,
            subscribe: true,
        }
    }
}

/// One call/room as the legacy surface describes it
pub struct Session {
    context: Arc<CompatContext>,
    partner_id: String,
    session_id: String,
    options: SessionOptions,
    capabilities: Capabilities,
    hub: Arc<EventHub<SessionEvent>>,
    state: Arc<RwLock<SessionState>>,
    connection_data: Arc<RwLock<Option<String>>>,
    local_connection: RwLock<Option<Connection>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(
        context: Arc<CompatContext>,
        partner_id: impl Into<String>,
        session_id: impl Into<String>,
        options: SessionOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            context,
            partner_id: partner_id.into(),
            session_id: session_id.into(),
            options,
            capabilities: Capabilities::default(),
            hub: Arc::new(EventHub::new()),
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            connection_data: Arc::new(RwLock::new(None)),
            local_connection: RwLock::new(None),
            pump: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The event hub callers register legacy-named handlers on
    pub fn events(&self) -> &EventHub<SessionEvent> {
        &self.hub
    }

    /// Register a persistent handler for a legacy session event name
    pub fn on(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.hub.on(event_name, handler)
    }

    /// Register a one-shot handler for a legacy session event name
    pub fn once(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.hub.once(event_name, handler)
    }

    /// Remove a previously registered handler
    pub fn off(&self, id: HandlerId) -> bool {
        self.hub.off(id)
    }

    /// Subscribe to the broadcast mirror of the session's events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.hub.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// The local participant's connection, available once connected
    pub async fn connection(&self) -> Option<Connection> {
        self.local_connection.read().await.clone()
    }

    /// Number of participants currently in the call, computed on demand
    pub async fn connection_count(&self) -> usize {
        match self.context.try_call_client() {
            Some(client) => client.participants().await.len(),
            None => 0,
        }
    }

    /// Connect to the session's call.
    ///
    /// On success, emits `connectionCreated` for the local participant
    /// followed by `sessionConnected`. On failure, returns the engine's
    /// reason and fires no state events.
    pub async fn connect(&self, token: &str) -> CompatResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Disconnected {
                return Err(CompatError::invalid_state("disconnected", *state));
            }
            *state = SessionState::Connecting;
        }

        let data = token::connection_data(token);
        *self.connection_data.write().await = data.clone();

        let client = self.context.call_client();
        let mut rx = client.subscribe();
        let handler = SessionEventHandler::new(
            self.context.clone(),
            self.hub.clone(),
            self.state.clone(),
            self.connection_data.clone(),
        );
        let pump = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler.on_engine_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "session event pump lagged behind the engine");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(old) = self.pump.lock().await.replace(pump) {
            old.abort();
        }

        let mut request = JoinRequest::new(self.session_id.clone());
        request.token = Some(token.to_string());
        request.user_name = self.options.user_name.clone();

        match client.join(request).await {
            Ok(local) => {
                let connection = Connection::from_participant(&local, data);
                *self.local_connection.write().await = Some(connection.clone());
                *self.state.write().await = SessionState::Connected;
                info!(session = %self.session_id, "session connected");
                self.hub.emit(SessionEvent::ConnectionCreated { connection });
                self.hub.emit(SessionEvent::SessionConnected);
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = SessionState::Disconnected;
                if let Some(pump) = self.pump.lock().await.take() {
                    pump.abort();
                }
                Err(CompatError::join_failed(e))
            }
        }
    }

    /// Disconnect from the call.
    ///
    /// No-ops silently when not connected. Engine-side leave failures are
    /// logged and never surfaced; the legacy disconnect contract is
    /// best-effort.
    pub async fn disconnect(&self) {
        let client = match self.context.try_call_client() {
            Some(client) => client,
            None => return,
        };
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Disconnected {
                return;
            }
            // Marked before leaving so the engine's own left-meeting event
            // is not reported a second time.
            *state = SessionState::Disconnected;
        }

        match client.leave().await {
            Ok(()) => {
                info!(session = %self.session_id, "session disconnected");
                self.context.clear_sinks();
                self.hub.emit(SessionEvent::SessionDisconnected {
                    reason: "clientDisconnected".to_string(),
                });
            }
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "leave failed; discarding");
            }
        }

        *self.local_connection.write().await = None;
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
    }

    /// Start publishing a previously created publisher into this session.
    ///
    /// Turns local audio/video on per the publisher's properties, then
    /// completes when the engine reports the next local participant update;
    /// the matching `streamCreated` translation fires through the session
    /// handler.
    pub async fn publish(&self, publisher: &Arc<Publisher>) -> CompatResult<()> {
        if self.state().await != SessionState::Connected {
            return Err(CompatError::invalid_state("connected", self.state().await));
        }
        let client = self.context.call_client();
        publisher.set_session(&self.session_id).await;

        // Subscribed before toggling media so the resulting update cannot
        // be missed.
        let mut rx = client.subscribe();
        let properties = publisher.properties();
        client
            .set_local_audio(properties.publish_audio)
            .await
            .map_err(|e| CompatError::engine_op("publish", e))?;
        client
            .set_local_video(properties.publish_video)
            .await
            .map_err(|e| CompatError::engine_op("publish", e))?;

        // Completion is the next local participant update, observed at most
        // once.
        loop {
            match rx.recv().await {
                Ok(EngineEvent::ParticipantUpdated { participant }) if participant.local => {
                    break;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(CompatError::engine_op("publish", "engine event stream closed"));
                }
            }
        }
        info!(session = %self.session_id, "publisher active");
        Ok(())
    }

    /// Create a publisher bound to `target` and publish it in one step
    pub async fn publish_element(
        &self,
        target: Option<&str>,
        properties: PublisherProperties,
    ) -> CompatResult<Arc<Publisher>> {
        let publisher =
            crate::api::init_publisher(&self.context, target, properties, None).await?;
        self.publish(&publisher).await?;
        Ok(publisher)
    }

    /// Stop publishing: detaches the publisher and turns local media off
    pub async fn unpublish(&self, publisher: &Arc<Publisher>) -> CompatResult<()> {
        let client = self
            .context
            .try_call_client()
            .ok_or(CompatError::CallObjectNotInitialized)?;
        client
            .set_local_audio(false)
            .await
            .map_err(|e| CompatError::engine_op("unpublish", e))?;
        client
            .set_local_video(false)
            .await
            .map_err(|e| CompatError::engine_op("unpublish", e))?;
        publisher.clear_session().await;
        info!(session = %self.session_id, "publisher detached");
        Ok(())
    }

    /// Start rendering a remote stream under a target element.
    ///
    /// Fails before any sink mutation when the target element is unknown.
    /// For streams of remote participants, asks the engine to deliver their
    /// audio and video; the local participant's own stream is never
    /// engine-subscribed.
    pub async fn subscribe(
        &self,
        stream: &Stream,
        target: &str,
        properties: SubscriberProperties,
    ) -> CompatResult<Arc<Subscriber>> {
        if properties.insert_mode != InsertMode::Append {
            return Err(CompatError::not_implemented(format!(
                "insert mode {:?}",
                properties.insert_mode
            )));
        }
        if self.context.elements().get(target).is_none() {
            return Err(CompatError::TargetElementNotFound { target: target.to_string() });
        }

        let client = self.context.call_client();
        let subscriber =
            Subscriber::spawn(self.context.clone(), stream.clone(), target, properties);

        if !self.is_local_stream(&stream.id).await {
            client
                .update_remote_tracks(
                    &ParticipantId::new(stream.id.clone()),
                    TrackSubscription::all(),
                )
                .await
                .map_err(|e| CompatError::engine_op("subscribe", e))?;
        }
        info!(session = %self.session_id, stream = %stream.id, "subscribed");
        Ok(subscriber)
    }

    /// Stop rendering a subscriber's stream.
    ///
    /// The engine is told to stop delivering tracks only for remote
    /// participants. The subscriber's `destroyed` event is emitted
    /// immediately, not gated on sink teardown.
    pub async fn unsubscribe(&self, subscriber: &Arc<Subscriber>) -> CompatResult<()> {
        let client = self
            .context
            .try_call_client()
            .ok_or(CompatError::CallObjectNotInitialized)?;

        let stream_id = subscriber.stream().id.clone();
        if !self.is_local_stream(&stream_id).await {
            client
                .update_remote_tracks(
                    &ParticipantId::new(stream_id.clone()),
                    TrackSubscription::none(),
                )
                .await
                .map_err(|e| CompatError::engine_op("unsubscribe", e))?;
        }
        subscriber.shutdown("unsubscribed").await;
        info!(session = %self.session_id, stream = %stream_id, "unsubscribed");
        Ok(())
    }

    /// Send an application-level signal through the session
    pub async fn signal(&self, options: SignalOptions) -> CompatResult<()> {
        let client = self
            .context
            .try_call_client()
            .ok_or(CompatError::CallObjectNotInitialized)?;
        let payload =
            SignalPayload::encode(options.signal_type.as_deref(), options.data.as_deref());
        client
            .send_app_message(payload, options.to.map(ParticipantId::new))
            .await
            .map_err(|e| CompatError::engine_op("signal", e))
    }

    /// Forcibly disconnect another participant. Not implemented by design.
    pub async fn force_disconnect(&self, _connection: &Connection) -> CompatResult<()> {
        Err(CompatError::not_implemented("forceDisconnect"))
    }

    /// Forcibly stop another participant's publishing. Not implemented by
    /// design.
    pub async fn force_unpublish(&self, _stream: &Stream) -> CompatResult<()> {
        Err(CompatError::not_implemented("forceUnpublish"))
    }

    /// Mute every stream in the session. Not implemented by design.
    pub async fn force_mute_all(&self) -> CompatResult<()> {
        Err(CompatError::not_implemented("forceMuteAll"))
    }

    /// Mute one stream. Not implemented by design.
    pub async fn force_mute_stream(&self, _stream: &Stream) -> CompatResult<()> {
        Err(CompatError::not_implemented("forceMuteStream"))
    }

    /// Rotate the session's end-to-end encryption secret. Not implemented
    /// by design.
    pub async fn set_encryption_secret(&self, _secret: &str) -> CompatResult<()> {
        Err(CompatError::not_implemented("setEncryptionSecret"))
    }

    async fn is_local_stream(&self, stream_id: &str) -> bool {
        match self.context.try_call_client() {
            Some(client) => client
                .local_participant()
                .await
                .map(|local| local.id.as_str() == stream_id)
                .unwrap_or(false),
            None => false,
        }
    }
}
