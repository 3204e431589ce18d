//! Engine-event translation for the session adapter
//!
//! `SessionEventHandler` is the bridge between the engine's call-wide event
//! stream and the legacy session events callers observe. One instance is
//! owned per session; its `on_engine_event` runs on the session's pump task,
//! so translation is serialized in engine emission order.
//!
//! Translation table:
//!
//! | engine event              | legacy event(s)                        |
//! |---------------------------|----------------------------------------|
//! | participant-joined        | connectionCreated, streamCreated       |
//! | participant-updated local | streamCreated (stream re-derived)      |
//! | participant-left          | connectionDestroyed, streamDestroyed   |
//! | left-meeting              | sessionDisconnected + sinks cleared    |
//! | error / nonfatal-error    | exception (normalized)                 |
//! | network-connection        | sessionReconnecting / sessionReconnected |
//! | app-message               | signal and signal:<type>               |

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use roomlink_engine_core::{EngineEvent, NetworkState, Participant};

use crate::context::CompatContext;
use crate::events::{EventHub, ExceptionEvent, SessionEvent, SignalEvent};
use crate::session::SessionState;
use crate::stream::{Connection, Stream};

/// Legacy code/title pair for fatal engine errors.
const EXCEPTION_FATAL: (u32, &str) = (1006, "Connect failed");
/// Legacy code/title pair for recoverable engine errors.
const EXCEPTION_NONFATAL: (u32, &str) = (2000, "Exception");

/// Wire shape of signals carried as engine app-messages.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct SignalPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    signal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl SignalPayload {
    pub(crate) fn encode(signal_type: Option<&str>, data: Option<&str>) -> String {
        let payload = SignalPayload {
            signal_type: signal_type.map(str::to_string),
            data: data.map(str::to_string),
        };
        serde_json::to_string(&payload).unwrap_or_default()
    }
}

pub(crate) struct SessionEventHandler {
    context: Arc<CompatContext>,
    hub: Arc<EventHub<SessionEvent>>,
    state: Arc<RwLock<SessionState>>,
    /// Connection data lifted from the session token at connect time; every
    /// connection the handler derives carries it, matching the legacy
    /// single-token-per-session behavior.
    connection_data: Arc<RwLock<Option<String>>>,
}

impl SessionEventHandler {
    pub(crate) fn new(
        context: Arc<CompatContext>,
        hub: Arc<EventHub<SessionEvent>>,
        state: Arc<RwLock<SessionState>>,
        connection_data: Arc<RwLock<Option<String>>>,
    ) -> Self {
        Self { context, hub, state, connection_data }
    }

    pub(crate) async fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::ParticipantJoined { participant } if !participant.local => {
                self.on_remote_joined(participant).await;
            }
            EngineEvent::ParticipantUpdated { participant } if participant.local => {
                self.on_local_updated(participant).await;
            }
            EngineEvent::ParticipantLeft { participant } => {
                self.on_participant_left(participant).await;
            }
            EngineEvent::LeftMeeting => {
                self.on_left_meeting().await;
            }
            EngineEvent::Error { message } => {
                self.emit_exception(EXCEPTION_FATAL, message);
            }
            EngineEvent::NonfatalError { kind, message } => {
                debug!(kind = %kind, "engine nonfatal error");
                self.emit_exception(EXCEPTION_NONFATAL, message);
            }
            EngineEvent::NetworkConnection { state } => {
                self.on_network_connection(state).await;
            }
            EngineEvent::AppMessage { from, data } => {
                self.on_app_message(from, data).await;
            }
            // Join completion is observed by `connect` itself; camera and
            // track events belong to the publisher/subscriber adapters.
            _ => {}
        }
    }

    async fn connection_for(&self, participant: &Participant) -> Connection {
        let data = self.connection_data.read().await.clone();
        Connection::from_participant(participant, data)
    }

    async fn on_remote_joined(&self, participant: Participant) {
        info!(participant = %participant.id, "remote participant joined");
        let connection = self.connection_for(&participant).await;
        let stream = Stream::from_participant(&participant, connection.clone());
        // A participant's connection always exists before their stream.
        self.hub.emit(SessionEvent::ConnectionCreated { connection });
        self.hub.emit(SessionEvent::StreamCreated { stream });
    }

    async fn on_local_updated(&self, participant: Participant) {
        let connection = self.connection_for(&participant).await;
        // Derived fresh on every update; never patched in place.
        let stream = Stream::from_participant(&participant, connection);
        self.hub.emit(SessionEvent::StreamCreated { stream });
    }

    async fn on_participant_left(&self, participant: Participant) {
        info!(participant = %participant.id, "participant left");
        let connection = self.connection_for(&participant).await;
        let stream = Stream::from_participant(&participant, connection.clone());
        self.hub.emit(SessionEvent::ConnectionDestroyed {
            connection,
            reason: "clientDisconnected".to_string(),
        });
        self.hub.emit(SessionEvent::StreamDestroyed {
            stream,
            reason: "clientDisconnected".to_string(),
        });
    }

    async fn on_left_meeting(&self) {
        self.context.clear_sinks();
        let mut state = self.state.write().await;
        if *state == SessionState::Disconnected {
            // An explicit disconnect already reported this.
            return;
        }
        *state = SessionState::Disconnected;
        drop(state);
        info!("call membership ended by the engine");
        self.hub.emit(SessionEvent::SessionDisconnected {
            reason: "clientDisconnected".to_string(),
        });
    }

    async fn on_network_connection(&self, network: NetworkState) {
        match network {
            NetworkState::Interrupted => {
                let mut state = self.state.write().await;
                if *state == SessionState::Connected {
                    *state = SessionState::Reconnecting;
                    drop(state);
                    warn!("session transport interrupted; reconnecting");
                    self.hub.emit(SessionEvent::SessionReconnecting);
                }
            }
            NetworkState::Connected => {
                let mut state = self.state.write().await;
                // Only a genuine recovery emits sessionReconnected; the
                // engine also reports "connected" on first join.
                if *state == SessionState::Reconnecting {
                    *state = SessionState::Connected;
                    drop(state);
                    info!("session transport recovered");
                    self.hub.emit(SessionEvent::SessionReconnected);
                }
            }
        }
    }

    async fn on_app_message(&self, from: roomlink_engine_core::ParticipantId, data: String) {
        let payload: SignalPayload = serde_json::from_str(&data).unwrap_or(SignalPayload {
            signal_type: None,
            data: Some(data),
        });

        let sender = match self.context.try_call_client() {
            Some(client) => {
                let record = client
                    .participants()
                    .await
                    .into_iter()
                    .find(|p| p.id == from);
                match record {
                    Some(participant) => Some(self.connection_for(&participant).await),
                    None => None,
                }
            }
            None => None,
        };

        let event = SignalEvent {
            signal_type: payload.signal_type.clone(),
            data: payload.data,
            from: sender,
        };
        self.hub.emit(SessionEvent::Signal(event.clone()));
        if let Some(signal_type) = &payload.signal_type {
            self.hub
                .emit_named(&format!("signal:{signal_type}"), SessionEvent::Signal(event));
        }
    }

    fn emit_exception(&self, (code, title): (u32, &str), message: String) {
        warn!(code, %message, "engine exception");
        self.hub.emit(SessionEvent::Exception(ExceptionEvent {
            code,
            message,
            title: title.to_string(),
        }));
    }
}
