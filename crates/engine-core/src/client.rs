//! The call-client control surface.
//!
//! `CallClient` is the boundary between the engine and everything built on
//! top of it: adapters drive the call through its methods and observe it
//! through the broadcast event stream returned by [`CallClient::subscribe`].
//! Implementations own transport, signaling, and codecs; callers treat all
//! of that as a black box.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::events::EngineEvent;
use crate::types::{
    JoinRequest, MediaDeviceInfo, MeetingState, Participant, ParticipantId,
    TrackSubscription,
};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by call-client operations.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Join failed: {reason}")]
    JoinFailed { reason: String },

    #[error("Not in a call")]
    NotInCall,

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Operation failed: {operation}: {reason}")]
    OperationFailed { operation: String, reason: String },
}

impl EngineError {
    pub fn join_failed(reason: impl Into<String>) -> Self {
        Self::JoinFailed { reason: reason.into() }
    }

    pub fn operation_failed(
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Control surface of one call client.
///
/// A call client represents at most one concurrent call. Methods that act on
/// the call fail with [`EngineError::NotInCall`] when no call is active,
/// except where documented otherwise. All methods are safe to invoke from
/// any task.
#[async_trait]
pub trait CallClient: Send + Sync {
    /// Join a call. Resolves with the local participant record once the
    /// engine has completed the join handshake.
    async fn join(&self, request: JoinRequest) -> EngineResult<Participant>;

    /// Leave the current call. Idempotent: leaving while not in a call is a
    /// no-op.
    async fn leave(&self) -> EngineResult<()>;

    /// Start the local camera/microphone pipeline without joining a call.
    /// Device failures surface as [`EngineEvent::CameraError`], not as an
    /// `Err` return.
    async fn start_camera(&self) -> EngineResult<()>;

    /// Enable or disable the local audio track.
    async fn set_local_audio(&self, enabled: bool) -> EngineResult<()>;

    /// Enable or disable the local video track.
    async fn set_local_video(&self, enabled: bool) -> EngineResult<()>;

    /// Change which of a remote participant's tracks are delivered to this
    /// client.
    async fn update_remote_tracks(
        &self,
        participant: &ParticipantId,
        subscription: TrackSubscription,
    ) -> EngineResult<()>;

    /// Switch the active input devices. `None` leaves that input unchanged.
    async fn set_input_devices(
        &self,
        audio_device_id: Option<String>,
        video_device_id: Option<String>,
    ) -> EngineResult<()>;

    /// Switch to the next available camera, returning the one now active.
    async fn cycle_camera(&self) -> EngineResult<Option<MediaDeviceInfo>>;

    /// The currently selected audio input device.
    async fn audio_input_device(&self) -> EngineResult<Option<MediaDeviceInfo>>;

    /// The currently selected video input device.
    async fn video_input_device(&self) -> EngineResult<Option<MediaDeviceInfo>>;

    /// Send an application-level message to one participant, or to everyone
    /// when `to` is `None`.
    async fn send_app_message(
        &self,
        data: String,
        to: Option<ParticipantId>,
    ) -> EngineResult<()>;

    /// All input and output devices currently visible to the engine.
    async fn enumerate_devices(&self) -> EngineResult<Vec<MediaDeviceInfo>>;

    /// Current membership state of this client.
    async fn meeting_state(&self) -> MeetingState;

    /// Every participant currently in the call, local included.
    async fn participants(&self) -> Vec<Participant>;

    /// The local participant record, once joined.
    async fn local_participant(&self) -> Option<Participant>;

    /// Subscribe to the call's event stream. Each receiver observes events
    /// in emission order; events emitted before subscription are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}
