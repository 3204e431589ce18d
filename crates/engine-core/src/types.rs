//! Participant, track, and device types exposed by the call engine.
//!
//! These types describe the engine's own view of a call: participants keyed
//! by a stable per-call session id, per-kind media tracks with a lifecycle
//! state, and input/output devices. Higher layers translate this vocabulary
//! into their own; nothing here knows about adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a participant within one call.
///
/// Assigned by the engine when the participant joins and unchanged for the
/// lifetime of their membership. Two joins by the same user produce two
/// distinct ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
    ScreenVideo,
}

/// Lifecycle state of one media track as reported by the engine.
///
/// The engine re-announces track state freely; consumers must not assume a
/// state change between two consecutive reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    /// Track exists but has not produced media yet.
    Loading,
    /// Track is live and producing media.
    Playable,
    /// Track is live but delivery is temporarily degraded.
    Interrupted,
    /// Track exists but is switched off by its owner.
    Off,
    /// Track is blocked by a device or permission problem.
    Blocked,
}

/// One media track belonging to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Stable identity of the underlying media track. Two reports with the
    /// same id refer to the same physical track.
    pub id: String,
    pub kind: TrackKind,
    pub state: TrackState,
}

impl TrackInfo {
    pub fn new(id: impl Into<String>, kind: TrackKind, state: TrackState) -> Self {
        Self { id: id.into(), kind, state }
    }
}

/// The current set of tracks a participant is sending, one slot per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTracks {
    pub audio: Option<TrackInfo>,
    pub video: Option<TrackInfo>,
    pub screen_video: Option<TrackInfo>,
}

/// One participant in the call, local or remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Display name supplied at join time, if any.
    pub user_name: Option<String>,
    /// True for the participant representing this process.
    pub local: bool,
    pub joined_at: DateTime<Utc>,
    pub tracks: MediaTracks,
    /// Native dimensions of the participant's video, when the engine knows
    /// them.
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    /// Frame rate of the participant's video, when the engine knows it.
    pub frame_rate: Option<f32>,
}

impl Participant {
    /// A participant record with no media, useful as a construction base.
    pub fn new(id: impl Into<ParticipantId>, local: bool) -> Self {
        Self {
            id: id.into(),
            user_name: None,
            local,
            joined_at: Utc::now(),
            tracks: MediaTracks::default(),
            video_width: None,
            video_height: None,
            frame_rate: None,
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_tracks(mut self, tracks: MediaTracks) -> Self {
        self.tracks = tracks;
        self
    }
}

/// Overall call membership state of this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingState {
    New,
    Joining,
    Joined,
    Leaving,
    Left,
    Error,
}

/// Connectivity of the signaling/media path, as the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkState {
    Connected,
    Interrupted,
}

/// Why a camera could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraErrorReason {
    /// The user or platform denied device access.
    NotAllowed,
    /// The device is held by another application.
    InUse,
    /// No matching device exists.
    NotFound,
    Other(String),
}

/// Kind of an enumerable media device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaDeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// One input or output device known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: MediaDeviceKind,
    pub label: String,
}

/// Which of a remote participant's tracks this client wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSubscription {
    pub audio: bool,
    pub video: bool,
}

impl TrackSubscription {
    /// Subscribe to everything the participant sends.
    pub fn all() -> Self {
        Self { audio: true, video: true }
    }

    /// Stop delivery of all of the participant's tracks.
    pub fn none() -> Self {
        Self { audio: false, video: false }
    }
}

/// Parameters for joining a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Room or call identifier understood by the engine.
    pub room: String,
    /// Opaque access token, passed through to the engine unmodified.
    pub token: Option<String>,
    pub user_name: Option<String>,
}

impl JoinRequest {
    pub fn new(room: impl Into<String>) -> Self {
        Self { room: room.into(), token: None, user_name: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }
}
