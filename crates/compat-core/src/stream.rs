//! Legacy stream and connection entities
//!
//! `Connection` and `Stream` are the caller-facing descriptions of a
//! participant and of their published media. Both are built by pure
//! factories from the engine's participant records and are never mutated in
//! place: whenever a participant's media state changes, a fresh `Stream` is
//! derived from the current record so callers can never observe a stale
//! cached one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomlink_engine_core::{Participant, TrackInfo, TrackState};

/// Video dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Legacy camera default reported when the engine does not know the
/// participant's real video geometry.
pub const DEFAULT_DIMENSIONS: Dimensions = Dimensions { width: 1280, height: 720 };

/// Legacy camera default frame rate.
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// Source type of a stream's video. Only camera video exists in this
/// design; screen sharing is not part of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamVideoType {
    Camera,
}

/// An opaque participant identity within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Stable per-participant id for the session's lifetime
    pub connection_id: String,
    pub creation_time: DateTime<Utc>,
    /// Application-supplied opaque payload, from the token's embedded claim
    /// when present
    pub data: Option<String>,
}

impl Connection {
    /// Build a connection from an engine participant record
    pub fn from_participant(participant: &Participant, data: Option<String>) -> Self {
        Self {
            connection_id: participant.id.to_string(),
            creation_time: participant.joined_at,
            data,
        }
    }
}

/// One participant's published media as the legacy surface describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream id; equals the engine participant session id
    pub id: String,
    pub has_audio: bool,
    pub has_video: bool,
    pub frame_rate: f32,
    pub video_dimensions: Dimensions,
    pub video_type: StreamVideoType,
    pub creation_time: DateTime<Utc>,
    /// The owning participant's connection
    pub connection: Connection,
}

impl Stream {
    /// Derive a stream from the current engine participant record.
    ///
    /// Always computes flags from the participant's live tracks; callers
    /// must re-invoke this on every media change instead of patching a
    /// previously derived value.
    pub fn from_participant(participant: &Participant, connection: Connection) -> Self {
        let tracks = ActiveTracks::from_participant(participant);
        let video_dimensions = match (participant.video_width, participant.video_height) {
            (Some(width), Some(height)) => Dimensions { width, height },
            _ => DEFAULT_DIMENSIONS,
        };
        Self {
            id: participant.id.to_string(),
            has_audio: tracks.audio.is_some(),
            has_video: tracks.video.is_some(),
            frame_rate: participant.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            video_dimensions,
            video_type: StreamVideoType::Camera,
            creation_time: participant.joined_at,
            connection,
        }
    }
}

/// A participant's usable tracks, filtered to the states that can carry
/// media.
///
/// A track is present only when its engine state is one of playable,
/// interrupted, or loading; any other state (off, blocked) is treated as
/// the track being absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveTracks {
    pub audio: Option<TrackInfo>,
    pub video: Option<TrackInfo>,
    pub screen_video: Option<TrackInfo>,
}

impl ActiveTracks {
    pub fn from_participant(participant: &Participant) -> Self {
        Self {
            audio: usable(&participant.tracks.audio),
            video: usable(&participant.tracks.video),
            screen_video: usable(&participant.tracks.screen_video),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none() && self.screen_video.is_none()
    }
}

fn usable(track: &Option<TrackInfo>) -> Option<TrackInfo> {
    track.as_ref().filter(|t| {
        matches!(
            t.state,
            TrackState::Playable | TrackState::Interrupted | TrackState::Loading
        )
    }).cloned()
}
