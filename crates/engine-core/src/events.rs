//! Call-wide events emitted by the engine.
//!
//! Events are broadcast to every subscriber of the call client in the order
//! the engine produced them. The engine is free to re-announce state it has
//! already announced (a track that is already playable may see a second
//! `TrackStarted`); consumers are expected to deduplicate logically rather
//! than rely on exactly-once delivery.

use crate::types::{
    CameraErrorReason, NetworkState, Participant, ParticipantId, TrackInfo,
};

/// Everything the engine reports about the call this client is part of.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The local participant finished joining the call.
    JoinedMeeting { local: Participant },
    /// A remote participant entered the call.
    ParticipantJoined { participant: Participant },
    /// A participant's record changed (tracks, name, media state).
    ParticipantUpdated { participant: Participant },
    /// A participant left the call. The record carries their last known
    /// state.
    ParticipantLeft { participant: Participant },
    /// This client's membership in the call ended, for any reason.
    LeftMeeting,
    /// The local camera/microphone pipeline started.
    StartedCamera,
    /// The local camera/microphone pipeline could not start.
    CameraError {
        reason: CameraErrorReason,
        message: String,
    },
    /// A participant's track became live.
    TrackStarted {
        participant: Participant,
        track: TrackInfo,
    },
    /// A participant's track stopped.
    TrackStopped {
        participant: Participant,
        track: TrackInfo,
    },
    /// Connectivity of the call transport changed.
    NetworkConnection { state: NetworkState },
    /// A fatal engine error; the call is unusable afterwards.
    Error { message: String },
    /// A recoverable engine error; the call continues.
    NonfatalError { kind: String, message: String },
    /// An application-level message from another participant.
    AppMessage { from: ParticipantId, data: String },
}

impl EngineEvent {
    /// The participant this event is about, when it is about one.
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            EngineEvent::JoinedMeeting { local } => Some(local),
            EngineEvent::ParticipantJoined { participant }
            | EngineEvent::ParticipantUpdated { participant }
            | EngineEvent::ParticipantLeft { participant }
            | EngineEvent::TrackStarted { participant, .. }
            | EngineEvent::TrackStopped { participant, .. } => Some(participant),
            _ => None,
        }
    }
}
