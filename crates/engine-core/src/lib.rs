//! Engine-core: call-engine client boundary for roomlink
//!
//! This crate defines the surface through which roomlink adapters drive a
//! real-time call engine: the [`CallClient`] control trait, the
//! [`EngineEvent`] stream, and the participant/track/device vocabulary the
//! engine speaks. Adapters depend on this crate only; concrete engines
//! implement it.
//!
//! ## Layering
//! ```text
//! compat layers -> engine-core -> {engine implementation: transport, signaling, codecs}
//! ```
//!
//! The crate also ships [`mock::MockCallClient`], a scriptable in-memory
//! engine used by adapter test suites.

pub mod client;
pub mod events;
pub mod mock;
pub mod types;

// Public API exports
pub use client::{CallClient, EngineError, EngineResult};
pub use events::EngineEvent;
pub use types::{
    CameraErrorReason, JoinRequest, MediaDeviceInfo, MediaDeviceKind,
    MediaTracks, MeetingState, NetworkState, Participant, ParticipantId,
    TrackInfo, TrackKind, TrackState, TrackSubscription,
};

/// Engine-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
