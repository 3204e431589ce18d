//! Compat-core: legacy video-session API over the roomlink call engine
//!
//! This crate reproduces the method/event surface of a legacy
//! real-time-communication session API - sessions, publishers, subscribers,
//! streams, and connections with named events - while delegating all media
//! transport to a call engine with an entirely different participant/track
//! model. Callers written against the legacy contract observe equivalent
//! lifecycles without knowing a different engine does the work.
//!
//! ## Proper Layer Separation
//! ```text
//! compat-core -> engine-core -> {engine implementation}
//! ```
//!
//! Compat-core focuses on:
//! - Translating engine participant/track/connectivity events into legacy
//!   session, publisher, and subscriber events
//! - Idempotent media reconciliation: one rendering sink per participant,
//!   kept in sync with that participant's live tracks
//! - The legacy entity model (Stream, Connection) derived fresh from engine
//!   participant records
//!
//! Transport, signaling, and codecs are the engine's business entirely.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod publisher;
pub mod render;
pub mod session;
pub mod stream;
pub mod subscriber;
pub mod token;

// Public API exports (only high-level compat-core types)
pub use api::{PublisherCompletion, get_devices, init_publisher, init_session};
pub use config::{
    InsertMode, PublisherProperties, SessionOptions, SignalOptions,
    SubscriberProperties,
};
pub use context::CompatContext;
pub use error::{CompatError, CompatResult};
pub use events::{
    EventHub, ExceptionEvent, HandlerId, PublisherEvent, SessionEvent,
    SignalEvent, SubscriberEvent,
};
pub use publisher::Publisher;
pub use render::{MediaKind, RenderSink, SinkRegistry, sink_element_id};
pub use session::{Capabilities, Session, SessionState};
pub use stream::{Connection, Dimensions, Stream, StreamVideoType};
pub use subscriber::Subscriber;

// Re-export commonly used types from engine-core (for convenience)
pub use roomlink_engine_core::{CallClient, EngineEvent, MediaDeviceInfo, ParticipantId};

/// Compat-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
