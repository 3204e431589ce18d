//! Event types and the per-object event hub
//!
//! Every adapter object (session, publisher, subscriber) owns one
//! [`EventHub`] and emits a closed set of events on it. Event payloads are
//! tagged enum variants - one variant per legacy event name - so dispatch is
//! exhaustive and no payload shape is ever guessed at runtime. The legacy
//! string name of each variant is preserved via [`name()`](SessionEvent::name)
//! because handler registration is keyed by those names.
//!
//! # Registration
//!
//! Handlers are plain closures registered with [`EventHub::on`] (persistent)
//! or [`EventHub::once`] (one-shot). Removal is by the [`HandlerId`] returned
//! at registration. Delivery is synchronous, in registration order, and
//! handler panics propagate to the emitting task.
//!
//! ```rust
//! use roomlink_compat_core::events::{EventHub, SessionEvent};
//! use std::sync::{Arc, Mutex};
//!
//! let hub: EventHub<SessionEvent> = EventHub::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let seen_on = seen.clone();
//! hub.on("sessionConnected", move |_event| {
//!     seen_on.lock().unwrap().push("connected");
//! });
//!
//! hub.emit(SessionEvent::SessionConnected);
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```
//!
//! For reactive consumers and tests, every emission is also mirrored into a
//! broadcast channel available through [`EventHub::subscribe`].

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::stream::{Connection, Stream};

/// A normalized engine exception surfaced on the session
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEvent {
    /// Legacy numeric error code
    pub code: u32,
    pub message: String,
    pub title: String,
}

/// An application-level signal received through the session
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    /// Sub-type chosen by the sender, if any
    pub signal_type: Option<String>,
    pub data: Option<String>,
    /// The sending participant's connection, when it could be resolved
    pub from: Option<Connection>,
}

/// Session-level events of the legacy surface
///
/// The archive, stream-property, and forced-mute variants are declared for
/// API completeness but no code path constructs them; that capability gap is
/// part of the documented contract, not a bug.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionConnected,
    SessionDisconnected { reason: String },
    SessionReconnecting,
    SessionReconnected,
    ConnectionCreated { connection: Connection },
    ConnectionDestroyed { connection: Connection, reason: String },
    StreamCreated { stream: Stream },
    StreamDestroyed { stream: Stream, reason: String },
    Signal(SignalEvent),
    Exception(ExceptionEvent),
    ArchiveStarted { id: String, name: Option<String> },
    ArchiveStopped { id: String },
    StreamPropertyChanged { stream: Stream, property: String },
    MuteForced { active: bool },
}

impl SessionEvent {
    /// The legacy event name handlers register under
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionConnected => "sessionConnected",
            SessionEvent::SessionDisconnected { .. } => "sessionDisconnected",
            SessionEvent::SessionReconnecting => "sessionReconnecting",
            SessionEvent::SessionReconnected => "sessionReconnected",
            SessionEvent::ConnectionCreated { .. } => "connectionCreated",
            SessionEvent::ConnectionDestroyed { .. } => "connectionDestroyed",
            SessionEvent::StreamCreated { .. } => "streamCreated",
            SessionEvent::StreamDestroyed { .. } => "streamDestroyed",
            SessionEvent::Signal(_) => "signal",
            SessionEvent::Exception(_) => "exception",
            SessionEvent::ArchiveStarted { .. } => "archiveStarted",
            SessionEvent::ArchiveStopped { .. } => "archiveStopped",
            SessionEvent::StreamPropertyChanged { .. } => "streamPropertyChanged",
            SessionEvent::MuteForced { .. } => "muteForced",
        }
    }
}

/// Publisher-level events of the legacy surface
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherEvent {
    /// Device access was granted and local capture started
    AccessAllowed,
    /// Device access was denied by the user or platform
    AccessDenied,
    StreamCreated { stream: Stream },
    StreamDestroyed { stream: Stream },
    Destroyed,
}

impl PublisherEvent {
    /// The legacy event name handlers register under
    pub fn name(&self) -> &'static str {
        match self {
            PublisherEvent::AccessAllowed => "accessAllowed",
            PublisherEvent::AccessDenied => "accessDenied",
            PublisherEvent::StreamCreated { .. } => "streamCreated",
            PublisherEvent::StreamDestroyed { .. } => "streamDestroyed",
            PublisherEvent::Destroyed => "destroyed",
        }
    }
}

/// Subscriber-level events of the legacy surface
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberEvent {
    Destroyed { reason: String },
}

impl SubscriberEvent {
    /// The legacy event name handlers register under
    pub fn name(&self) -> &'static str {
        match self {
            SubscriberEvent::Destroyed { .. } => "destroyed",
        }
    }
}

/// An event type the hub can dispatch by legacy name
pub trait HubEvent: Clone + Send + 'static {
    fn name(&self) -> &'static str;
}

impl HubEvent for SessionEvent {
    fn name(&self) -> &'static str {
        SessionEvent::name(self)
    }
}

impl HubEvent for PublisherEvent {
    fn name(&self) -> &'static str {
        PublisherEvent::name(self)
    }
}

impl HubEvent for SubscriberEvent {
    fn name(&self) -> &'static str {
        SubscriberEvent::name(self)
    }
}

/// Identifier of one registered handler, used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registration<E> {
    id: HandlerId,
    event_name: String,
    once: bool,
    handler: Handler<E>,
}

/// Per-object publish/subscribe hub keyed by legacy event names
///
/// Emission delivers to all currently registered handlers for the event's
/// name, synchronously, in registration order. One-shot handlers are
/// deregistered before their first invocation runs, so re-entrant emission
/// cannot fire them twice.
pub struct EventHub<E: HubEvent> {
    registrations: RwLock<Vec<Registration<E>>>,
    mirror_tx: broadcast::Sender<E>,
}

impl<E: HubEvent> EventHub<E> {
    pub fn new() -> Self {
        let (mirror_tx, _) = broadcast::channel(256);
        Self {
            registrations: RwLock::new(Vec::new()),
            mirror_tx,
        }
    }

    /// Register a persistent handler for a legacy event name
    pub fn on(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> HandlerId {
        self.register(event_name.into(), false, Arc::new(handler))
    }

    /// Register a one-shot handler; it fires at most once
    pub fn once(
        &self,
        event_name: impl Into<String>,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> HandlerId {
        self.register(event_name.into(), true, Arc::new(handler))
    }

    /// Remove a handler by the id returned at registration
    ///
    /// Returns `true` if the handler was still registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut registrations = self.registrations.write().unwrap();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Number of handlers currently registered for an event name
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.registrations
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.event_name == event_name)
            .count()
    }

    /// Emit an event under its own name
    pub fn emit(&self, event: E) {
        self.dispatch(event.name(), &event);
        let _ = self.mirror_tx.send(event);
    }

    /// Emit an event under an alternate name
    ///
    /// Used for the `signal:<type>` secondary naming convention; the payload
    /// is delivered unchanged.
    pub fn emit_named(&self, event_name: &str, event: E) {
        self.dispatch(event_name, &event);
        let _ = self.mirror_tx.send(event);
    }

    /// Subscribe to the broadcast mirror of every emission
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.mirror_tx.subscribe()
    }

    fn register(&self, event_name: String, once: bool, handler: Handler<E>) -> HandlerId {
        let id = HandlerId(Uuid::new_v4());
        self.registrations.write().unwrap().push(Registration {
            id,
            event_name,
            once,
            handler,
        });
        id
    }

    fn dispatch(&self, event_name: &str, event: &E) {
        // Snapshot matching handlers so user code runs without the lock held
        // and handlers may register/deregister freely.
        let matching: Vec<(HandlerId, bool, Handler<E>)> = {
            let registrations = self.registrations.read().unwrap();
            registrations
                .iter()
                .filter(|r| r.event_name == event_name)
                .map(|r| (r.id, r.once, r.handler.clone()))
                .collect()
        };

        let once_ids: Vec<HandlerId> = matching
            .iter()
            .filter(|(_, once, _)| *once)
            .map(|(id, _, _)| *id)
            .collect();
        if !once_ids.is_empty() {
            self.registrations
                .write()
                .unwrap()
                .retain(|r| !once_ids.contains(&r.id));
        }

        for (_, _, handler) in &matching {
            handler(event);
        }
    }
}

impl<E: HubEvent> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}
