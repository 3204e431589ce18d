//! Shared adapter context
//!
//! The legacy design kept one process-wide call object that every adapter
//! found through implicit global lookup. Here that shared state is an
//! explicit [`CompatContext`] passed by reference to every adapter
//! constructor: it owns the call-client factory, the single lazily-created
//! call client all adapters share, the rendering-sink registry, and the
//! mount-point registry. The one-call-per-process assumption becomes
//! one-call-per-context.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use roomlink_engine_core::CallClient;

use crate::render::{ElementRegistry, SinkRegistry};

type CallClientFactory = Box<dyn Fn() -> Arc<dyn CallClient> + Send + Sync>;

/// Shared state for one family of session/publisher/subscriber adapters
pub struct CompatContext {
    factory: CallClientFactory,
    client: OnceLock<Arc<dyn CallClient>>,
    sinks: SinkRegistry,
    elements: ElementRegistry,
}

impl CompatContext {
    /// Create a context that builds its call client on first use
    pub fn new(factory: impl Fn() -> Arc<dyn CallClient> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            factory: Box::new(factory),
            client: OnceLock::new(),
            sinks: SinkRegistry::new(),
            elements: ElementRegistry::new(),
        })
    }

    /// Create a context around an existing call client
    pub fn with_client(client: Arc<dyn CallClient>) -> Arc<Self> {
        let ctx = Self::new(move || client.clone());
        // Resolve immediately; the factory only exists to satisfy laziness.
        let _ = ctx.call_client();
        ctx
    }

    /// The shared call client, created on first access and reused by every
    /// adapter afterwards
    pub fn call_client(&self) -> Arc<dyn CallClient> {
        self.client
            .get_or_init(|| {
                debug!("creating shared call client");
                (self.factory)()
            })
            .clone()
    }

    /// The shared call client only if it has already been created
    pub fn try_call_client(&self) -> Option<Arc<dyn CallClient>> {
        self.client.get().cloned()
    }

    /// The rendering-sink registry shared by all adapters of this context
    pub fn sinks(&self) -> &SinkRegistry {
        &self.sinks
    }

    /// The mount-point registry adapters resolve target elements against
    pub fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    /// Detach a sink from its mount point, if it was attached
    pub(crate) fn detach_sink(&self, sink: &crate::render::RenderSink) {
        if let Some(root_id) = sink.root_id() {
            if let Some(root) = self.elements.get(&root_id) {
                root.remove_child(sink.element_id());
            }
        }
    }

    /// Remove every sink and detach each from its mount point
    pub(crate) fn clear_sinks(&self) {
        for sink in self.sinks.clear() {
            self.detach_sink(&sink);
        }
    }
}
