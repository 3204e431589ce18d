//! Module-level entry points of the legacy surface
//!
//! The legacy API exposed three top-level functions; they are reproduced
//! here with the shared state made explicit through [`CompatContext`].

use std::sync::Arc;

use tracing::warn;

use roomlink_engine_core::MediaDeviceInfo;

use crate::config::{InsertMode, PublisherProperties, SessionOptions};
use crate::context::CompatContext;
use crate::error::{CompatError, CompatResult};
use crate::publisher::Publisher;
use crate::session::Session;

/// Completion callback for [`init_publisher`]; receives `None` on success
/// and the failure otherwise.
pub type PublisherCompletion = Box<dyn FnOnce(Option<CompatError>) + Send>;

/// Create a session adapter for one call/room.
///
/// Nothing touches the engine until [`Session::connect`](crate::Session::connect)
/// is called.
pub fn init_session(
    context: &Arc<CompatContext>,
    partner_id: &str,
    session_id: &str,
    options: SessionOptions,
) -> Arc<Session> {
    Session::new(context.clone(), partner_id, session_id, options)
}

/// Create a publisher for local media.
///
/// With no target element the publisher is still created and returned fully
/// usable - it just has nowhere to render - and the completion callback
/// receives the missing-target error; that split outcome is part of the
/// legacy contract. All other failures reject the call outright.
pub async fn init_publisher(
    context: &Arc<CompatContext>,
    target: Option<&str>,
    properties: PublisherProperties,
    completion: Option<PublisherCompletion>,
) -> CompatResult<Arc<Publisher>> {
    if properties.insert_mode != InsertMode::Append {
        let err = CompatError::not_implemented(format!(
            "insert mode {:?}",
            properties.insert_mode
        ));
        if let Some(completion) = completion {
            completion(Some(err.clone()));
        }
        return Err(err);
    }

    let target_error = match target {
        Some(id) if !context.elements().contains(id) => {
            Some(CompatError::TargetElementNotFound { target: id.to_string() })
        }
        None => Some(CompatError::MissingTargetElement),
        Some(_) => None,
    };

    let publisher = Publisher::create(context.clone(), target, properties).await;

    if let Some(err) = &target_error {
        warn!(error = %err, "publisher created without a usable target");
    }
    if let Some(completion) = completion {
        completion(target_error);
    }
    Ok(publisher)
}

/// List the input and output devices the engine can use
pub async fn get_devices(context: &Arc<CompatContext>) -> CompatResult<Vec<MediaDeviceInfo>> {
    context
        .call_client()
        .enumerate_devices()
        .await
        .map_err(|e| CompatError::engine_op("getDevices", e))
}
