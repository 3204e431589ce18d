//! Configuration types for the legacy surface
//!
//! The legacy API accepted loose property bags whose shape was sniffed at
//! runtime; here every call shape has an explicit struct with builder-style
//! `with_*` methods and sane defaults.

use serde::{Deserialize, Serialize};

use crate::stream::Dimensions;

/// Where a rendering element is placed relative to its target.
///
/// Only `Append` is implemented; the other modes exist for API
/// compatibility and are rejected with a not-implemented error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InsertMode {
    #[default]
    Append,
    Replace,
    Before,
    After,
}

/// Options for creating a session adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Display name announced to the engine at join time
    pub user_name: Option<String>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }
}

/// Properties for creating a publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherProperties {
    /// Whether the microphone is published initially
    pub publish_audio: bool,
    /// Whether the camera is published initially
    pub publish_video: bool,
    /// Display size applied to the publisher's rendering sink
    pub dimensions: Option<Dimensions>,
    pub insert_mode: InsertMode,
    /// Display name attached to the published stream
    pub name: Option<String>,
}

impl Default for PublisherProperties {
    fn default() -> Self {
        Self {
            publish_audio: true,
            publish_video: true,
            dimensions: None,
            insert_mode: InsertMode::Append,
            name: None,
        }
    }
}

impl PublisherProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publish_audio(mut self, publish_audio: bool) -> Self {
        self.publish_audio = publish_audio;
        self
    }

    pub fn with_publish_video(mut self, publish_video: bool) -> Self {
        self.publish_video = publish_video;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_insert_mode(mut self, insert_mode: InsertMode) -> Self {
        self.insert_mode = insert_mode;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Properties for subscribing to a remote stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriberProperties {
    /// Display size applied to the subscriber's rendering sink
    pub dimensions: Option<Dimensions>,
    pub insert_mode: InsertMode,
}

impl SubscriberProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_insert_mode(mut self, insert_mode: InsertMode) -> Self {
        self.insert_mode = insert_mode;
        self
    }
}

/// Options for sending a signal through the session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalOptions {
    /// Signal sub-type; receivers also observe `signal:<type>`
    pub signal_type: Option<String>,
    pub data: Option<String>,
    /// Target connection id; `None` broadcasts to the whole session
    pub to: Option<String>,
}

impl SignalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, signal_type: impl Into<String>) -> Self {
        self.signal_type = Some(signal_type.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }
}
