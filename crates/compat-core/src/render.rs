//! Rendering sinks and the media reconciliation algorithm
//!
//! A rendering sink is the one output element that plays back a
//! participant's tracks. Sinks are keyed deterministically
//! (`sink-<participant session id>`), so no matter how many times the engine
//! re-announces an unchanged track, at most one sink exists per participant
//! and repeated reconciliation is a no-op.
//!
//! Reconciliation only creates and updates sinks; attaching a newly created
//! sink under its mount point is the caller's responsibility, which keeps
//! insert-mode policy out of this module.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tracing::{debug, warn};

use roomlink_engine_core::ParticipantId;

use crate::stream::{ActiveTracks, Dimensions};

/// Media kind of an attached sink track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// One track attached to a sink's media stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTrack {
    /// Identity of the underlying engine track
    pub id: String,
    pub kind: MediaKind,
}

/// The per-participant output element
///
/// Holds the attached media stream (its track set) and display geometry.
/// The attached track set always reflects the most recently observed track
/// identities for the owning participant.
#[derive(Debug)]
pub struct RenderSink {
    element_id: String,
    participant: ParticipantId,
    root_id: Option<String>,
    dimensions: RwLock<Option<Dimensions>>,
    tracks: RwLock<Vec<SinkTrack>>,
}

impl RenderSink {
    /// The sink's deterministic element id (`sink-<participant id>`)
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// The mount point this sink was created under, if any
    pub fn root_id(&self) -> Option<String> {
        self.root_id.clone()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        *self.dimensions.read().unwrap()
    }

    /// Snapshot of the attached track set
    pub fn tracks(&self) -> Vec<SinkTrack> {
        self.tracks.read().unwrap().clone()
    }

    /// The first attached track of a kind, if any
    pub fn track(&self, kind: MediaKind) -> Option<SinkTrack> {
        self.tracks
            .read()
            .unwrap()
            .iter()
            .find(|t| t.kind == kind)
            .cloned()
    }

    fn reconcile_kind(&self, kind: MediaKind, new_id: Option<&str>) {
        let mut tracks = self.tracks.write().unwrap();
        let existing: Vec<usize> = tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == kind)
            .map(|(i, _)| i)
            .collect();
        if existing.len() > 1 {
            warn!(
                participant = %self.participant,
                ?kind,
                count = existing.len(),
                "sink holds more than one track of a kind; considering only the first"
            );
        }
        match (existing.first().copied(), new_id) {
            (None, Some(id)) => {
                tracks.push(SinkTrack { id: id.to_string(), kind });
            }
            (Some(index), Some(id)) => {
                if tracks[index].id != id {
                    debug!(
                        participant = %self.participant,
                        ?kind,
                        old = %tracks[index].id,
                        new = %id,
                        "replacing sink track"
                    );
                    tracks[index] = SinkTrack { id: id.to_string(), kind };
                }
            }
            (Some(index), None) => {
                debug!(participant = %self.participant, ?kind, "dropping ended sink track");
                tracks.remove(index);
            }
            (None, None) => {}
        }
    }
}

/// Deterministic sink element id for a participant
pub fn sink_element_id(participant: &ParticipantId) -> String {
    format!("sink-{participant}")
}

/// Registry holding at most one rendering sink per participant
pub struct SinkRegistry {
    sinks: DashMap<String, Arc<RenderSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self { sinks: DashMap::new() }
    }

    /// Look up a participant's sink
    pub fn get(&self, participant: &ParticipantId) -> Option<Arc<RenderSink>> {
        self.sinks
            .get(&sink_element_id(participant))
            .map(|entry| entry.value().clone())
    }

    /// Create-or-update the participant's sink from their current tracks.
    ///
    /// Returns the sink and whether it was newly created. A newly created
    /// sink has not been attached anywhere; the caller attaches it exactly
    /// once. Calling this again with unchanged track identities changes
    /// nothing.
    pub fn reconcile(
        &self,
        participant: &ParticipantId,
        tracks: &ActiveTracks,
        root_id: Option<&str>,
        dimensions: Option<Dimensions>,
    ) -> (Arc<RenderSink>, bool) {
        let element_id = sink_element_id(participant);

        if let Some(sink) = self.sinks.get(&element_id).map(|e| e.value().clone()) {
            sink.reconcile_kind(MediaKind::Audio, tracks.audio.as_ref().map(|t| t.id.as_str()));
            sink.reconcile_kind(MediaKind::Video, tracks.video.as_ref().map(|t| t.id.as_str()));
            if let Some(dims) = dimensions {
                *sink.dimensions.write().unwrap() = Some(dims);
            }
            return (sink, false);
        }

        let mut attached = Vec::new();
        if let Some(video) = &tracks.video {
            attached.push(SinkTrack { id: video.id.clone(), kind: MediaKind::Video });
        }
        if let Some(audio) = &tracks.audio {
            attached.push(SinkTrack { id: audio.id.clone(), kind: MediaKind::Audio });
        }
        let sink = Arc::new(RenderSink {
            element_id: element_id.clone(),
            participant: participant.clone(),
            root_id: root_id.map(|r| r.to_string()),
            dimensions: RwLock::new(dimensions),
            tracks: RwLock::new(attached),
        });
        debug!(participant = %participant, element = %element_id, "created rendering sink");
        self.sinks.insert(element_id, sink.clone());
        (sink, true)
    }

    /// Remove a participant's sink, returning it if one existed
    pub fn remove(&self, participant: &ParticipantId) -> Option<Arc<RenderSink>> {
        self.sinks
            .remove(&sink_element_id(participant))
            .map(|(_, sink)| sink)
    }

    /// Drop every sink, returning the removed set so callers can detach them
    pub fn clear(&self) -> Vec<Arc<RenderSink>> {
        let removed: Vec<Arc<RenderSink>> = self
            .sinks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sinks.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A mount point callers attach sinks under
///
/// Stands in for the host page element the legacy surface renders into;
/// children are recorded by element id.
#[derive(Debug)]
pub struct MountPoint {
    id: String,
    children: RwLock<Vec<String>>,
}

impl MountPoint {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a child element id (legacy append insert mode)
    pub fn append_child(&self, child_id: &str) {
        self.children.write().unwrap().push(child_id.to_string());
    }

    /// Remove a child element id; returns whether it was present
    pub fn remove_child(&self, child_id: &str) -> bool {
        let mut children = self.children.write().unwrap();
        let before = children.len();
        children.retain(|c| c != child_id);
        children.len() != before
    }

    pub fn children(&self) -> Vec<String> {
        self.children.read().unwrap().clone()
    }
}

/// Registry of mount points addressable by element id
pub struct ElementRegistry {
    elements: DashMap<String, Arc<MountPoint>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self { elements: DashMap::new() }
    }

    /// Register a mount point, creating it if absent
    pub fn create_element(&self, id: impl Into<String>) -> Arc<MountPoint> {
        let id = id.into();
        self.elements
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(MountPoint { id, children: RwLock::new(Vec::new()) })
            })
            .value()
            .clone()
    }

    /// Resolve a mount point by element id
    pub fn get(&self, id: &str) -> Option<Arc<MountPoint>> {
        self.elements.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomlink_engine_core::{TrackInfo, TrackKind, TrackState};

    fn tracks(audio_id: Option<&str>, video_id: Option<&str>) -> ActiveTracks {
        ActiveTracks {
            audio: audio_id
                .map(|id| TrackInfo::new(id, TrackKind::Audio, TrackState::Playable)),
            video: video_id
                .map(|id| TrackInfo::new(id, TrackKind::Video, TrackState::Playable)),
            screen_video: None,
        }
    }

    #[test]
    fn first_reconcile_creates_the_sink() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        let (sink, created) =
            registry.reconcile(&pid, &tracks(Some("a1"), Some("v1")), Some("root"), None);
        assert!(created);
        assert_eq!(sink.element_id(), "sink-peer-1");
        assert_eq!(sink.tracks().len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_reconcile_with_unchanged_tracks_is_a_noop() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");
        let current = tracks(Some("a1"), Some("v1"));

        let (first, created) = registry.reconcile(&pid, &current, Some("root"), None);
        assert!(created);
        let snapshot = first.tracks();

        for _ in 0..3 {
            let (sink, created) = registry.reconcile(&pid, &current, Some("root"), None);
            assert!(!created);
            assert!(Arc::ptr_eq(&sink, &first));
            assert_eq!(sink.tracks(), snapshot);
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn changed_identity_replaces_exactly_one_track() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        registry.reconcile(&pid, &tracks(Some("a1"), Some("v1")), None, None);
        let (sink, created) =
            registry.reconcile(&pid, &tracks(Some("a1"), Some("v2")), None, None);
        assert!(!created);

        let attached = sink.tracks();
        assert_eq!(attached.len(), 2);
        assert_eq!(sink.track(MediaKind::Video).unwrap().id, "v2");
        assert_eq!(sink.track(MediaKind::Audio).unwrap().id, "a1");
        assert!(!attached.iter().any(|t| t.id == "v1"), "stale track left attached");
    }

    #[test]
    fn a_kind_appearing_later_is_added() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        let (sink, _) = registry.reconcile(&pid, &tracks(None, Some("v1")), None, None);
        assert!(sink.track(MediaKind::Audio).is_none());

        registry.reconcile(&pid, &tracks(Some("a1"), Some("v1")), None, None);
        assert_eq!(sink.track(MediaKind::Audio).unwrap().id, "a1");
    }

    #[test]
    fn a_kind_disappearing_is_dropped() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        registry.reconcile(&pid, &tracks(Some("a1"), Some("v1")), None, None);
        let (sink, _) = registry.reconcile(&pid, &tracks(None, Some("v1")), None, None);

        assert!(sink.track(MediaKind::Audio).is_none());
        assert_eq!(sink.tracks().len(), 1);
    }

    #[test]
    fn dimensions_update_on_reconcile() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        let (sink, _) = registry.reconcile(&pid, &tracks(None, Some("v1")), None, None);
        assert!(sink.dimensions().is_none());

        registry.reconcile(&pid, &tracks(None, Some("v1")), None, Some(Dimensions::new(320, 240)));
        assert_eq!(sink.dimensions(), Some(Dimensions::new(320, 240)));
    }

    #[test]
    fn remove_returns_the_sink_once() {
        let registry = SinkRegistry::new();
        let pid = ParticipantId::new("peer-1");

        registry.reconcile(&pid, &tracks(Some("a1"), None), None, None);
        assert!(registry.remove(&pid).is_some());
        assert!(registry.remove(&pid).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_returns_every_sink() {
        let registry = SinkRegistry::new();
        registry.reconcile(&ParticipantId::new("p1"), &tracks(Some("a1"), None), None, None);
        registry.reconcile(&ParticipantId::new("p2"), &tracks(None, Some("v1")), None, None);

        let removed = registry.clear();
        assert_eq!(removed.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn mount_point_tracks_children() {
        let elements = ElementRegistry::new();
        let root = elements.create_element("root");
        assert!(elements.contains("root"));

        root.append_child("sink-p1");
        assert_eq!(root.children(), vec!["sink-p1".to_string()]);
        assert!(root.remove_child("sink-p1"));
        assert!(!root.remove_child("sink-p1"));
        assert!(root.children().is_empty());
    }
}
