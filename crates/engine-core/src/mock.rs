//! In-memory call client for tests.
//!
//! `MockCallClient` implements [`CallClient`] without any transport. Tests
//! script it in two ways: the control methods mutate its participant table
//! and emit the events a real engine would, and [`MockCallClient::emit`]
//! injects arbitrary events directly. Every control call is recorded so
//! tests can assert exactly what an adapter asked the engine to do.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::{CallClient, EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::types::{
    CameraErrorReason, JoinRequest, MediaDeviceInfo, MediaDeviceKind,
    MeetingState, Participant, ParticipantId, TrackInfo, TrackKind, TrackState,
    TrackSubscription,
};

/// One recorded control-surface invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    Join { room: String },
    Leave,
    StartCamera,
    SetLocalAudio(bool),
    SetLocalVideo(bool),
    UpdateRemoteTracks {
        participant: ParticipantId,
        subscription: TrackSubscription,
    },
    SetInputDevices {
        audio_device_id: Option<String>,
        video_device_id: Option<String>,
    },
    CycleCamera,
    SendAppMessage { to: Option<ParticipantId> },
}

struct MockState {
    meeting_state: MeetingState,
    local: Option<Participant>,
    remotes: Vec<Participant>,
    control_log: Vec<ControlCall>,
    join_error: Option<String>,
    camera_error: Option<(CameraErrorReason, String)>,
    devices: Vec<MediaDeviceInfo>,
    audio_device: Option<MediaDeviceInfo>,
    video_device: Option<MediaDeviceInfo>,
    local_id: ParticipantId,
}

/// Scriptable in-memory engine.
pub struct MockCallClient {
    state: Mutex<MockState>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl MockCallClient {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(MockState {
                meeting_state: MeetingState::New,
                local: None,
                remotes: Vec::new(),
                control_log: Vec::new(),
                join_error: None,
                camera_error: None,
                devices: default_devices(),
                audio_device: None,
                video_device: None,
                local_id: ParticipantId::new("local-participant"),
            }),
            event_tx,
        }
    }

    /// Use a specific id for the local participant created by `join`.
    pub fn with_local_id(self, id: impl Into<ParticipantId>) -> Self {
        self.state.lock().unwrap().local_id = id.into();
        self
    }

    /// Make the next `join` fail with the given reason.
    pub fn fail_next_join(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().join_error = Some(reason.into());
    }

    /// Make the next `start_camera` report a camera error event.
    pub fn fail_next_camera(&self, reason: CameraErrorReason, message: impl Into<String>) {
        self.state.lock().unwrap().camera_error = Some((reason, message.into()));
    }

    /// Replace the enumerable device list.
    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        self.state.lock().unwrap().devices = devices;
    }

    /// Inject a raw event into the stream, bypassing state bookkeeping.
    pub fn emit(&self, event: EngineEvent) {
        debug!(?event, "mock engine emitting");
        let _ = self.event_tx.send(event);
    }

    /// Every control call made so far, in order.
    pub fn control_log(&self) -> Vec<ControlCall> {
        self.state.lock().unwrap().control_log.clone()
    }

    /// Add a remote participant and announce the join.
    pub fn join_remote(&self, participant: Participant) {
        {
            let mut state = self.state.lock().unwrap();
            state.remotes.retain(|p| p.id != participant.id);
            state.remotes.push(participant.clone());
        }
        self.emit(EngineEvent::ParticipantJoined { participant });
    }

    /// Replace a remote participant's record and announce the update.
    pub fn update_remote(&self, participant: Participant) {
        {
            let mut state = self.state.lock().unwrap();
            state.remotes.retain(|p| p.id != participant.id);
            state.remotes.push(participant.clone());
        }
        self.emit(EngineEvent::ParticipantUpdated { participant });
    }

    /// Remove a remote participant and announce the departure.
    pub fn leave_remote(&self, id: &ParticipantId) {
        let record = {
            let mut state = self.state.lock().unwrap();
            let record = state.remotes.iter().find(|p| &p.id == id).cloned();
            state.remotes.retain(|p| &p.id != id);
            record
        };
        if let Some(participant) = record {
            self.emit(EngineEvent::ParticipantLeft { participant });
        }
    }

    /// Announce a remote track start, updating the participant record so
    /// later `participants()` calls agree with the event.
    pub fn start_remote_track(&self, id: &ParticipantId, track: TrackInfo) {
        let record = {
            let mut state = self.state.lock().unwrap();
            let record = state.remotes.iter_mut().find(|p| &p.id == id);
            record.map(|p| {
                match track.kind {
                    TrackKind::Audio => p.tracks.audio = Some(track.clone()),
                    TrackKind::Video => p.tracks.video = Some(track.clone()),
                    TrackKind::ScreenVideo => {
                        p.tracks.screen_video = Some(track.clone())
                    }
                }
                p.clone()
            })
        };
        if let Some(participant) = record {
            self.emit(EngineEvent::TrackStarted { participant, track });
        }
    }

    fn toggle_local_track(
        &self,
        kind: TrackKind,
        enabled: bool,
    ) -> Option<(Participant, TrackInfo, bool)> {
        let mut state = self.state.lock().unwrap();
        let local_id = state.local_id.clone();
        let local = state.local.as_mut()?;
        let slot = match kind {
            TrackKind::Audio => &mut local.tracks.audio,
            TrackKind::Video => &mut local.tracks.video,
            TrackKind::ScreenVideo => &mut local.tracks.screen_video,
        };
        let track = if enabled {
            let track = TrackInfo::new(
                format!("{}-{}", local_id, kind_tag(kind)),
                kind,
                TrackState::Playable,
            );
            *slot = Some(track.clone());
            track
        } else {
            match slot.take() {
                Some(mut track) => {
                    track.state = TrackState::Off;
                    track
                }
                None => return None,
            }
        };
        Some((local.clone(), track, enabled))
    }

    fn announce_local_track(&self, change: Option<(Participant, TrackInfo, bool)>) {
        if let Some((participant, track, started)) = change {
            if started {
                self.emit(EngineEvent::TrackStarted {
                    participant: participant.clone(),
                    track,
                });
            } else {
                self.emit(EngineEvent::TrackStopped {
                    participant: participant.clone(),
                    track,
                });
            }
            self.emit(EngineEvent::ParticipantUpdated { participant });
        }
    }
}

impl Default for MockCallClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallClient for MockCallClient {
    async fn join(&self, request: JoinRequest) -> EngineResult<Participant> {
        let local = {
            let mut state = self.state.lock().unwrap();
            state.control_log.push(ControlCall::Join { room: request.room.clone() });
            if let Some(reason) = state.join_error.take() {
                state.meeting_state = MeetingState::Error;
                return Err(EngineError::join_failed(reason));
            }
            state.meeting_state = MeetingState::Joined;
            let mut local = Participant::new(state.local_id.clone(), true);
            local.user_name = request.user_name.clone();
            state.local = Some(local.clone());
            local
        };
        self.emit(EngineEvent::JoinedMeeting { local: local.clone() });
        Ok(local)
    }

    async fn leave(&self) -> EngineResult<()> {
        let was_joined = {
            let mut state = self.state.lock().unwrap();
            state.control_log.push(ControlCall::Leave);
            let was_joined = state.meeting_state == MeetingState::Joined;
            state.meeting_state = MeetingState::Left;
            state.local = None;
            state.remotes.clear();
            was_joined
        };
        if was_joined {
            self.emit(EngineEvent::LeftMeeting);
        }
        Ok(())
    }

    async fn start_camera(&self) -> EngineResult<()> {
        let camera_error = {
            let mut state = self.state.lock().unwrap();
            state.control_log.push(ControlCall::StartCamera);
            if state.local.is_none() {
                let local = Participant::new(state.local_id.clone(), true);
                state.local = Some(local);
            }
            state.camera_error.take()
        };
        if let Some((reason, message)) = camera_error {
            self.emit(EngineEvent::CameraError { reason, message });
            return Ok(());
        }
        self.emit(EngineEvent::StartedCamera);
        self.announce_local_track(self.toggle_local_track(TrackKind::Video, true));
        self.announce_local_track(self.toggle_local_track(TrackKind::Audio, true));
        Ok(())
    }

    async fn set_local_audio(&self, enabled: bool) -> EngineResult<()> {
        self.state
            .lock()
            .unwrap()
            .control_log
            .push(ControlCall::SetLocalAudio(enabled));
        self.announce_local_track(self.toggle_local_track(TrackKind::Audio, enabled));
        Ok(())
    }

    async fn set_local_video(&self, enabled: bool) -> EngineResult<()> {
        self.state
            .lock()
            .unwrap()
            .control_log
            .push(ControlCall::SetLocalVideo(enabled));
        self.announce_local_track(self.toggle_local_track(TrackKind::Video, enabled));
        Ok(())
    }

    async fn update_remote_tracks(
        &self,
        participant: &ParticipantId,
        subscription: TrackSubscription,
    ) -> EngineResult<()> {
        self.state.lock().unwrap().control_log.push(ControlCall::UpdateRemoteTracks {
            participant: participant.clone(),
            subscription,
        });
        Ok(())
    }

    async fn set_input_devices(
        &self,
        audio_device_id: Option<String>,
        video_device_id: Option<String>,
    ) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.control_log.push(ControlCall::SetInputDevices {
            audio_device_id: audio_device_id.clone(),
            video_device_id: video_device_id.clone(),
        });
        if let Some(id) = audio_device_id {
            let found = find_device(&state.devices, &id)?;
            state.audio_device = found;
        }
        if let Some(id) = video_device_id {
            let found = find_device(&state.devices, &id)?;
            state.video_device = found;
        }
        Ok(())
    }

    async fn cycle_camera(&self) -> EngineResult<Option<MediaDeviceInfo>> {
        let mut state = self.state.lock().unwrap();
        state.control_log.push(ControlCall::CycleCamera);
        let cameras: Vec<MediaDeviceInfo> = state
            .devices
            .iter()
            .filter(|d| d.kind == MediaDeviceKind::VideoInput)
            .cloned()
            .collect();
        if cameras.is_empty() {
            return Ok(None);
        }
        let next = match &state.video_device {
            Some(current) => {
                let pos = cameras.iter().position(|d| d.device_id == current.device_id);
                let idx = pos.map(|p| (p + 1) % cameras.len()).unwrap_or(0);
                cameras[idx].clone()
            }
            None => cameras[0].clone(),
        };
        state.video_device = Some(next.clone());
        Ok(Some(next))
    }

    async fn audio_input_device(&self) -> EngineResult<Option<MediaDeviceInfo>> {
        Ok(self.state.lock().unwrap().audio_device.clone())
    }

    async fn video_input_device(&self) -> EngineResult<Option<MediaDeviceInfo>> {
        Ok(self.state.lock().unwrap().video_device.clone())
    }

    async fn send_app_message(
        &self,
        data: String,
        to: Option<ParticipantId>,
    ) -> EngineResult<()> {
        let local_id = {
            let mut state = self.state.lock().unwrap();
            state.control_log.push(ControlCall::SendAppMessage { to: to.clone() });
            state.local_id.clone()
        };
        // Loop the message back so single-client tests can observe delivery.
        self.emit(EngineEvent::AppMessage { from: local_id, data });
        Ok(())
    }

    async fn enumerate_devices(&self) -> EngineResult<Vec<MediaDeviceInfo>> {
        Ok(self.state.lock().unwrap().devices.clone())
    }

    async fn meeting_state(&self) -> MeetingState {
        self.state.lock().unwrap().meeting_state
    }

    async fn participants(&self) -> Vec<Participant> {
        let state = self.state.lock().unwrap();
        let mut all = Vec::with_capacity(state.remotes.len() + 1);
        if let Some(local) = &state.local {
            all.push(local.clone());
        }
        all.extend(state.remotes.iter().cloned());
        all
    }

    async fn local_participant(&self) -> Option<Participant> {
        self.state.lock().unwrap().local.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }
}

fn kind_tag(kind: TrackKind) -> &'static str {
    match kind {
        TrackKind::Audio => "audio",
        TrackKind::Video => "video",
        TrackKind::ScreenVideo => "screen",
    }
}

fn find_device(
    devices: &[MediaDeviceInfo],
    device_id: &str,
) -> EngineResult<Option<MediaDeviceInfo>> {
    devices
        .iter()
        .find(|d| d.device_id == device_id)
        .cloned()
        .map(Some)
        .ok_or_else(|| EngineError::DeviceNotFound { device_id: device_id.to_string() })
}

fn default_devices() -> Vec<MediaDeviceInfo> {
    vec![
        MediaDeviceInfo {
            device_id: "mock-mic-0".to_string(),
            kind: MediaDeviceKind::AudioInput,
            label: "Mock Microphone".to_string(),
        },
        MediaDeviceInfo {
            device_id: "mock-cam-0".to_string(),
            kind: MediaDeviceKind::VideoInput,
            label: "Mock Camera".to_string(),
        },
        MediaDeviceInfo {
            device_id: "mock-cam-1".to_string(),
            kind: MediaDeviceKind::VideoInput,
            label: "Mock Camera (rear)".to_string(),
        },
        MediaDeviceInfo {
            device_id: "mock-speaker-0".to_string(),
            kind: MediaDeviceKind::AudioOutput,
            label: "Mock Speaker".to_string(),
        },
    ]
}
