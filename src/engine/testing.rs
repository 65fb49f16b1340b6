//! In-memory capabilities for exercising the state machine in tests.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::devices::{
    CaptureError, LiveStream, MediaDevices, PreviewError, PreviewHandle, PreviewStore, SessionId,
    Track, TrackState,
};
use super::media::MediaArtifact;

#[derive(Default)]
struct DeviceLog {
    acquired: usize,
    finalize_requests: usize,
    stop_calls: usize,
    tracks: Vec<TrackState>,
}

#[derive(Default)]
pub struct FakeDevices {
    deny: Option<String>,
    log: Rc<RefCell<DeviceLog>>,
}

impl FakeDevices {
    pub fn denying(reason: &str) -> Self {
        Self {
            deny: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.log.borrow().acquired
    }

    pub fn finalize_requests(&self) -> usize {
        self.log.borrow().finalize_requests
    }

    pub fn stop_calls(&self) -> usize {
        self.log.borrow().stop_calls
    }

    /// Track states of the most recently acquired stream.
    pub fn track_states(&self) -> Vec<TrackState> {
        self.log.borrow().tracks.clone()
    }
}

impl MediaDevices for FakeDevices {
    type Stream = FakeStream;

    fn acquire_video_stream(&mut self, session: SessionId) -> Result<FakeStream, CaptureError> {
        if let Some(reason) = &self.deny {
            return Err(CaptureError::MediaAccessDenied(reason.clone()));
        }
        let mut log = self.log.borrow_mut();
        log.acquired += 1;
        log.tracks = vec![TrackState::Live];
        Ok(FakeStream {
            session,
            log: self.log.clone(),
        })
    }
}

pub struct FakeStream {
    session: SessionId,
    log: Rc<RefCell<DeviceLog>>,
}

impl LiveStream for FakeStream {
    fn tracks(&self) -> Vec<Track> {
        self.log
            .borrow()
            .tracks
            .iter()
            .map(|state| Track {
                label: format!("fake camera ({})", self.session),
                state: *state,
            })
            .collect()
    }

    fn finalize(&mut self) {
        self.log.borrow_mut().finalize_requests += 1;
    }

    fn stop_tracks(&mut self) {
        let mut log = self.log.borrow_mut();
        log.stop_calls += 1;
        for state in log.tracks.iter_mut() {
            *state = TrackState::Ended;
        }
    }
}

#[derive(Default)]
struct PreviewLog {
    created: usize,
    live: HashSet<String>,
    released: Vec<String>,
    double_releases: usize,
}

#[derive(Clone, Default)]
pub struct FakePreviews {
    fail: bool,
    log: Rc<RefCell<PreviewLog>>,
}

impl FakePreviews {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.log.borrow().created
    }

    pub fn live(&self) -> usize {
        self.log.borrow().live.len()
    }

    pub fn released(&self) -> Vec<String> {
        self.log.borrow().released.clone()
    }

    pub fn double_releases(&self) -> usize {
        self.log.borrow().double_releases
    }
}

impl PreviewStore for FakePreviews {
    fn create(&mut self, artifact: &MediaArtifact) -> Result<PreviewHandle, PreviewError> {
        if self.fail {
            return Err(PreviewError::Io(std::io::Error::other("disk full")));
        }
        let mut log = self.log.borrow_mut();
        log.created += 1;
        let location = format!("preview://{}/{}", log.created, artifact.name());
        log.live.insert(location.clone());
        Ok(PreviewHandle {
            artifact: artifact.id(),
            location,
            mime: artifact.mime().to_string(),
        })
    }

    fn release(&mut self, handle: PreviewHandle) {
        let mut log = self.log.borrow_mut();
        if !log.live.remove(&handle.location) {
            log.double_releases += 1;
        }
        log.released.push(handle.location);
    }
}
