use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use gtk4::glib;

use crate::config::Config;
use crate::engine::{
    self, AnalysisReport, CaptureEvent, Controller, FilePick, MediaArtifact, Mode, UploadTicket,
};
use crate::preview::TempPreviewStore;
use crate::recorder::FfmpegCamera;
use crate::ui::window::MainWindow;

/// Events delivered to the GTK main thread, handled one at a time.
#[derive(Debug)]
pub enum BackendEvent {
    ModeSelected(Mode),
    FileChosen(PathBuf),
    FileLoaded {
        pick: FilePick,
        result: Result<MediaArtifact, String>,
    },
    StartRecording,
    StopRecording,
    Capture(CaptureEvent),
    UploadRequested,
    UploadComplete {
        ticket: UploadTicket,
        result: Result<AnalysisReport, String>,
    },
    LivePreviewTick,
    ServiceUrlChanged(String),
    ServiceChecked(Result<(), String>),
}

pub type AppController = Controller<FfmpegCamera, TempPreviewStore>;

/// Central application state. Lives on the GTK main thread inside Rc<RefCell<>>.
pub struct AppState {
    pub config: Config,
    pub controller: AppController,
    pub tokio_rt: tokio::runtime::Runtime,
    pub http: reqwest::Client,
    pub backend_sender: async_channel::Sender<BackendEvent>,

    // Live view polling while recording
    pub live_tick_source: Option<glib::SourceId>,

    // UI handles
    pub window: Option<MainWindow>,
}

impl AppState {
    pub fn new(
        sender: async_channel::Sender<BackendEvent>,
        capture_sender: async_channel::Sender<CaptureEvent>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load();
        let tokio_rt = tokio::runtime::Runtime::new()?;
        let http = crate::analysis::build_client(config.request_timeout_secs)?;

        let previews = TempPreviewStore::open().or_else(|e| {
            log::warn!("Cache dir unavailable ({e}), keeping previews in temp dir");
            TempPreviewStore::in_dir(std::env::temp_dir().join("posture-check-previews"))
        })?;
        let camera = FfmpegCamera::new(
            &config.ffmpeg_path,
            &config.camera_device,
            previews.dir().join("live"),
            tokio_rt.handle().clone(),
            capture_sender,
        );

        Ok(Self {
            controller: Controller::new(camera, previews),
            config,
            tokio_rt,
            http,
            backend_sender: sender,
            live_tick_source: None,
            window: None,
        })
    }
}

/// Push the current controller state into the window.
pub fn refresh(state: &Rc<RefCell<AppState>>) {
    let s = state.borrow();
    if let Some(ref window) = s.window {
        let view = engine::view::render(&s.controller);
        crate::ui::window::apply_view(window, &view);
    }
}
