use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use bytes::Bytes;

use super::state::{AppState, BackendEvent};
use crate::engine::media::mime_for_path;
use crate::engine::{MediaArtifact, UploadRequest};

/// Read a picked file on the tokio runtime. The result is tagged with the
/// pick it answers so a slower, older read cannot win.
pub fn dispatch_file_load(state: &Rc<RefCell<AppState>>, path: PathBuf) {
    let pick = state.borrow_mut().controller.begin_file_pick();
    let s = state.borrow();
    let sender = s.backend_sender.clone();

    s.tokio_rt.spawn(async move {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let mime = mime_for_path(&path);

        let result = match tokio::fs::read(&path).await {
            Ok(data) => Ok(MediaArtifact::from_file(name, mime, Bytes::from(data))),
            Err(e) => {
                log::error!("Failed to read {}: {e}", path.display());
                Err(format!("Could not read {name}."))
            }
        };
        let _ = sender.send(BackendEvent::FileLoaded { pick, result }).await;
    });
}

/// Send an upload on the tokio runtime; the completion comes back as
/// `UploadComplete` with the request's ticket.
pub fn dispatch_upload(state: &Rc<RefCell<AppState>>, request: UploadRequest) {
    let s = state.borrow();
    let client = s.http.clone();
    let url = s.config.upload_url();
    let sender = s.backend_sender.clone();

    s.tokio_rt.spawn(async move {
        let ticket = request.ticket;
        let result = crate::analysis::analyze(&client, &url, request)
            .await
            .map_err(|e| e.to_string());
        let _ = sender
            .send(BackendEvent::UploadComplete { ticket, result })
            .await;
    });
}

/// Probe the service's ping endpoint.
pub fn dispatch_service_check(state: &Rc<RefCell<AppState>>) {
    let s = state.borrow();
    let client = s.http.clone();
    let url = s.config.ping_url();
    let sender = s.backend_sender.clone();

    s.tokio_rt.spawn(async move {
        let result = crate::analysis::ping(&client, &url)
            .await
            .map_err(|e| e.to_string());
        let _ = sender.send(BackendEvent::ServiceChecked(result)).await;
    });
}
