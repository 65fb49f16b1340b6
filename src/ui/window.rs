use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use gtk4::prelude::*;
use libadwaita::prelude::*;

use crate::app::BackendEvent;
use crate::engine::{Mode, View};

/// Handles returned from building the main window.
pub struct MainWindow {
    pub window: libadwaita::ApplicationWindow,
    pub title: libadwaita::WindowTitle,
    pub file_mode: gtk4::CheckButton,
    pub webcam_mode: gtk4::CheckButton,
    pub choose_button: gtk4::Button,
    pub selection_label: gtk4::Label,
    pub recording_box: gtk4::Box,
    pub live_view: gtk4::Picture,
    pub start_button: gtk4::Button,
    pub stop_button: gtk4::Button,
    pub capture_label: gtk4::Label,
    pub status_label: gtk4::Label,
    pub feedback_group: libadwaita::PreferencesGroup,
    pub feedback_list: gtk4::ListBox,
    pub preview_group: libadwaita::PreferencesGroup,
    pub preview_video: gtk4::Video,
    /// Location currently loaded into `preview_video`.
    shown_preview: RefCell<Option<String>>,
    syncing: SyncGuard,
}

/// Raised while `apply_view` updates widgets, so signal handlers can ignore
/// changes that did not come from the user.
#[derive(Clone, Default)]
struct SyncGuard(Rc<Cell<bool>>);

impl SyncGuard {
    fn active(&self) -> bool {
        self.0.get()
    }

    fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let outer = self.0.replace(true);
        let result = f();
        self.0.set(outer);
        result
    }
}

/// Build the main window and wire its controls to the event channel.
pub fn build_window(
    app: &libadwaita::Application,
    service_url: &str,
    sender: async_channel::Sender<BackendEvent>,
) -> MainWindow {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Posture Check")
        .default_width(560)
        .default_height(760)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    let header = libadwaita::HeaderBar::new();
    let title = libadwaita::WindowTitle::new("Posture Check", "Checking service...");
    header.set_title_widget(Some(&title));
    toolbar_view.add_top_bar(&header);

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content.set_margin_start(16);
    content.set_margin_end(16);
    content.set_margin_top(12);
    content.set_margin_bottom(12);

    // --- Mode selector ---
    let mode_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 16);
    let file_mode = gtk4::CheckButton::with_label("Upload Video");
    let webcam_mode = gtk4::CheckButton::with_label("Use Webcam");
    webcam_mode.set_group(Some(&file_mode));
    file_mode.set_active(true);
    mode_box.append(&file_mode);
    mode_box.append(&webcam_mode);
    content.append(&mode_box);

    let syncing = SyncGuard::default();
    for (button, mode) in [(&file_mode, Mode::FileSelect), (&webcam_mode, Mode::LiveCapture)] {
        let sender = sender.clone();
        let syncing = syncing.clone();
        button.connect_toggled(move |b| {
            if b.is_active() && !syncing.active() {
                let _ = sender.try_send(BackendEvent::ModeSelected(mode));
            }
        });
    }

    // --- File picker ---
    let file_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
    let choose_button = gtk4::Button::with_label("Choose Video...");
    let selection_label = gtk4::Label::new(Some("No video selected"));
    selection_label.add_css_class("dim-label");
    selection_label.set_ellipsize(gtk4::pango::EllipsizeMode::Middle);
    file_box.append(&choose_button);
    file_box.append(&selection_label);
    content.append(&file_box);

    {
        let sender = sender.clone();
        let parent = window.clone();
        choose_button.connect_clicked(move |_| open_video_dialog(&parent, sender.clone()));
    }

    // --- Webcam recording ---
    let recording_box = gtk4::Box::new(gtk4::Orientation::Vertical, 8);
    let live_view = gtk4::Picture::new();
    live_view.set_size_request(480, 360);
    live_view.add_css_class("card");
    recording_box.append(&live_view);

    let start_button = gtk4::Button::with_label("Start Recording");
    start_button.add_css_class("suggested-action");
    let stop_button = gtk4::Button::with_label("Stop Recording");
    stop_button.add_css_class("destructive-action");
    let record_controls = gtk4::Box::new(gtk4::Orientation::Horizontal, 8);
    record_controls.append(&start_button);
    record_controls.append(&stop_button);
    recording_box.append(&record_controls);

    let capture_label = gtk4::Label::new(None);
    capture_label.add_css_class("error");
    capture_label.set_xalign(0.0);
    recording_box.append(&capture_label);
    content.append(&recording_box);

    {
        let sender = sender.clone();
        start_button.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::StartRecording);
        });
    }
    {
        let sender = sender.clone();
        stop_button.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::StopRecording);
        });
    }

    // --- Upload + status ---
    let upload_button = gtk4::Button::with_label("Upload");
    upload_button.set_halign(gtk4::Align::Start);
    content.append(&upload_button);
    {
        let sender = sender.clone();
        upload_button.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::UploadRequested);
        });
    }

    let status_label = gtk4::Label::new(None);
    status_label.add_css_class("heading");
    status_label.set_xalign(0.0);
    status_label.set_wrap(true);
    content.append(&status_label);

    // --- Feedback ---
    let feedback_group = libadwaita::PreferencesGroup::new();
    feedback_group.set_title("Detected Posture Issues");
    let feedback_list = gtk4::ListBox::new();
    feedback_list.set_selection_mode(gtk4::SelectionMode::None);
    feedback_list.add_css_class("boxed-list");
    let feedback_scroll = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .max_content_height(250)
        .propagate_natural_height(true)
        .child(&feedback_list)
        .build();
    feedback_group.add(&feedback_scroll);
    content.append(&feedback_group);

    // --- Playback ---
    let preview_group = libadwaita::PreferencesGroup::new();
    preview_group.set_title("Preview");
    let preview_video = gtk4::Video::new();
    preview_video.set_size_request(480, 270);
    preview_group.add(&preview_video);
    content.append(&preview_group);

    // --- Service settings ---
    let service_group = libadwaita::PreferencesGroup::new();
    service_group.set_title("Analysis Service");
    let service_row = libadwaita::EntryRow::builder()
        .title("Service URL")
        .text(service_url)
        .show_apply_button(true)
        .build();
    {
        let sender = sender.clone();
        service_row.connect_apply(move |row| {
            let _ = sender.try_send(BackendEvent::ServiceUrlChanged(row.text().to_string()));
        });
    }
    service_group.add(&service_row);
    content.append(&service_group);

    // Assemble
    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .child(&content)
        .build();
    toolbar_view.set_content(Some(&scrolled));
    window.set_content(Some(&toolbar_view));

    MainWindow {
        window,
        title,
        file_mode,
        webcam_mode,
        choose_button,
        selection_label,
        recording_box,
        live_view,
        start_button,
        stop_button,
        capture_label,
        status_label,
        feedback_group,
        feedback_list,
        preview_group,
        preview_video,
        shown_preview: RefCell::new(None),
        syncing,
    }
}

fn open_video_dialog(
    parent: &libadwaita::ApplicationWindow,
    sender: async_channel::Sender<BackendEvent>,
) {
    let filter = gtk4::FileFilter::new();
    filter.set_name(Some("Videos"));
    filter.add_mime_type("video/*");
    let filters = gtk4::gio::ListStore::new::<gtk4::FileFilter>();
    filters.append(&filter);

    let dialog = gtk4::FileDialog::builder()
        .title("Choose a video")
        .modal(true)
        .build();
    dialog.set_filters(Some(&filters));
    dialog.open(
        Some(parent),
        gtk4::gio::Cancellable::NONE,
        move |result| match result {
            Ok(file) => match file.path() {
                Some(path) => {
                    let _ = sender.try_send(BackendEvent::FileChosen(path));
                }
                None => log::warn!("Picked file has no local path: {}", file.uri()),
            },
            Err(e) => log::debug!("File dialog closed: {e}"),
        },
    );
}

/// Make the widgets match `view`.
pub fn apply_view(w: &MainWindow, view: &View) {
    w.syncing.run(|| {
        w.file_mode.set_active(view.mode == Mode::FileSelect);
        w.webcam_mode.set_active(view.mode == Mode::LiveCapture);
    });

    w.choose_button.set_sensitive(view.file_picker_enabled);
    match &view.selection_error {
        Some(error) => {
            w.selection_label.set_text(error);
            w.selection_label.add_css_class("error");
        }
        None => {
            w.selection_label
                .set_text(view.selection.as_deref().unwrap_or("No video selected"));
            w.selection_label.remove_css_class("error");
        }
    }

    w.recording_box.set_visible(view.recording_controls_visible);
    w.start_button.set_visible(view.start_visible);
    w.start_button.set_sensitive(view.start_enabled);
    w.stop_button.set_visible(view.stop_visible);
    w.capture_label
        .set_text(view.capture_message.as_deref().unwrap_or_default());
    w.capture_label.set_visible(view.capture_message.is_some());

    w.status_label.set_text(view.status.as_deref().unwrap_or_default());
    w.status_label.set_visible(view.status.is_some());
    w.status_label
        .set_tooltip_text(view.service_message.as_deref());

    super::feedback::fill_feedback_list(&w.feedback_list, &view.feedback);
    w.feedback_group.set_visible(!view.feedback.is_empty());

    let location = view.preview.as_ref().map(|p| p.location.clone());
    if *w.shown_preview.borrow() != location {
        match &view.preview {
            Some(preview) => {
                w.preview_video.set_filename(Some(&preview.location));
                w.preview_group
                    .set_description(Some(&format!("Type: {}", preview.mime)));
            }
            None => {
                w.preview_video.set_file(None::<&gtk4::gio::File>);
                w.preview_group.set_description(None);
            }
        }
        *w.shown_preview.borrow_mut() = location;
    }
    w.preview_group.set_visible(view.preview.is_some());
}

/// Show a recorder snapshot in the live view, or clear it.
pub fn show_live_frame(w: &MainWindow, frame: Option<&Path>) {
    w.live_view.set_filename(frame);
}

pub fn show_service_status(w: &MainWindow, online: bool) {
    w.title
        .set_subtitle(if online { "Service online" } else { "Service offline" });
}
