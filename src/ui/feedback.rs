use gtk4::prelude::*;

/// Replace the rows of the feedback list, one per flagged frame.
pub fn fill_feedback_list(list: &gtk4::ListBox, lines: &[String]) {
    list.remove_all();
    for line in lines {
        list.append(&build_feedback_row(line));
    }
}

fn build_feedback_row(line: &str) -> gtk4::ListBoxRow {
    // "Frame 12: slouching, forward head" -> bold "Frame 12:" prefix
    let markup = match line.split_once(": ") {
        Some((frame, issues)) => format!(
            "<b>{}:</b> {}",
            gtk4::glib::markup_escape_text(frame),
            gtk4::glib::markup_escape_text(issues)
        ),
        None => gtk4::glib::markup_escape_text(line).to_string(),
    };

    let label = gtk4::Label::new(None);
    label.set_markup(&markup);
    label.set_wrap(true);
    label.set_xalign(0.0);
    label.set_margin_top(4);
    label.set_margin_bottom(4);
    label.set_margin_start(8);
    label.set_margin_end(8);
    label.set_selectable(true);

    let row = gtk4::ListBoxRow::new();
    row.set_activatable(false);
    row.set_child(Some(&label));
    row
}
