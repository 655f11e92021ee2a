//! CLI presentation: text and json formatters for replay reports.

use crate::error::ApiError;
use crate::frame::FrameRef;
use crate::replay::{Notification, ReplayReport};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_report_json(report: &ReplayReport) -> Result<String, ApiError> {
    serde_json::to_string_pretty(report).map_err(|e| ApiError::OutputError(e.to_string()))
}

pub fn format_report_text(report: &ReplayReport, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Replayed {} events\n\n", report.events));

    out.push_str("Notifications:\n");
    if report.notifications.is_empty() {
        out.push_str("  (none)\n");
    }
    for (index, notification) in report.notifications.iter().enumerate() {
        let kind = notification.kind();
        let kind = if !color {
            kind.to_string()
        } else {
            match notification {
                Notification::FrameCreated { .. } => kind.green().to_string(),
                Notification::FrameDetached { .. } => kind.red().to_string(),
                Notification::MainFrameChanged { .. } => kind.yellow().to_string(),
            }
        };
        out.push_str(&format!("  {:>3}. {} {}\n", index + 1, kind, describe(notification)));
    }

    if !report.navigations.is_empty() {
        out.push_str("\nNavigations:\n");
        for url in &report.navigations {
            out.push_str(&format!("  {}\n", url));
        }
    }

    out.push_str(&format!(
        "\nMain frame: {}\n",
        report
            .main_frame
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Frame", "Node", "Main", "Guest", "Speculative", "Suspended", "Current"]);
    for row in &report.frames {
        table.add_row(vec![
            row.frame_id.to_string(),
            row.node_id.0.to_string(),
            flag(row.is_main_frame),
            flag(row.is_guest_view),
            flag(row.is_speculative),
            flag(row.is_suspended),
            flag(row.is_current_main_frame),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::FrameCreated { frame } | Notification::FrameDetached { frame } => {
            frame_label(Some(frame))
        }
        Notification::MainFrameChanged { old, new } => {
            format!("{} -> {}", frame_label(old.as_ref()), frame_label(new.as_ref()))
        }
    }
}

fn frame_label(frame: Option<&FrameRef>) -> String {
    match frame {
        Some(frame) => frame.frame_id.to_string(),
        None => "none".to_string(),
    }
}

fn flag(value: bool) -> String {
    let text = if value { "yes" } else { "" };
    text.to_string()
}
