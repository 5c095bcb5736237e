use crate::device::console::DeviceEvent;
use crate::ui::progress::ProgressManager;

pub mod progress;

/// Stderr so `plan --json` and friends keep stdout clean
pub fn print_banner() {
    eprintln!("picotag-rs {}", env!("CARGO_PKG_VERSION"));
}

/// Map one console event onto the send bar. Progress lines move the bar,
/// everything else the device says becomes the bar's message.
pub fn update_send_progress(progress_manager: &ProgressManager, event: &DeviceEvent) {
    match event {
        DeviceEvent::Progress { sent, .. } => {
            let _ = progress_manager.set_position("send", u64::from(*sent));
        }
        DeviceEvent::Line(text) if !text.is_empty() => {
            let _ = progress_manager.set_message("send", text);
        }
        _ => {}
    }
}
