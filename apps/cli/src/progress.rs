//! Terminal progress for archiving and uploading.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use platup_upload::UploadEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TEMPLATE: &str = "{spinner:.green} {prefix:>9} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// A 0..=100 percent bar on stderr, hidden when stderr is not a terminal.
pub fn percent_bar(prefix: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    if !std::io::stderr().is_terminal() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(prefix);
    pb
}

/// Drives `pb` from upload events until the channel closes or the upload
/// finishes.
pub fn follow_upload(mut events: mpsc::Receiver<UploadEvent>, pb: ProgressBar) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::Phase(phase) => pb.set_message(phase.to_string()),
                UploadEvent::Progress { percent, status } => {
                    pb.set_position(percent.clamp(0.0, 100.0) as u64);
                    pb.set_message(status);
                }
                UploadEvent::Warning(w) => pb.println(format!("warning: {w}")),
                UploadEvent::Completed { .. } => {
                    pb.finish_and_clear();
                    break;
                }
                UploadEvent::Failed { .. } => {
                    pb.abandon();
                    break;
                }
            }
        }
    })
}
