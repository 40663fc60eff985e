//! Command implementations.

pub mod batch;
pub mod config;
pub mod process;

pub use self::batch::execute_batch;
pub use self::config::execute_config;
pub use self::process::execute_process;

use crate::output::Formatter;
use indicatif::{ProgressBar, ProgressStyle};
use scrivener_pipeline::DocumentEvent;
use std::path::Path;
use tokio::sync::mpsc;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar sized for `documents` runs of 0-100 each.
pub(crate) fn progress_bar(documents: usize) -> ProgressBar {
    let pb = ProgressBar::new(documents as u64 * 100);
    pb.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Drive `pb` from tagged progress events until the sender side closes.
///
/// Warnings are printed above the bar so they stay visible.
pub(crate) async fn drain_events(
    mut events: mpsc::UnboundedReceiver<DocumentEvent>,
    pb: &ProgressBar,
    formatter: &Formatter,
    show_names: bool,
) {
    while let Some(tagged) = events.recv().await {
        let position = tagged.document as u64 * 100 + u64::from(tagged.event.progress);
        pb.set_position(position.max(pb.position()));
        if tagged.event.is_warning() {
            pb.println(formatter.warning(&tagged.event.message));
        } else if show_names {
            pb.set_message(format!("{}: {}", tagged.name, tagged.event.message));
        } else {
            pb.set_message(tagged.event.message);
        }
    }
}

/// Read an optional organizational style sample.
pub(crate) fn read_style_sample(path: Option<&str>) -> crate::Result<Option<String>> {
    path.map(std::fs::read_to_string).transpose().map_err(Into::into)
}

/// Display name of an input file.
pub(crate) fn document_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
