//! CLI output formatting.
//!
//! # Output Format
//!
//! ```text
//! Images total: 5321
//! Progress:  37.59% | processed=2000/5321 | converted=1874
//! Progress:  75.17% | processed=4000/5321 | converted=3790
//! Progress: 100.00% | processed=5321/5321 | converted=5012
//! Done ✔  JPEG → PNG conversion finished
//! ```
//!
//! Under `on_decode_error = "skip"` each skipped tile gets its own line and
//! progress lines carry a trailing `| skipped=N` once N is non-zero.
//!
//! # Architecture
//!
//! Every line has a `format_*` function that returns a `String` (or
//! `Vec<String>` for events) so it can be tested without capturing stdout.
//! Format functions are pure — no I/O, no side effects.

use crate::convert::{ConvertEvent, Counts};
use crate::imaging::TileFormat;

/// Share of tiles visited, in percent. An empty archive counts as complete.
pub fn percent(counts: &Counts) -> f64 {
    if counts.total == 0 {
        return 100.0;
    }
    counts.processed as f64 / counts.total as f64 * 100.0
}

/// Line printed once, before the first window.
pub fn format_totals(total: u64) -> String {
    format!("Images total: {}", total)
}

/// Line printed after each committed window.
pub fn format_progress(counts: &Counts) -> String {
    let mut line = format!(
        "Progress: {:6.2}% | processed={}/{} | converted={}",
        percent(counts),
        counts.processed,
        counts.total,
        counts.converted
    );
    if counts.skipped > 0 {
        line.push_str(&format!(" | skipped={}", counts.skipped));
    }
    line
}

/// Line printed after the format metadata has been updated.
pub fn format_done(from: TileFormat, to: TileFormat) -> String {
    format!("Done ✔  {} → {} conversion finished", from.label(), to.label())
}

/// Render a driver event as zero or more output lines.
pub fn format_convert_event(event: &ConvertEvent) -> Vec<String> {
    match event {
        ConvertEvent::Started { total } => vec![format_totals(*total)],
        ConvertEvent::WindowCommitted(counts) => vec![format_progress(counts)],
        ConvertEvent::TileSkipped { tile, error } => {
            vec![format!("Skipped tile {}: {}", tile, error)]
        }
        ConvertEvent::Finished(_) => vec![format_done(TileFormat::Jpeg, TileFormat::Png)],
    }
}
