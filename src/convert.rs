//! Batched JPEG → PNG conversion.
//!
//! This is the core of the tool. Given an output archive that already holds
//! a full copy of the source, it rewrites every JPEG tile as PNG and then
//! flips the `format` metadata entry.
//!
//! ## Phases
//!
//! ```text
//! Idle → Validating → Paging ⇄ Committing → Finalizing → Done
//!            │           │          │
//!            └───────────┴──────────┴────→ Failed
//! ```
//!
//! - **Validating**: the schema gate runs once. A mismatch stops the run
//!   before any tile is read.
//! - **Paging**: the next window is the next `batch_size` ids of a snapshot
//!   taken before the first write. An exhausted snapshot moves to
//!   Finalizing.
//! - **Committing**: every tile in the window is classified; eligible tiles
//!   are transcoded in parallel (rayon) and staged. All staged replacements
//!   are then written in one transaction. Counters advance in window order.
//! - **Finalizing**: the `format` metadata entry is replaced with `png`.
//!
//! ## Decode failures
//!
//! A tile that carries the JPEG signature but fails to transcode is handled
//! per [`DecodeErrorPolicy`]. `Abort` (the default) fails the run and leaves
//! the current window uncommitted; earlier windows stay committed, and
//! re-running the tool on the original input is the recovery path. `Skip`
//! leaves the tile unchanged, counts it in `skipped`, and moves on.
//!
//! Re-running on an already converted archive is a no-op apart from the
//! metadata rewrite: PNG tiles never match the JPEG signature.

use crate::archive::{ArchiveError, SqliteArchive, TileId, TileRow, TileStore};
use crate::config::{ConvertConfig, DecodeErrorPolicy};
use crate::imaging::{RustBackend, SignatureClassifier, TileTranscoder, TranscodeError};
use crate::schema::{SchemaError, validate_schema};
use rayon::prelude::*;
use std::path::Path;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Tile {tile} could not be converted: {source}")]
    Transcode {
        tile: TileId,
        #[source]
        source: TranscodeError,
    },
}

/// Settings the batch loop needs, extracted from [`ConvertConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub on_decode_error: DecodeErrorPolicy,
}

impl BatchOptions {
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self {
            batch_size: config.batch.size,
            on_decode_error: config.processing.on_decode_error,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&ConvertConfig::default())
    }
}

/// Where the driver is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Paging,
    Committing,
    Finalizing,
    Done,
    Failed,
}

/// Running totals for one conversion run.
///
/// Always `converted + skipped <= processed <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Tiles in the archive when the run started.
    pub total: u64,
    /// Tiles visited so far.
    pub processed: u64,
    /// Tiles rewritten as PNG and committed.
    pub converted: u64,
    /// Eligible tiles left unchanged because they failed to transcode.
    pub skipped: u64,
}

/// Owned, mutable state of a run: the phase plus the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    phase: Phase,
    counts: Counts,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            counts: Counts::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    fn begin(&mut self, total: u64) {
        self.counts = Counts {
            total,
            ..Counts::default()
        };
    }

    fn visit(&mut self) {
        debug_assert!(self.counts.processed < self.counts.total);
        self.counts.processed += 1;
    }

    fn record_converted(&mut self, n: u64) {
        self.counts.converted += n;
        debug_assert!(self.counts.converted + self.counts.skipped <= self.counts.processed);
    }

    fn record_skipped(&mut self) {
        self.counts.skipped += 1;
        debug_assert!(self.counts.converted + self.counts.skipped <= self.counts.processed);
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertEvent {
    /// Snapshot taken; `total` tiles will be visited.
    Started { total: u64 },
    /// A window was committed.
    WindowCommitted(Counts),
    /// An eligible tile was left unchanged (only under `Skip`).
    TileSkipped { tile: TileId, error: String },
    /// Format metadata updated; the run succeeded.
    Finished(Counts),
}

/// Duplicate `source` into `output` and convert `output` in place.
pub fn convert(
    source: &Path,
    output: &Path,
    config: &ConvertConfig,
    events: Option<Sender<ConvertEvent>>,
) -> Result<Counts, ConvertError> {
    let mut archive = SqliteArchive::duplicate(source, output)?;
    let backend = RustBackend::new(config.png.compression);
    debug!(compression = config.png.compression.as_str(), "png encoder ready");
    let counts = convert_with_backend(
        &mut archive,
        &SignatureClassifier::default(),
        &backend,
        &BatchOptions::from_config(config),
        events,
    )?;
    archive.close()?;
    Ok(counts)
}

/// Convert an already-opened store (allows testing with mocks).
pub fn convert_with_backend(
    store: &mut impl TileStore,
    classifier: &SignatureClassifier,
    backend: &impl TileTranscoder,
    options: &BatchOptions,
    events: Option<Sender<ConvertEvent>>,
) -> Result<Counts, ConvertError> {
    let mut state = RunState::new();
    run(store, classifier, backend, options, events.as_ref(), &mut state)?;
    Ok(state.counts())
}

/// Drive `state` from `Idle` to `Done`, or to `Failed` on the first error.
pub fn run(
    store: &mut impl TileStore,
    classifier: &SignatureClassifier,
    backend: &impl TileTranscoder,
    options: &BatchOptions,
    events: Option<&Sender<ConvertEvent>>,
    state: &mut RunState,
) -> Result<(), ConvertError> {
    let result = run_phases(store, classifier, backend, options, events, state);
    if result.is_err() {
        state.enter(Phase::Failed);
    }
    result
}

fn run_phases(
    store: &mut impl TileStore,
    classifier: &SignatureClassifier,
    backend: &impl TileTranscoder,
    options: &BatchOptions,
    events: Option<&Sender<ConvertEvent>>,
    state: &mut RunState,
) -> Result<(), ConvertError> {
    state.enter(Phase::Validating);
    validate_schema(&*store)?;

    let ids = store.tile_ids()?;
    state.begin(ids.len() as u64);
    info!(total = ids.len(), batch_size = options.batch_size, "starting conversion");
    emit(events, ConvertEvent::Started { total: ids.len() as u64 });

    // `max(1)` keeps `chunks` from panicking on a hand-built zero size.
    for window in ids.chunks(options.batch_size.max(1)) {
        state.enter(Phase::Paging);
        let rows = store.read_tiles(window)?;

        state.enter(Phase::Committing);
        let staged = stage_window(rows, classifier, backend, options, state)?;
        store.commit_window(&staged.replacements)?;
        state.record_converted(staged.replacements.len() as u64);
        debug!(
            window = window.len(),
            replaced = staged.replacements.len(),
            processed = state.counts.processed,
            "window committed"
        );
        // Skips are only reported for windows that landed.
        for (tile, error) in staged.skipped {
            emit(events, ConvertEvent::TileSkipped { tile, error });
        }
        emit(events, ConvertEvent::WindowCommitted(state.counts()));
    }

    state.enter(Phase::Finalizing);
    store.set_format(backend.target_format().name())?;

    state.enter(Phase::Done);
    let counts = state.counts();
    info!(
        processed = counts.processed,
        converted = counts.converted,
        skipped = counts.skipped,
        "conversion finished"
    );
    emit(events, ConvertEvent::Finished(counts));
    Ok(())
}

enum Outcome {
    Unchanged,
    Replaced(Vec<u8>),
    Failed(TranscodeError),
}

/// A window ready to commit, plus the tiles left unchanged after a failure.
struct StagedWindow {
    replacements: Vec<TileRow>,
    skipped: Vec<(TileId, String)>,
}

/// Classify and transcode one window, returning the rows to write back.
fn stage_window(
    rows: Vec<TileRow>,
    classifier: &SignatureClassifier,
    backend: &impl TileTranscoder,
    options: &BatchOptions,
    state: &mut RunState,
) -> Result<StagedWindow, ConvertError> {
    let outcomes: Vec<Outcome> = rows
        .par_iter()
        .map(|row| {
            if !classifier.needs_conversion(&row.data) {
                return Outcome::Unchanged;
            }
            match backend.transcode(&row.data) {
                Ok(data) => Outcome::Replaced(data),
                Err(e) => Outcome::Failed(e),
            }
        })
        .collect();

    let mut staged = StagedWindow {
        replacements: Vec::new(),
        skipped: Vec::new(),
    };
    for (row, outcome) in rows.into_iter().zip(outcomes) {
        state.visit();
        match outcome {
            Outcome::Unchanged => {}
            Outcome::Replaced(data) => staged.replacements.push(TileRow { id: row.id, data }),
            Outcome::Failed(error) => match options.on_decode_error {
                DecodeErrorPolicy::Abort => {
                    return Err(ConvertError::Transcode {
                        tile: row.id,
                        source: error,
                    });
                }
                DecodeErrorPolicy::Skip => {
                    warn!(tile = %row.id, %error, "skipping tile");
                    state.record_skipped();
                    staged.skipped.push((row.id, error.to_string()));
                }
            },
        }
    }
    Ok(staged)
}

fn emit(events: Option<&Sender<ConvertEvent>>, event: ConvertEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is printing.
        let _ = tx.send(event);
    }
}
