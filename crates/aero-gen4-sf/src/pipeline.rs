//! Tracked-state scheduler for the Gen4 SF stage.
//!
//! Each [`TrackedState`] atom declares the dirty categories it is compiled from. An
//! upload pass walks the atom list in order and runs every atom whose declaration
//! intersects the accumulated dirty set. Flags an atom raises are added to that set, so
//! an atom can trigger the ones after it (the SF viewport raises `SF_VP`, which the SF
//! unit depends on).

use std::fmt;

use aero_gen4_batch::StateBatch;
use tracing::debug;

use crate::dirty::{DirtySet, DriverDirty};
use crate::error::SfError;
use crate::sf_unit::{emit_sf_unit, SF_UNIT_DEPS};
use crate::sf_vp::{emit_sf_viewport, SF_VIEWPORT_DEPS};
use crate::state::StateSnapshot;

/// Segment offsets of the most recently emitted SF blocks.
///
/// Offsets are only meaningful within the segment identified by `seqno`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfOffsets {
    pub seqno: u64,
    pub vp_offset: Option<u32>,
    pub unit_offset: Option<u32>,
}

/// What an atom gets to work with while it runs.
pub struct StateEmitter<'a> {
    batch: &'a mut StateBatch,
    dirty: &'a mut DirtySet,
    offsets: &'a mut SfOffsets,
}

impl<'a> StateEmitter<'a> {
    pub fn new(
        batch: &'a mut StateBatch,
        dirty: &'a mut DirtySet,
        offsets: &'a mut SfOffsets,
    ) -> Self {
        Self {
            batch,
            dirty,
            offsets,
        }
    }

    pub fn batch(&mut self) -> &mut StateBatch {
        self.batch
    }

    /// Dirty state seen by the pass so far, including flags raised by earlier atoms.
    pub fn dirty(&self) -> DirtySet {
        *self.dirty
    }

    pub fn raise(&mut self, set: impl Into<DirtySet>) {
        self.dirty.insert(set.into());
    }

    /// Offset of the SF viewport block if it lives in the open segment.
    pub fn viewport_offset(&self) -> Option<u32> {
        if self.offsets.seqno == self.batch.seqno() {
            self.offsets.vp_offset
        } else {
            None
        }
    }

    /// Offsets for the open segment; stale offsets from an earlier segment are dropped.
    pub fn offsets_mut(&mut self) -> &mut SfOffsets {
        let seqno = self.batch.seqno();
        if self.offsets.seqno != seqno {
            *self.offsets = SfOffsets {
                seqno,
                ..SfOffsets::default()
            };
        }
        self.offsets
    }
}

pub type EmitFn = fn(&mut StateEmitter<'_>, &StateSnapshot) -> Result<(), SfError>;

/// One compiled state block and the dirty state it is compiled from.
#[derive(Clone, Copy)]
pub struct TrackedState {
    pub name: &'static str,
    pub dirty: DirtySet,
    pub emit: EmitFn,
}

impl fmt::Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedState")
            .field("name", &self.name)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

pub const SF_VIEWPORT: TrackedState = TrackedState {
    name: "sf_vp",
    dirty: SF_VIEWPORT_DEPS,
    emit: emit_sf_viewport,
};

pub const SF_UNIT: TrackedState = TrackedState {
    name: "sf_unit",
    dirty: SF_UNIT_DEPS,
    emit: emit_sf_unit,
};

/// SF atoms in emission order. The viewport must precede the unit state that points
/// at it.
pub const GEN4_SF_ATOMS: [TrackedState; 2] = [SF_VIEWPORT, SF_UNIT];

/// Outcome of one [`StatePipeline::upload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub emitted: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    /// State batch flushes that happened during the upload.
    pub flushes: u64,
    /// Everything the pass saw, including flags raised by its atoms. Later pipeline
    /// stages consume this.
    pub dirty: DirtySet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub uploads: u64,
    pub atoms_emitted: u64,
    pub atoms_skipped: u64,
    /// Passes restarted because the state batch flushed mid-pass.
    pub restarts: u64,
}

/// Runs the SF atoms for one rendering context.
pub struct StatePipeline {
    batch: StateBatch,
    atoms: Vec<TrackedState>,
    dirty: DirtySet,
    offsets: SfOffsets,
    last_seqno: u64,
    stats: PipelineStats,
}

impl StatePipeline {
    pub fn new(batch: StateBatch) -> Self {
        Self::with_atoms(batch, &GEN4_SF_ATOMS)
    }

    /// Nothing has been emitted yet, so the pipeline starts with every flag raised.
    pub fn with_atoms(batch: StateBatch, atoms: &[TrackedState]) -> Self {
        let last_seqno = batch.seqno();
        Self {
            batch,
            atoms: atoms.to_vec(),
            dirty: DirtySet::all(),
            offsets: SfOffsets::default(),
            last_seqno,
            stats: PipelineStats::default(),
        }
    }

    pub fn atoms(&self) -> &[TrackedState] {
        &self.atoms
    }

    /// Record state changes to be picked up by the next upload.
    pub fn flag_dirty(&mut self, set: impl Into<DirtySet>) {
        self.dirty.insert(set.into());
    }

    /// Dirty state accumulated since the last successful upload.
    pub fn dirty(&self) -> DirtySet {
        self.dirty
    }

    pub fn batch(&self) -> &StateBatch {
        &self.batch
    }

    /// Flushing through this reference is picked up as `BATCH` by the next upload.
    pub fn batch_mut(&mut self) -> &mut StateBatch {
        &mut self.batch
    }

    /// Offsets of the SF blocks in the open segment, if they are still there.
    pub fn offsets(&self) -> SfOffsets {
        if self.offsets.seqno == self.batch.seqno() {
            self.offsets
        } else {
            SfOffsets {
                seqno: self.batch.seqno(),
                ..SfOffsets::default()
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Emit every atom whose dependencies intersect the accumulated dirty state.
    ///
    /// A flush in the middle of the pass strands the blocks written before it in the
    /// submitted segment, so the pass is rerun once on the fresh segment with `BATCH`
    /// raised. The accumulated dirty state is only cleared on success.
    pub fn upload(&mut self, snapshot: &StateSnapshot) -> Result<UploadReport, SfError> {
        if self.batch.seqno() != self.last_seqno {
            self.dirty.insert(DriverDirty::BATCH.into());
        }
        let flushes_before = self.batch.stats().flushes;
        let mut restarted = false;

        let mut report = loop {
            let pass_seqno = self.batch.seqno();
            let mut report = UploadReport {
                dirty: self.dirty,
                ..UploadReport::default()
            };
            let mut flushed = false;

            for atom in &self.atoms {
                if !report.dirty.intersects(&atom.dirty) {
                    report.skipped.push(atom.name);
                    continue;
                }

                let mut emitter =
                    StateEmitter::new(&mut self.batch, &mut report.dirty, &mut self.offsets);
                let result = (atom.emit)(&mut emitter, snapshot);
                if self.batch.seqno() != pass_seqno {
                    flushed = true;
                    break;
                }
                result?;
                debug!(atom = atom.name, seqno = pass_seqno, "emitted tracked state");
                report.emitted.push(atom.name);
            }

            if !flushed {
                break report;
            }
            if restarted {
                return Err(SfError::PassDoesNotFit {
                    segment_size: self.batch.segment_size(),
                });
            }
            debug!(
                stale_seqno = pass_seqno,
                seqno = self.batch.seqno(),
                "state batch flushed mid-pass; restarting SF upload"
            );
            restarted = true;
            self.stats.restarts += 1;
            self.dirty.insert(DriverDirty::BATCH.into());
        };

        report.flushes = self.batch.stats().flushes - flushes_before;
        self.stats.uploads += 1;
        self.stats.atoms_emitted += report.emitted.len() as u64;
        self.stats.atoms_skipped += report.skipped.len() as u64;
        self.dirty.clear();
        self.last_seqno = self.batch.seqno();
        Ok(report)
    }
}

impl fmt::Debug for StatePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePipeline")
            .field("batch", &self.batch)
            .field("atoms", &self.atoms)
            .field("dirty", &self.dirty)
            .field("offsets", &self.offsets)
            .field("stats", &self.stats)
            .finish()
    }
}
