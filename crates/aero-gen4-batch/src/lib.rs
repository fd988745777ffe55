//! `aero-gen4-batch` holds the scratch memory that Gen4 indirect state is written into.
//!
//! Currently this crate provides:
//! - A ring of write-combined state segments with bump allocation and synchronous
//!   flush-and-retry (see [`StateBatch`]).
//! - Relocation records plus the submission-time patch pass (see [`reloc`]).

mod batch;
mod buffer_arena;

pub mod reloc;

pub use batch::{
    BatchError, BatchStats, BatchSubmission, BatchSubmitter, NullBatchSubmitter,
    RecordingSubmitter, StateBatch, StateBatchDescriptor,
};
pub use buffer_arena::BufferArena;
pub use reloc::{apply_relocations, GemDomains, RelocError, RelocTarget, Relocation};
