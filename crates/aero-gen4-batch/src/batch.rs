use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use bytemuck::Pod;
use tracing::{debug, trace};

use crate::buffer_arena::BufferArena;
use crate::reloc::Relocation;

#[derive(Debug, Clone)]
pub struct StateBatchDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Bytes available to state blocks in one segment (one submission).
    pub segment_size: u32,
    /// Number of segments in the ring, i.e. submissions that may be in flight at once.
    pub segment_count: usize,
}

impl<'a> Default for StateBatchDescriptor<'a> {
    fn default() -> Self {
        Self {
            label: Some("gen4 state batch"),
            segment_size: 32 * 1024,
            segment_count: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("invalid state batch descriptor: {0}")]
    InvalidDescriptor(&'static str),
    #[error("state allocation of {requested} bytes can never fit a {segment_size}-byte segment")]
    BackingStoreExhausted { requested: u32, segment_size: u32 },
    #[error("state batch ring is full: segment {segment} still holds in-flight submission {seqno}")]
    RingFull { segment: usize, seqno: u64 },
    #[error("state write of {len} bytes at offset {offset} exceeds the {used}-byte allocated range")]
    WriteOutOfBounds { offset: u32, len: usize, used: u32 },
    #[error("batch submission failed: {0}")]
    Submit(String),
}

/// A sealed segment handed to the submission backend.
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub seqno: u64,
    pub segment: usize,
    /// Address the relocated dwords were written against.
    pub presumed_address: u64,
    pub bytes: Vec<u8>,
    pub relocations: Vec<Relocation>,
}

/// Boundary between state emission and whatever executes the batch.
///
/// A submitter owns a segment from `submit` until it reports the seqno through
/// `poll_retired`; the ring does not reuse the segment before then.
pub trait BatchSubmitter {
    /// Submit a sealed segment. Returns the GPU address the segment was placed at, which
    /// becomes the presumed address the next time the segment is filled.
    fn submit(&mut self, submission: BatchSubmission) -> Result<u64, String>;

    /// Drain the seqnos of submissions the consumer has finished with.
    fn poll_retired(&mut self) -> Vec<u64>;
}

/// Submitter that drops every segment and retires it immediately.
#[derive(Debug, Default)]
pub struct NullBatchSubmitter {
    retired: Vec<u64>,
}

impl NullBatchSubmitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchSubmitter for NullBatchSubmitter {
    fn submit(&mut self, submission: BatchSubmission) -> Result<u64, String> {
        self.retired.push(submission.seqno);
        Ok(submission.presumed_address)
    }

    fn poll_retired(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.retired)
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    submissions: Vec<BatchSubmission>,
    pending_retire: VecDeque<u64>,
    auto_retire: bool,
    placement: Option<u64>,
}

/// Submitter that keeps every submission for inspection.
///
/// Clones share the same record, so a caller can keep a handle after boxing one into a
/// [`StateBatch`]. Retirement is driven by the caller unless auto-retire is enabled.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubmitter {
    inner: Rc<RefCell<RecordingState>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retire every submission as soon as it is made.
    pub fn auto_retiring() -> Self {
        let this = Self::default();
        this.inner.borrow_mut().auto_retire = true;
        this
    }

    /// Place every subsequent submission at `address` instead of its presumed address.
    pub fn place_at(&self, address: u64) {
        self.inner.borrow_mut().placement = Some(address);
    }

    pub fn submissions(&self) -> Vec<BatchSubmission> {
        self.inner.borrow().submissions.clone()
    }

    pub fn retire(&self, seqno: u64) {
        self.inner.borrow_mut().pending_retire.push_back(seqno);
    }

    pub fn retire_all(&self) {
        let mut inner = self.inner.borrow_mut();
        let seqnos: Vec<u64> = inner.submissions.iter().map(|s| s.seqno).collect();
        inner.pending_retire.extend(seqnos);
    }
}

impl BatchSubmitter for RecordingSubmitter {
    fn submit(&mut self, submission: BatchSubmission) -> Result<u64, String> {
        let mut inner = self.inner.borrow_mut();
        let address = inner.placement.unwrap_or(submission.presumed_address);
        if inner.auto_retire {
            inner.pending_retire.push_back(submission.seqno);
        }
        inner.submissions.push(submission);
        Ok(address)
    }

    fn poll_retired(&mut self) -> Vec<u64> {
        self.inner.borrow_mut().pending_retire.drain(..).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub allocations: u64,
    pub bytes_allocated: u64,
    pub relocations: u64,
    pub flushes: u64,
}

/// Write-combined scratch memory for Gen4 indirect state.
///
/// The backing store is a ring of equally sized segments. State blocks are bump
/// allocated in the open segment; when a block does not fit, the segment is flushed to
/// the [`BatchSubmitter`] and allocation retries in the next one. Each segment is one
/// submission, so a flush invalidates every offset handed out before it. Callers detect
/// that through [`StateBatch::seqno`].
pub struct StateBatch {
    label: String,
    storage: Vec<u8>,
    segment_size: u32,
    arenas: Vec<BufferArena>,
    in_flight: Vec<Option<u64>>,
    presumed: Vec<u64>,
    current: usize,
    seqno: u64,
    relocations: Vec<Relocation>,
    submitter: Box<dyn BatchSubmitter>,
    stats: BatchStats,
}

impl StateBatch {
    pub fn new(
        desc: StateBatchDescriptor<'_>,
        submitter: Box<dyn BatchSubmitter>,
    ) -> Result<Self, BatchError> {
        if desc.segment_count == 0 {
            return Err(BatchError::InvalidDescriptor("segment_count must be > 0"));
        }
        if desc.segment_size == 0 || desc.segment_size % 64 != 0 {
            return Err(BatchError::InvalidDescriptor(
                "segment_size must be a non-zero multiple of 64",
            ));
        }
        let total = (desc.segment_size as usize)
            .checked_mul(desc.segment_count)
            .ok_or(BatchError::InvalidDescriptor("ring size overflows usize"))?;

        Ok(Self {
            label: desc.label.unwrap_or("state batch").to_owned(),
            storage: vec![0; total],
            segment_size: desc.segment_size,
            arenas: (0..desc.segment_count)
                .map(|_| BufferArena::new(desc.segment_size))
                .collect(),
            in_flight: vec![None; desc.segment_count],
            presumed: vec![0; desc.segment_count],
            current: 0,
            seqno: 1,
            relocations: Vec::new(),
            submitter,
            stats: BatchStats::default(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sequence number of the open segment. Changes on every flush.
    pub fn seqno(&self) -> u64 {
        self.seqno
    }

    pub fn segment_size(&self) -> u32 {
        self.segment_size
    }

    /// Index of the open segment within the ring.
    pub fn segment_index(&self) -> usize {
        self.current
    }

    /// Last known GPU address of the open segment.
    pub fn presumed_address(&self) -> u64 {
        self.presumed[self.current]
    }

    /// Bytes allocated in the open segment.
    pub fn used(&self) -> u32 {
        self.arenas[self.current].used()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    /// The allocated portion of the open segment.
    pub fn segment_bytes(&self) -> &[u8] {
        let start = self.segment_start();
        &self.storage[start..start + self.used() as usize]
    }

    fn segment_start(&self) -> usize {
        self.current * self.segment_size as usize
    }

    /// Reserve `size` bytes aligned to `alignment` in the open segment.
    ///
    /// Flushes and retries once if the segment is full. Returns the segment-relative
    /// offset of the block.
    pub fn state_alloc(&mut self, size: u32, alignment: u32) -> Result<u32, BatchError> {
        debug_assert!(alignment.is_power_of_two());
        if !self.arenas[self.current].could_ever_fit(size) {
            return Err(BatchError::BackingStoreExhausted {
                requested: size,
                segment_size: self.segment_size,
            });
        }
        self.ensure_open_segment()?;

        let offset = match self.arenas[self.current].alloc(size, alignment) {
            Some(offset) => offset,
            None => {
                debug!(
                    batch = %self.label,
                    seqno = self.seqno,
                    requested = size,
                    remaining = self.arenas[self.current].remaining(),
                    "state batch segment full; flushing"
                );
                self.flush()?;
                self.arenas[self.current].alloc(size, alignment).ok_or(
                    BatchError::BackingStoreExhausted {
                        requested: size,
                        segment_size: self.segment_size,
                    },
                )?
            }
        };

        self.stats.allocations += 1;
        self.stats.bytes_allocated += u64::from(size);
        trace!(seqno = self.seqno, offset, size, alignment, "state_alloc");
        Ok(offset)
    }

    /// Copy `bytes` into the open segment at a previously allocated `offset`.
    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), BatchError> {
        let used = self.used();
        let end = (offset as usize).checked_add(bytes.len());
        if end.map_or(true, |end| end > used as usize) {
            return Err(BatchError::WriteOutOfBounds {
                offset,
                len: bytes.len(),
                used,
            });
        }
        let start = self.segment_start() + offset as usize;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Write a fixed-layout block at a previously allocated `offset`.
    pub fn write_pod<T: Pod>(&mut self, offset: u32, value: &T) -> Result<(), BatchError> {
        self.write(offset, bytemuck::bytes_of(value))
    }

    /// Record a relocation against the open segment.
    pub fn emit_reloc(&mut self, reloc: Relocation) {
        debug_assert!(reloc.offset < self.used(), "relocation outside allocated state");
        self.stats.relocations += 1;
        self.relocations.push(reloc);
    }

    /// Seal the open segment, hand it to the submitter and move to the next segment.
    ///
    /// A segment with no allocations is not submitted.
    pub fn flush(&mut self) -> Result<(), BatchError> {
        if self.in_flight[self.current].is_some() {
            return self.ensure_open_segment();
        }
        if self.arenas[self.current].allocations() == 0 {
            return Ok(());
        }

        let submission = BatchSubmission {
            seqno: self.seqno,
            segment: self.current,
            presumed_address: self.presumed[self.current],
            bytes: self.segment_bytes().to_vec(),
            relocations: std::mem::take(&mut self.relocations),
        };
        debug!(
            batch = %self.label,
            seqno = submission.seqno,
            segment = submission.segment,
            bytes = submission.bytes.len(),
            relocations = submission.relocations.len(),
            "flushing state batch"
        );

        let address = self
            .submitter
            .submit(submission)
            .map_err(BatchError::Submit)?;
        self.presumed[self.current] = address;
        self.in_flight[self.current] = Some(self.seqno);
        self.stats.flushes += 1;
        self.seqno += 1;

        self.ensure_open_segment()
    }

    /// Make sure the segment at the ring cursor can take allocations, advancing past a
    /// sealed segment if needed.
    fn ensure_open_segment(&mut self) -> Result<(), BatchError> {
        if self.in_flight[self.current].is_none() {
            return Ok(());
        }

        self.process_retired();
        let next = (self.current + 1) % self.arenas.len();
        if let Some(seqno) = self.in_flight[next] {
            return Err(BatchError::RingFull {
                segment: next,
                seqno,
            });
        }

        self.current = next;
        self.arenas[next].reset();
        let start = self.segment_start();
        self.storage[start..start + self.segment_size as usize].fill(0);
        Ok(())
    }

    fn process_retired(&mut self) {
        for seqno in self.submitter.poll_retired() {
            if let Some(slot) = self.in_flight.iter_mut().find(|s| **s == Some(seqno)) {
                *slot = None;
            } else {
                debug!(seqno, "retired seqno does not match an in-flight segment");
            }
        }
    }
}

impl fmt::Debug for StateBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBatch")
            .field("label", &self.label)
            .field("segment_size", &self.segment_size)
            .field("current", &self.current)
            .field("seqno", &self.seqno)
            .field("arena", &self.arenas[self.current])
            .field("in_flight", &self.in_flight)
            .field("relocations", &self.relocations.len())
            .finish()
    }
}
