use aero_gen4_batch::BatchError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SfError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// SF unit state was emitted without an SF viewport block in the open segment.
    #[error("SF unit state requires an SF viewport block in the open state batch segment")]
    ViewportUnavailable,

    /// The state batch flushed again after the pass restarted on a fresh segment.
    #[error("SF state pass does not fit in one state batch segment ({segment_size} bytes)")]
    PassDoesNotFit { segment_size: u32 },
}
