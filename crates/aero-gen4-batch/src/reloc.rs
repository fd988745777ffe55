//! Deferred address patching.
//!
//! State blocks reference other buffers (the state batch itself, the program cache) by
//! GPU address, but those addresses are only final once the submission backend has
//! placed the buffers. Compilers write a presumed address and record a [`Relocation`];
//! [`apply_relocations`] rewrites each recorded dword before the GPU consumes it.

use bitflags::bitflags;

bitflags! {
    /// Cache domains a relocated reference is accessed through (i915 GEM numbering).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct GemDomains: u32 {
        const CPU = 0x01;
        const RENDER = 0x02;
        const SAMPLER = 0x04;
        const COMMAND = 0x08;
        const INSTRUCTION = 0x10;
        const VERTEX = 0x20;
        const GTT = 0x40;
    }
}

/// Buffer a relocation points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocTarget {
    /// The state batch segment the relocation was recorded in.
    StateBatch,
    /// The program cache holding compiled kernels.
    ProgramCache,
}

/// A request to patch one little-endian dword with `address(target) + delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset of the dword within the segment.
    pub offset: u32,
    pub target: RelocTarget,
    /// Added to the target's final address. May carry flag bits in its low bits.
    pub delta: u32,
    pub read_domains: GemDomains,
    pub write_domain: GemDomains,
}

impl Relocation {
    /// Value the dword holds once `target` resolves to `address`.
    ///
    /// Gen4 state pointers are 32-bit, so the sum wraps like the hardware adder.
    pub fn patched_value(&self, address: u64) -> u32 {
        (address as u32).wrapping_add(self.delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelocError {
    #[error("relocation at offset {offset} targets unresolved buffer {target:?}")]
    Unresolved { offset: u32, target: RelocTarget },
    #[error("relocation at offset {offset} is outside the {len}-byte segment")]
    OutOfBounds { offset: u32, len: usize },
    #[error("relocation offset {0} is not dword aligned")]
    Misaligned(u32),
}

/// Patch every relocated dword in `bytes`.
///
/// `resolve` maps a target buffer to its final GPU address; returning `None` fails the
/// pass without partially patching later entries.
pub fn apply_relocations(
    bytes: &mut [u8],
    relocations: &[Relocation],
    mut resolve: impl FnMut(RelocTarget) -> Option<u64>,
) -> Result<(), RelocError> {
    for reloc in relocations {
        if reloc.offset % 4 != 0 {
            return Err(RelocError::Misaligned(reloc.offset));
        }
        let start = reloc.offset as usize;
        let Some(end) = start.checked_add(4).filter(|end| *end <= bytes.len()) else {
            return Err(RelocError::OutOfBounds {
                offset: reloc.offset,
                len: bytes.len(),
            });
        };
        let address = resolve(reloc.target).ok_or(RelocError::Unresolved {
            offset: reloc.offset,
            target: reloc.target,
        })?;

        bytes[start..end].copy_from_slice(&reloc.patched_value(address).to_le_bytes());
    }
    Ok(())
}
