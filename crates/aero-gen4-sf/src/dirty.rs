//! Dirty-state categories and the sets atoms declare their dependencies with.

use bitflags::bitflags;

bitflags! {
    /// API-visible rendering state that changed since the last upload.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ContextDirty: u32 {
        /// Draw target binding or size.
        const BUFFERS = 1 << 0;
        const SCISSOR = 1 << 1;
        const VIEWPORT = 1 << 2;
        const POLYGON = 1 << 3;
        const LINE = 1 << 4;
        const POINT = 1 << 5;
        /// Bound programs, including whether the vertex program writes point size.
        const PROGRAM = 1 << 6;
        /// Lighting state, which carries the provoking-vertex convention.
        const LIGHT = 1 << 7;
    }
}

bitflags! {
    /// Driver-internal state that changed since the last upload.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DriverDirty: u32 {
        /// A new state batch segment was opened; all earlier offsets are stale.
        const BATCH = 1 << 0;
        /// A blit/resolve pass clobbered the 3D pipeline state.
        const BLORP = 1 << 1;
        /// The program cache buffer was reallocated.
        const PROGRAM_CACHE = 1 << 2;
        const SF_PROG_DATA = 1 << 3;
        /// The SF viewport block was re-emitted.
        const SF_VP = 1 << 4;
        const URB_FENCE = 1 << 5;
        /// A Gen4 unit state block was re-emitted.
        const GEN4_UNIT_STATE = 1 << 6;
    }
}

/// A pair of context and driver dirty flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct DirtySet {
    pub context: ContextDirty,
    pub driver: DriverDirty,
}

impl DirtySet {
    pub const fn new(context: ContextDirty, driver: DriverDirty) -> Self {
        Self { context, driver }
    }

    pub const fn empty() -> Self {
        Self::new(ContextDirty::empty(), DriverDirty::empty())
    }

    pub const fn all() -> Self {
        Self::new(ContextDirty::all(), DriverDirty::all())
    }

    pub const fn context(context: ContextDirty) -> Self {
        Self::new(context, DriverDirty::empty())
    }

    pub const fn driver(driver: DriverDirty) -> Self {
        Self::new(ContextDirty::empty(), driver)
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.driver.is_empty()
    }

    /// Whether any category in `other` is also set in `self`.
    pub fn intersects(&self, other: &DirtySet) -> bool {
        self.context.intersects(other.context) || self.driver.intersects(other.driver)
    }

    pub fn insert(&mut self, other: DirtySet) {
        self.context.insert(other.context);
        self.driver.insert(other.driver);
    }

    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}

impl std::ops::BitOr for DirtySet {
    type Output = DirtySet;

    fn bitor(mut self, rhs: DirtySet) -> DirtySet {
        self.insert(rhs);
        self
    }
}

impl From<ContextDirty> for DirtySet {
    fn from(context: ContextDirty) -> Self {
        Self::context(context)
    }
}

impl From<DriverDirty> for DirtySet {
    fn from(driver: DriverDirty) -> Self {
        Self::driver(driver)
    }
}
