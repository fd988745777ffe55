use bitflags::bitflags;

/// Environment variable holding comma separated [`DebugFlags`] names.
pub const DEBUG_ENV_VAR: &str = "AERO_GEN4_DEBUG";

/// Gen4-family device generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Original i965 (Broadwater / Crestline).
    Gen4,
    /// G45 / GM45 (Eaglelake / Cantiga).
    G4x,
    /// Ironlake (Gen5).
    Ironlake,
}

impl Generation {
    /// Maximum SF threads the hardware can run concurrently.
    ///
    /// Each SF thread produces one URB entry.
    pub fn max_sf_threads(self) -> u32 {
        match self {
            Generation::Ironlake => 48,
            Generation::Gen4 | Generation::G4x => 24,
        }
    }

    /// Whether kernel pointers are relative to the instruction base address instead of
    /// absolute (relocated) addresses.
    pub fn has_instruction_base_address(self) -> bool {
        matches!(self, Generation::Ironlake)
    }
}

/// Device facts the SF unit compiler depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceInfo {
    pub generation: Generation,
    /// Largest line width the API exposes, in pixels.
    pub max_line_width: f32,
}

impl DeviceInfo {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            max_line_width: 7.375,
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::new(Generation::Gen4)
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlags: u32 {
        /// Enable hardware statistics counters in unit state.
        const STATS = 1 << 0;
        /// Trace every emitted state block, decoded.
        const STATE = 1 << 1;
    }
}

impl DebugFlags {
    /// Parse a comma separated list such as `"stats,state"`.
    ///
    /// Unknown names are ignored; `all` enables every flag.
    pub fn parse(raw: &str) -> Self {
        let mut flags = DebugFlags::empty();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if name.eq_ignore_ascii_case("all") {
                flags = DebugFlags::all();
            } else if name.eq_ignore_ascii_case("stats") {
                flags |= DebugFlags::STATS;
            } else if name.eq_ignore_ascii_case("state") {
                flags |= DebugFlags::STATE;
            } else {
                tracing::debug!(name, "ignoring unknown {DEBUG_ENV_VAR} flag");
            }
        }
        flags
    }

    /// Read [`DEBUG_ENV_VAR`]; unset means no flags.
    pub fn from_env() -> Self {
        match std::env::var(DEBUG_ENV_VAR) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => DebugFlags::empty(),
        }
    }
}

/// Point rasterization rule used when rendering to an offscreen target.
///
/// Offscreen targets have Y inverted relative to window targets, so the sample corner
/// that matches the API's rule is lower-right. Hardware documentation lists
/// lower-right as reserved; devices that ignore it mis-rasterize points, which is no
/// worse than using upper-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OffscreenPointRule {
    #[default]
    LowerRight,
    UpperRight,
}

/// Tunables for SF state compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfOptions {
    pub offscreen_point_rule: OffscreenPointRule,
}
