//! Read-only snapshot of the rendering state SF compilation consumes.
//!
//! The owning context builds a [`StateSnapshot`] per upload; compilers borrow it for the
//! duration of one call and keep nothing.

use crate::config::{DebugFlags, DeviceInfo, SfOptions};

/// The bound draw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTarget {
    pub width: u32,
    pub height: u32,
    /// Rendering into an application-created framebuffer (texture memory, Y=0 at the
    /// top in hardware terms) rather than a window surface.
    pub is_offscreen: bool,
    /// Width and height are only meaningful when at least one attachment exists.
    pub has_attachments: bool,
}

impl DrawTarget {
    pub fn window(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            is_offscreen: false,
            has_attachments: true,
        }
    }

    pub fn offscreen(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            is_offscreen: true,
            has_attachments: true,
        }
    }
}

/// Viewport transform from normalized device coordinates to window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: [f32; 3],
    pub translate: [f32; 3],
}

impl ViewportState {
    /// Transform for a GL-style viewport rectangle and depth range.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_width = width * 0.5;
        let half_height = height * 0.5;
        Self {
            scale: [half_width, half_height, (far - near) * 0.5],
            translate: [x + half_width, y + half_height, (far + near) * 0.5],
        }
    }
}

/// Draw-target bounds intersected with the scissor rectangle.
///
/// Minimums are inclusive, maximums exclusive, with Y=0 at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorBounds {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl ScissorBounds {
    pub fn full(target: &DrawTarget) -> Self {
        Self {
            xmin: 0,
            xmax: target.width as i32,
            ymin: 0,
            ymax: target.height as i32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xmin == self.xmax || self.ymin == self.ymax
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorState {
    /// One bit per scissor rectangle.
    pub enable_mask: u32,
    pub bounds: ScissorBounds,
}

impl ScissorState {
    pub fn any_enabled(&self) -> bool {
        self.enable_mask != 0
    }
}

pub const GL_NONE: u32 = 0;
pub const GL_FRONT: u32 = 0x0404;
pub const GL_BACK: u32 = 0x0405;
pub const GL_FRONT_AND_BACK: u32 = 0x0408;

/// Which faces culling removes when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
    FrontAndBack,
    None,
}

impl CullFace {
    /// Convert a raw API cull-face enum.
    ///
    /// Upstream validation only lets the four defined values through, so anything else is
    /// a logic error and aborts.
    pub fn from_gl(raw: u32) -> Self {
        match raw {
            GL_FRONT => CullFace::Front,
            GL_BACK => CullFace::Back,
            GL_FRONT_AND_BACK => CullFace::FrontAndBack,
            GL_NONE => CullFace::None,
            _ => unreachable!("invalid cull face mode 0x{raw:04x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolygonState {
    pub front_face_cw: bool,
    pub cull_enabled: bool,
    pub cull_face: CullFace,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineState {
    pub width: f32,
    pub smooth: bool,
}

impl Default for LineState {
    fn default() -> Self {
        Self {
            width: 1.0,
            smooth: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointState {
    pub size: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub sprite: bool,
    /// Distance attenuation is active, so size varies per vertex.
    pub attenuated: bool,
}

impl Default for PointState {
    fn default() -> Self {
        Self {
            size: 1.0,
            min_size: 0.0,
            max_size: 255.0,
            sprite: false,
            attenuated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramState {
    /// The vertex program writes point size.
    pub point_size_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProvokingVertex {
    #[default]
    First,
    Last,
}

/// Metadata of the compiled SF kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfProgram {
    /// Offset of the kernel within the program cache.
    pub cache_offset: u32,
    /// GRF registers the kernel uses.
    pub total_grf: u32,
    /// URB rows the kernel reads per vertex.
    pub urb_read_length: u32,
}

impl Default for SfProgram {
    fn default() -> Self {
        Self {
            cache_offset: 0,
            total_grf: 16,
            urb_read_length: 1,
        }
    }
}

/// URB space the fence partitioning gave the SF stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrbAllocation {
    pub nr_sf_entries: u32,
    /// Entry size in 512-bit units.
    pub sf_entry_size: u32,
}

impl Default for UrbAllocation {
    fn default() -> Self {
        Self {
            nr_sf_entries: 24,
            sf_entry_size: 2,
        }
    }
}

/// Everything one SF state upload reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub draw_target: DrawTarget,
    pub viewport: ViewportState,
    pub scissor: ScissorState,
    pub polygon: PolygonState,
    pub line: LineState,
    pub point: PointState,
    pub program: ProgramState,
    pub provoking_vertex: ProvokingVertex,
    pub sf_program: SfProgram,
    /// Last known GPU address of the program cache buffer.
    pub program_cache_address: u64,
    pub urb: UrbAllocation,
    pub device: DeviceInfo,
    pub debug: DebugFlags,
    pub options: SfOptions,
}

impl StateSnapshot {
    /// API defaults for a freshly bound `draw_target`, with a full-target viewport.
    pub fn new(draw_target: DrawTarget) -> Self {
        Self {
            draw_target,
            viewport: ViewportState::from_rect(
                0.0,
                0.0,
                draw_target.width as f32,
                draw_target.height as f32,
                0.0,
                1.0,
            ),
            scissor: ScissorState {
                enable_mask: 0,
                bounds: ScissorBounds::full(&draw_target),
            },
            polygon: PolygonState::default(),
            line: LineState::default(),
            point: PointState::default(),
            program: ProgramState::default(),
            provoking_vertex: ProvokingVertex::default(),
            sf_program: SfProgram::default(),
            program_cache_address: 0,
            urb: UrbAllocation::default(),
            device: DeviceInfo::default(),
            debug: DebugFlags::empty(),
            options: SfOptions::default(),
        }
    }
}
