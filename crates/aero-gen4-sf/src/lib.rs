//! Dirty-tracked compiler for Gen4 (i965 / G4x / Ironlake) SF unit state.
//!
//! A [`StateSnapshot`] of the rendering context is compiled into the SF viewport and
//! SF unit state blocks, written into an [`aero_gen4_batch::StateBatch`] with the
//! relocations their pointer fields need. [`StatePipeline`] decides from the
//! accumulated [`DirtySet`] which blocks have to be recompiled.

mod config;
mod dirty;
mod error;
mod pipeline;
pub mod regs;
mod sf_unit;
mod sf_vp;
mod state;

pub use config::{
    DebugFlags, DeviceInfo, Generation, OffscreenPointRule, SfOptions, DEBUG_ENV_VAR,
};
pub use dirty::{ContextDirty, DirtySet, DriverDirty};
pub use error::SfError;
pub use pipeline::{
    EmitFn, PipelineStats, SfOffsets, StateEmitter, StatePipeline, TrackedState, UploadReport,
    GEN4_SF_ATOMS, SF_UNIT, SF_VIEWPORT,
};
pub use regs::{
    CullMode, FrontWinding, PointRastRule, ScissorRect, SfUnitFields, SfUnitState, SfViewport,
};
pub use sf_unit::{compile_sf_unit, emit_sf_unit, SfUnitBuild, SfUnitLayout, SF_UNIT_DEPS};
pub use sf_vp::{compile_sf_viewport, emit_sf_viewport, hw_scissor, SF_VIEWPORT_DEPS};
pub use state::{
    CullFace, DrawTarget, LineState, PointState, PolygonState, ProgramState, ProvokingVertex,
    ScissorBounds, ScissorState, SfProgram, StateSnapshot, UrbAllocation, ViewportState,
    GL_BACK, GL_FRONT, GL_FRONT_AND_BACK, GL_NONE,
};
