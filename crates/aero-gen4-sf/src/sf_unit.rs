//! SF (strips and fans / setup) unit state.

use aero_gen4_batch::{GemDomains, RelocTarget, Relocation};
use tracing::{debug, trace, warn};

use crate::config::{DebugFlags, OffscreenPointRule};
use crate::dirty::{ContextDirty, DirtySet, DriverDirty};
use crate::error::SfError;
use crate::pipeline::StateEmitter;
use crate::regs::{
    sf6, CullMode, FrontWinding, PointRastRule, SfUnitFields, SfUnitState,
    FLOATING_POINT_NON_IEEE_754, SF_URB_ENTRY_READ_OFFSET,
};
use crate::state::{CullFace, ProvokingVertex, StateSnapshot};

/// State the SF unit block is compiled from.
pub const SF_UNIT_DEPS: DirtySet = DirtySet::new(
    ContextDirty::BUFFERS
        .union(ContextDirty::LIGHT)
        .union(ContextDirty::LINE)
        .union(ContextDirty::POINT)
        .union(ContextDirty::POLYGON)
        .union(ContextDirty::PROGRAM)
        .union(ContextDirty::SCISSOR),
    DriverDirty::BATCH
        .union(DriverDirty::BLORP)
        .union(DriverDirty::PROGRAM_CACHE)
        .union(DriverDirty::SF_PROG_DATA)
        .union(DriverDirty::SF_VP)
        .union(DriverDirty::URB_FENCE),
);

/// Where the SF unit block and the blocks it points at live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfUnitLayout {
    /// Segment offset the unit block will be written at.
    pub state_offset: u32,
    /// Segment offset of the SF viewport block.
    pub vp_offset: u32,
    /// Presumed GPU address of the state batch segment.
    pub batch_address: u64,
    /// Presumed GPU address of the program cache.
    pub cache_address: u64,
}

/// A compiled SF unit block and the relocations its pointer fields need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfUnitBuild {
    pub state: SfUnitState,
    /// Offsets are segment relative, ready for [`aero_gen4_batch::StateBatch::emit_reloc`].
    pub relocations: Vec<Relocation>,
}

fn cull_mode(snapshot: &StateSnapshot) -> CullMode {
    let polygon = &snapshot.polygon;
    if !polygon.cull_enabled {
        return CullMode::None;
    }
    match polygon.cull_face {
        CullFace::Front => CullMode::Front,
        CullFace::Back => CullMode::Back,
        CullFace::FrontAndBack => CullMode::Both,
        CullFace::None => CullMode::None,
    }
}

/// Line width in U3.1, or 0 for the hardware's default one-pixel line.
fn line_width(snapshot: &StateSnapshot) -> u32 {
    let line = &snapshot.line;
    let width = line.width.max(1.0).min(snapshot.device.max_line_width);
    let mut encoded = (width * 2.0) as u32;
    if encoded > sf6::LINE_WIDTH.max() {
        warn!(
            width,
            encoded,
            max = sf6::LINE_WIDTH.max(),
            "line width exceeds the SF register range; saturating"
        );
        encoded = sf6::LINE_WIDTH.max();
    }

    // Width 0 rasterizes exact one-pixel lines, which conformance wants for
    // non-antialiased lines up to one pixel wide.
    if !line.smooth && encoded <= 2 {
        0
    } else {
        encoded
    }
}

/// Point size in U8.3.
fn point_size(snapshot: &StateSnapshot) -> u32 {
    let point = &snapshot.point;
    let size = point.size.max(point.min_size).min(point.max_size);
    (size.round_ties_even().clamp(1.0, 255.0) as u32) * 8
}

fn point_rast_rule(snapshot: &StateSnapshot) -> PointRastRule {
    if !snapshot.draw_target.is_offscreen {
        return PointRastRule::UpperRight;
    }
    match snapshot.options.offscreen_point_rule {
        OffscreenPointRule::LowerRight => PointRastRule::LowerRight,
        OffscreenPointRule::UpperRight => PointRastRule::UpperRight,
    }
}

/// Compile the SF unit block for `snapshot` placed as described by `layout`.
pub fn compile_sf_unit(snapshot: &StateSnapshot, layout: &SfUnitLayout) -> SfUnitBuild {
    let generation = snapshot.device.generation;
    let program = &snapshot.sf_program;
    let mut relocations = Vec::with_capacity(2);

    let grf_reg_count = program.total_grf.div_ceil(16).saturating_sub(1);

    // The register count shares the dword with the pointer, so it is folded into the
    // relocation delta.
    let kernel_offset = program.cache_offset + (grf_reg_count << 1);
    let kernel_address = if generation.has_instruction_base_address() {
        kernel_offset
    } else {
        relocations.push(Relocation {
            offset: layout.state_offset + SfUnitState::THREAD0_OFFSET,
            target: RelocTarget::ProgramCache,
            delta: kernel_offset,
            read_domains: GemDomains::INSTRUCTION,
            write_domain: GemDomains::empty(),
        });
        (layout.cache_address as u32).wrapping_add(kernel_offset)
    };

    let front_winding = if snapshot.polygon.front_face_cw {
        FrontWinding::Cw
    } else {
        FrontWinding::Ccw
    };
    // Offscreen targets are rendered Y-inverted, which reverses the winding.
    let front_winding = front_winding.flipped_if(snapshot.draw_target.is_offscreen);

    let (trifan_pv, linestrip_pv, tristrip_pv) = match snapshot.provoking_vertex {
        ProvokingVertex::Last => (2, 1, 2),
        ProvokingVertex::First => (1, 0, 0),
    };

    let urb = &snapshot.urb;
    let fields = SfUnitFields {
        grf_reg_count,
        kernel_start_pointer: kernel_address >> 6,

        floating_point_mode: FLOATING_POINT_NON_IEEE_754,

        dispatch_grf_start_reg: 3,
        urb_entry_read_offset: SF_URB_ENTRY_READ_OFFSET,
        urb_entry_read_length: program.urb_read_length,

        stats_enable: snapshot.debug.contains(DebugFlags::STATS),
        nr_urb_entries: urb.nr_sf_entries,
        urb_entry_allocation_size: urb.sf_entry_size.saturating_sub(1),
        max_threads: generation
            .max_sf_threads()
            .min(urb.nr_sf_entries)
            .saturating_sub(1),

        front_winding,
        viewport_transform: true,
        sf_viewport_state_offset: (layout.batch_address as u32).wrapping_add(layout.vp_offset)
            >> 5,

        dest_org_vbias: 0x8,
        dest_org_hbias: 0x8,
        scissor: snapshot.scissor.any_enabled(),
        point_rast_rule: point_rast_rule(snapshot),
        line_endcap_aa_region_width: 1,
        line_width: line_width(snapshot),
        cull_mode: cull_mode(snapshot),
        aa_enable: snapshot.line.smooth,

        point_size: point_size(snapshot),
        use_point_size_state: !(snapshot.program.point_size_enabled || snapshot.point.attenuated),
        sprite_point: snapshot.point.sprite,
        aa_line_distance_mode: 0,
        trifan_pv,
        linestrip_pv,
        tristrip_pv,
        line_last_pixel_enable: false,

        ..Default::default()
    };

    relocations.push(Relocation {
        offset: layout.state_offset + SfUnitState::SF5_OFFSET,
        target: RelocTarget::StateBatch,
        delta: layout.vp_offset | front_winding as u32 | (1 << 1),
        read_domains: GemDomains::INSTRUCTION,
        write_domain: GemDomains::empty(),
    });

    SfUnitBuild {
        state: fields.pack(),
        relocations,
    }
}

/// Allocate, compile and write the SF unit block with its relocations, then raise
/// `GEN4_UNIT_STATE`.
///
/// The SF viewport block must already be in the open segment.
pub fn emit_sf_unit(emitter: &mut StateEmitter<'_>, snapshot: &StateSnapshot) -> Result<(), SfError> {
    let state_offset = emitter
        .batch()
        .state_alloc(SfUnitState::SIZE_BYTES as u32, SfUnitState::ALIGNMENT)?;
    let vp_offset = emitter.viewport_offset().ok_or(SfError::ViewportUnavailable)?;

    let batch = emitter.batch();
    let layout = SfUnitLayout {
        state_offset,
        vp_offset,
        batch_address: batch.presumed_address(),
        cache_address: snapshot.program_cache_address,
    };
    let build = compile_sf_unit(snapshot, &layout);

    batch.write_pod(state_offset, &build.state)?;
    for reloc in build.relocations {
        batch.emit_reloc(reloc);
    }

    debug!(state_offset, vp_offset, seqno = batch.seqno(), "emitted SF unit state");
    if snapshot.debug.contains(DebugFlags::STATE) {
        trace!(state_offset, fields = ?build.state.decode(), "SF unit state");
    }

    emitter.offsets_mut().unit_offset = Some(state_offset);
    emitter.raise(DriverDirty::GEN4_UNIT_STATE);
    Ok(())
}
