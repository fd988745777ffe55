use aero_gen4_batch::{
    GemDomains, NullBatchSubmitter, RelocTarget, Relocation, StateBatch, StateBatchDescriptor,
};
use aero_gen4_sf::{
    compile_sf_unit, compile_sf_viewport, emit_sf_unit, emit_sf_viewport, CullFace, CullMode,
    DebugFlags, DirtySet, DrawTarget, DriverDirty, FrontWinding, OffscreenPointRule,
    PointRastRule, ProvokingVertex, ScissorBounds, ScissorRect, SfError, SfOffsets,
    SfUnitFields, SfUnitLayout, SfUnitState, SfViewport, StateEmitter, StateSnapshot,
    ViewportState,
};
use pretty_assertions::assert_eq;

const LAYOUT: SfUnitLayout = SfUnitLayout {
    state_offset: 0x80,
    vp_offset: 0x40,
    batch_address: 0x0010_0000,
    cache_address: 0x0080_0000,
};

fn snapshot(target: DrawTarget) -> StateSnapshot {
    let mut snapshot = StateSnapshot::new(target);
    snapshot.viewport = ViewportState::from_rect(10.0, 20.0, 200.0, 100.0, 0.0, 1.0);
    snapshot.scissor.bounds = ScissorBounds {
        xmin: 0,
        xmax: 800,
        ymin: 100,
        ymax: 500,
    };
    snapshot
}

fn unit_fields(snapshot: &StateSnapshot) -> SfUnitFields {
    compile_sf_unit(snapshot, &LAYOUT).state.decode()
}

#[test]
fn window_viewport_flips_y() {
    let block = compile_sf_viewport(&snapshot(DrawTarget::window(800, 600)));
    assert_eq!(
        block,
        SfViewport {
            m00: 100.0,
            m11: -50.0,
            m22: 0.5,
            m30: 110.0,
            m31: -70.0 + 600.0,
            m32: 0.5,
            scissor: ScissorRect {
                xmin: 0,
                ymin: 100,
                xmax: 799,
                ymax: 499,
            },
        }
    );
}

#[test]
fn offscreen_viewport_keeps_y() {
    let block = compile_sf_viewport(&snapshot(DrawTarget::offscreen(800, 600)));
    assert_eq!(
        block,
        SfViewport {
            m00: 100.0,
            m11: 50.0,
            m22: 0.5,
            m30: 110.0,
            m31: 70.0,
            m32: 0.5,
            scissor: ScissorRect {
                xmin: 0,
                ymin: 100,
                xmax: 799,
                ymax: 499,
            },
        }
    );
}

#[test]
fn degenerate_scissor_rejects_everything() {
    let mut snapshot = snapshot(DrawTarget::window(800, 600));
    snapshot.scissor.bounds = ScissorBounds {
        xmin: 10,
        xmax: 10,
        ymin: 0,
        ymax: 50,
    };
    let scissor = compile_sf_viewport(&snapshot).scissor;
    assert_eq!(
        (scissor.xmin, scissor.xmax, scissor.ymin, scissor.ymax),
        (1, 0, 1, 0)
    );
}

#[test]
fn front_winding_truth_table() {
    let cases = [
        (false, false, FrontWinding::Ccw),
        (true, false, FrontWinding::Cw),
        (false, true, FrontWinding::Cw),
        (true, true, FrontWinding::Ccw),
    ];
    for (front_face_cw, is_offscreen, expected) in cases {
        let target = if is_offscreen {
            DrawTarget::offscreen(64, 64)
        } else {
            DrawTarget::window(64, 64)
        };
        let mut snapshot = snapshot(target);
        snapshot.polygon.front_face_cw = front_face_cw;
        assert_eq!(
            unit_fields(&snapshot).front_winding,
            expected,
            "front_face_cw={front_face_cw} offscreen={is_offscreen}"
        );
    }
}

#[test]
fn cull_mode_mapping() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    assert_eq!(unit_fields(&snapshot).cull_mode, CullMode::None);

    snapshot.polygon.cull_enabled = true;
    for (face, expected) in [
        (CullFace::Front, CullMode::Front),
        (CullFace::Back, CullMode::Back),
        (CullFace::FrontAndBack, CullMode::Both),
        (CullFace::None, CullMode::None),
    ] {
        snapshot.polygon.cull_face = face;
        assert_eq!(unit_fields(&snapshot).cull_mode, expected, "{face:?}");
    }
}

#[test]
fn thin_lines_use_default_width_unless_smooth() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    snapshot.line.width = 0.4;

    let fields = unit_fields(&snapshot);
    assert_eq!((fields.line_width, fields.aa_enable), (0, false));

    snapshot.line.smooth = true;
    let fields = unit_fields(&snapshot);
    assert_eq!((fields.line_width, fields.aa_enable), (2, true));
    assert_eq!(fields.line_endcap_aa_region_width, 1);
}

#[test]
fn wide_lines_are_clamped_to_device_limit() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    snapshot.line.width = 3.0;
    assert_eq!(unit_fields(&snapshot).line_width, 6);

    snapshot.line.width = 100.0;
    assert_eq!(unit_fields(&snapshot).line_width, 14);
}

#[test]
fn point_state() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    snapshot.point.size = 4.0;
    snapshot.point.sprite = true;

    let fields = unit_fields(&snapshot);
    assert_eq!(fields.point_size, 32);
    assert!(fields.sprite_point);
    assert!(fields.use_point_size_state);
    assert_eq!(fields.point_rast_rule, PointRastRule::UpperRight);

    snapshot.program.point_size_enabled = true;
    assert!(!unit_fields(&snapshot).use_point_size_state);

    snapshot.program.point_size_enabled = false;
    snapshot.point.attenuated = true;
    assert!(!unit_fields(&snapshot).use_point_size_state);
}

#[test]
fn offscreen_point_rule_is_configurable() {
    let mut snapshot = snapshot(DrawTarget::offscreen(64, 64));
    assert_eq!(unit_fields(&snapshot).point_rast_rule, PointRastRule::LowerRight);

    snapshot.options.offscreen_point_rule = OffscreenPointRule::UpperRight;
    assert_eq!(unit_fields(&snapshot).point_rast_rule, PointRastRule::UpperRight);
}

#[test]
fn provoking_vertex_selection() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    let fields = unit_fields(&snapshot);
    assert_eq!(
        (fields.trifan_pv, fields.linestrip_pv, fields.tristrip_pv),
        (1, 0, 0)
    );

    snapshot.provoking_vertex = ProvokingVertex::Last;
    let fields = unit_fields(&snapshot);
    assert_eq!(
        (fields.trifan_pv, fields.linestrip_pv, fields.tristrip_pv),
        (2, 1, 2)
    );
    assert!(!fields.line_last_pixel_enable);
}

#[test]
fn scissor_and_stats_flags() {
    let mut snapshot = snapshot(DrawTarget::window(64, 64));
    let fields = unit_fields(&snapshot);
    assert!(!fields.scissor);
    assert!(!fields.stats_enable);
    assert_eq!((fields.dest_org_vbias, fields.dest_org_hbias), (8, 8));

    snapshot.scissor.enable_mask = 0b1;
    snapshot.debug = DebugFlags::STATS;
    let fields = unit_fields(&snapshot);
    assert!(fields.scissor);
    assert!(fields.stats_enable);
}

#[test]
fn compilation_is_deterministic() {
    let mut snapshot = snapshot(DrawTarget::offscreen(1024, 768));
    snapshot.line.smooth = true;
    snapshot.polygon.cull_enabled = true;

    assert_eq!(
        bytemuck::bytes_of(&compile_sf_viewport(&snapshot)),
        bytemuck::bytes_of(&compile_sf_viewport(&snapshot))
    );
    assert_eq!(
        compile_sf_unit(&snapshot, &LAYOUT),
        compile_sf_unit(&snapshot, &LAYOUT)
    );
}

#[test]
fn unit_relocations_match_written_dwords() {
    let snapshot = snapshot(DrawTarget::window(64, 64));
    let build = compile_sf_unit(&snapshot, &LAYOUT);

    assert_eq!(
        build.relocations,
        vec![
            Relocation {
                offset: LAYOUT.state_offset,
                target: RelocTarget::ProgramCache,
                delta: 0,
                read_domains: GemDomains::INSTRUCTION,
                write_domain: GemDomains::empty(),
            },
            Relocation {
                offset: LAYOUT.state_offset + 20,
                target: RelocTarget::StateBatch,
                delta: 0x40 | 0b11,
                read_domains: GemDomains::INSTRUCTION,
                write_domain: GemDomains::empty(),
            },
        ]
    );
    assert_eq!(
        build.relocations[0].patched_value(LAYOUT.cache_address),
        build.state.thread0
    );
    assert_eq!(
        build.relocations[1].patched_value(LAYOUT.batch_address),
        build.state.sf5
    );
}

#[test]
fn emitters_write_blocks_and_raise_flags() {
    let mut batch = StateBatch::new(
        StateBatchDescriptor::default(),
        Box::new(NullBatchSubmitter::new()),
    )
    .unwrap();
    let mut dirty = DirtySet::empty();
    let mut offsets = SfOffsets::default();
    let snapshot = snapshot(DrawTarget::window(800, 600));

    {
        let mut emitter = StateEmitter::new(&mut batch, &mut dirty, &mut offsets);
        assert_eq!(
            emit_sf_unit(&mut emitter, &snapshot),
            Err(SfError::ViewportUnavailable)
        );
    }
    batch.flush().unwrap();
    let mut emitter = StateEmitter::new(&mut batch, &mut dirty, &mut offsets);

    emit_sf_viewport(&mut emitter, &snapshot).unwrap();
    assert_eq!(emitter.dirty(), DirtySet::driver(DriverDirty::SF_VP));
    emit_sf_unit(&mut emitter, &snapshot).unwrap();
    assert_eq!(
        emitter.dirty(),
        DirtySet::driver(DriverDirty::SF_VP | DriverDirty::GEN4_UNIT_STATE)
    );
    drop(emitter);

    assert_eq!(offsets.vp_offset, Some(0));
    assert_eq!(offsets.unit_offset, Some(64));
    assert_eq!(offsets.seqno, batch.seqno());

    let bytes = batch.segment_bytes();
    let vp: SfViewport = bytemuck::pod_read_unaligned(&bytes[0..32]);
    assert_eq!(vp, compile_sf_viewport(&snapshot));
    let unit: SfUnitState = bytemuck::pod_read_unaligned(&bytes[64..96]);
    assert_eq!(unit.decode().sf_viewport_state_offset, 0);
    assert_eq!(batch.relocations().len(), 2);
    assert_eq!(batch.relocations()[1].offset, 64 + 20);
}
