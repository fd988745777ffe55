//! SF viewport block: viewport matrix entries and the hardware scissor rectangle.

use tracing::{debug, trace};

use crate::config::DebugFlags;
use crate::dirty::{ContextDirty, DirtySet, DriverDirty};
use crate::error::SfError;
use crate::pipeline::StateEmitter;
use crate::regs::{ScissorRect, SfViewport};
use crate::state::{ScissorBounds, StateSnapshot};

/// State the SF viewport block is compiled from.
pub const SF_VIEWPORT_DEPS: DirtySet = DirtySet::new(
    ContextDirty::BUFFERS
        .union(ContextDirty::SCISSOR)
        .union(ContextDirty::VIEWPORT),
    DriverDirty::BATCH.union(DriverDirty::BLORP),
);

fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, i32::from(u16::MAX)) as u16
}

/// Convert API scissor bounds (inclusive min, exclusive max, Y up) into the inclusive,
/// Y-down rectangle the hardware expects.
pub fn hw_scissor(bounds: &ScissorBounds, height: u32, is_offscreen: bool) -> ScissorRect {
    if bounds.is_empty() {
        // A zero-area rectangle cannot be expressed with inclusive bounds.
        return ScissorRect::NOTHING;
    }

    let (ymin, ymax) = if is_offscreen {
        (bounds.ymin, bounds.ymax - 1)
    } else {
        let height = height as i32;
        (height - bounds.ymax, height - bounds.ymin - 1)
    };

    ScissorRect {
        xmin: clamp_u16(bounds.xmin),
        ymin: clamp_u16(ymin),
        xmax: clamp_u16(bounds.xmax - 1),
        ymax: clamp_u16(ymax),
    }
}

/// Compile the SF viewport block for `snapshot`.
///
/// # Panics
///
/// If the draw target has no attachments; its size is meaningless then.
pub fn compile_sf_viewport(snapshot: &StateSnapshot) -> SfViewport {
    let target = &snapshot.draw_target;
    assert!(
        target.has_attachments,
        "SF viewport compiled without a draw target attachment"
    );

    // Window targets are Y-up in the API but Y-down in hardware.
    let (y_scale, y_bias) = if target.is_offscreen {
        (1.0, 0.0)
    } else {
        (-1.0, target.height as f32)
    };

    let vp = &snapshot.viewport;
    SfViewport {
        m00: vp.scale[0],
        m11: vp.scale[1] * y_scale,
        m22: vp.scale[2],
        m30: vp.translate[0],
        m31: vp.translate[1] * y_scale + y_bias,
        m32: vp.translate[2],
        scissor: hw_scissor(&snapshot.scissor.bounds, target.height, target.is_offscreen),
    }
}

/// Allocate, compile and write the SF viewport block, then raise `SF_VP`.
pub fn emit_sf_viewport(
    emitter: &mut StateEmitter<'_>,
    snapshot: &StateSnapshot,
) -> Result<(), SfError> {
    let block = compile_sf_viewport(snapshot);

    let batch = emitter.batch();
    let offset = batch.state_alloc(SfViewport::SIZE_BYTES as u32, SfViewport::ALIGNMENT)?;
    batch.write_pod(offset, &block)?;

    debug!(offset, seqno = batch.seqno(), "emitted SF viewport");
    if snapshot.debug.contains(DebugFlags::STATE) {
        trace!(offset, ?block, "SF viewport");
    }

    emitter.offsets_mut().vp_offset = Some(offset);
    emitter.raise(DriverDirty::SF_VP);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DrawTarget;
    use pretty_assertions::assert_eq;

    fn bounds(xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> ScissorBounds {
        ScissorBounds {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    #[test]
    fn window_scissor_flips_y() {
        assert_eq!(
            hw_scissor(&bounds(0, 800, 100, 500), 600, false),
            ScissorRect {
                xmin: 0,
                ymin: 100,
                xmax: 799,
                ymax: 499,
            }
        );
        assert_eq!(
            hw_scissor(&bounds(0, 800, 0, 100), 600, false),
            ScissorRect {
                xmin: 0,
                ymin: 500,
                xmax: 799,
                ymax: 599,
            }
        );
    }

    #[test]
    fn offscreen_scissor_keeps_y() {
        assert_eq!(
            hw_scissor(&bounds(0, 800, 0, 100), 600, true),
            ScissorRect {
                xmin: 0,
                ymin: 0,
                xmax: 799,
                ymax: 99,
            }
        );
    }

    #[test]
    fn degenerate_scissor_emits_sentinel() {
        assert_eq!(hw_scissor(&bounds(10, 10, 0, 50), 600, false), ScissorRect::NOTHING);
        assert_eq!(hw_scissor(&bounds(0, 50, 7, 7), 600, true), ScissorRect::NOTHING);
    }

    #[test]
    fn scissor_coordinates_clamp_into_u16() {
        let rect = hw_scissor(&bounds(-5, 70_000, 0, 10), 10, true);
        assert_eq!((rect.xmin, rect.xmax), (0, u16::MAX));
    }

    #[test]
    fn window_viewport_inverts_y() {
        let snapshot = StateSnapshot::new(DrawTarget::window(800, 600));
        let block = compile_sf_viewport(&snapshot);
        assert_eq!(block.m00, 400.0);
        assert_eq!(block.m11, -300.0);
        assert_eq!(block.m31, -300.0 + 600.0);
        assert_eq!((block.m22, block.m32), (0.5, 0.5));
    }

    #[test]
    #[should_panic(expected = "without a draw target attachment")]
    fn missing_attachment_is_fatal() {
        let mut target = DrawTarget::offscreen(64, 64);
        target.has_attachments = false;
        compile_sf_viewport(&StateSnapshot::new(target));
    }
}
