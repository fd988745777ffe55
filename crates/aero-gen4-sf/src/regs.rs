//! Hardware layouts of the SF viewport and SF unit state blocks.
//!
//! Both blocks are little-endian, fixed size, and read by the GPU straight out of the
//! state batch. Unit state dwords are bit-packed; every field is described by a
//! [`BitField`] so packing and decoding share one table.

use core::mem::offset_of;

#[cfg(target_endian = "big")]
compile_error!("Gen4 state blocks are written with native byte order and require a little-endian host");

/// A `width`-bit field starting at bit `shift` of a dword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub shift: u32,
    pub width: u32,
}

impl BitField {
    pub const fn new(shift: u32, width: u32) -> Self {
        assert!(width > 0 && shift + width <= 32);
        Self { shift, width }
    }

    /// Largest value the field can hold.
    pub const fn max(self) -> u32 {
        if self.width == 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    pub const fn mask(self) -> u32 {
        self.max() << self.shift
    }

    /// Replace the field in `dword` with `value`.
    ///
    /// Values wider than the field are truncated like a C bit-field store; callers are
    /// expected to range-check first.
    pub fn insert(self, dword: u32, value: u32) -> u32 {
        debug_assert!(
            value <= self.max(),
            "value {value:#x} overflows {}-bit field at bit {}",
            self.width,
            self.shift
        );
        (dword & !self.mask()) | ((value << self.shift) & self.mask())
    }

    pub const fn extract(self, dword: u32) -> u32 {
        (dword & self.mask()) >> self.shift
    }
}

pub mod thread0 {
    use super::BitField;
    pub const GRF_REG_COUNT: BitField = BitField::new(1, 3);
    pub const KERNEL_START_POINTER: BitField = BitField::new(6, 26);
}

pub mod thread1 {
    use super::BitField;
    pub const FLOATING_POINT_MODE: BitField = BitField::new(16, 1);
    pub const BINDING_TABLE_ENTRY_COUNT: BitField = BitField::new(18, 8);
    pub const SINGLE_PROGRAM_FLOW: BitField = BitField::new(31, 1);
}

pub mod thread2 {
    use super::BitField;
    pub const PER_THREAD_SCRATCH_SPACE: BitField = BitField::new(0, 4);
    pub const SCRATCH_SPACE_BASE_POINTER: BitField = BitField::new(10, 22);
}

pub mod thread3 {
    use super::BitField;
    pub const DISPATCH_GRF_START_REG: BitField = BitField::new(0, 4);
    pub const URB_ENTRY_READ_OFFSET: BitField = BitField::new(4, 6);
    pub const URB_ENTRY_READ_LENGTH: BitField = BitField::new(11, 6);
    pub const CONST_URB_ENTRY_READ_OFFSET: BitField = BitField::new(18, 6);
    pub const CONST_URB_ENTRY_READ_LENGTH: BitField = BitField::new(25, 6);
}

pub mod thread4 {
    use super::BitField;
    pub const STATS_ENABLE: BitField = BitField::new(10, 1);
    pub const NR_URB_ENTRIES: BitField = BitField::new(11, 7);
    pub const URB_ENTRY_ALLOCATION_SIZE: BitField = BitField::new(19, 5);
    pub const MAX_THREADS: BitField = BitField::new(25, 6);
}

pub mod sf5 {
    use super::BitField;
    pub const FRONT_WINDING: BitField = BitField::new(0, 1);
    pub const VIEWPORT_TRANSFORM: BitField = BitField::new(1, 1);
    pub const SF_VIEWPORT_STATE_OFFSET: BitField = BitField::new(5, 27);
}

pub mod sf6 {
    use super::BitField;
    pub const DEST_ORG_VBIAS: BitField = BitField::new(9, 4);
    pub const DEST_ORG_HBIAS: BitField = BitField::new(13, 4);
    pub const SCISSOR: BitField = BitField::new(17, 1);
    pub const DISABLE_2X2_TRIFILTER: BitField = BitField::new(18, 1);
    pub const DISABLE_ZERO_PIX_TRIFILTER: BitField = BitField::new(19, 1);
    pub const POINT_RAST_RULE: BitField = BitField::new(20, 2);
    pub const LINE_ENDCAP_AA_REGION_WIDTH: BitField = BitField::new(22, 2);
    pub const LINE_WIDTH: BitField = BitField::new(24, 4);
    pub const FAST_SCISSOR_DISABLE: BitField = BitField::new(28, 1);
    pub const CULL_MODE: BitField = BitField::new(29, 2);
    pub const AA_ENABLE: BitField = BitField::new(31, 1);
}

pub mod sf7 {
    use super::BitField;
    pub const POINT_SIZE: BitField = BitField::new(0, 11);
    pub const USE_POINT_SIZE_STATE: BitField = BitField::new(11, 1);
    pub const SUBPIXEL_PRECISION: BitField = BitField::new(12, 1);
    pub const SPRITE_POINT: BitField = BitField::new(13, 1);
    pub const AA_LINE_DISTANCE_MODE: BitField = BitField::new(24, 1);
    pub const TRIFAN_PV: BitField = BitField::new(25, 2);
    pub const LINESTRIP_PV: BitField = BitField::new(27, 2);
    pub const TRISTRIP_PV: BitField = BitField::new(29, 2);
    pub const LINE_LAST_PIXEL_ENABLE: BitField = BitField::new(31, 1);
}

pub const FLOATING_POINT_IEEE_754: u32 = 0;
pub const FLOATING_POINT_NON_IEEE_754: u32 = 1;

/// URB row the SF kernel starts reading vertex data from.
pub const SF_URB_ENTRY_READ_OFFSET: u32 = 1;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontWinding {
    #[default]
    Cw = 0,
    Ccw = 1,
}

impl FrontWinding {
    pub const fn from_u32(v: u32) -> Self {
        match v & 1 {
            0 => FrontWinding::Cw,
            _ => FrontWinding::Ccw,
        }
    }

    /// The opposite winding when `flip` is set.
    pub const fn flipped_if(self, flip: bool) -> Self {
        Self::from_u32(self as u32 ^ flip as u32)
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Both = 0,
    None = 1,
    Front = 2,
    Back = 3,
}

impl CullMode {
    pub const fn from_u32(v: u32) -> Self {
        match v & 3 {
            0 => CullMode::Both,
            1 => CullMode::None,
            2 => CullMode::Front,
            _ => CullMode::Back,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointRastRule {
    #[default]
    UpperLeft = 0,
    UpperRight = 1,
    /// Listed as reserved in the hardware documentation.
    LowerLeft = 2,
    /// Listed as reserved in the hardware documentation.
    LowerRight = 3,
}

impl PointRastRule {
    pub const fn from_u32(v: u32) -> Self {
        match v & 3 {
            0 => PointRastRule::UpperLeft,
            1 => PointRastRule::UpperRight,
            2 => PointRastRule::LowerLeft,
            _ => PointRastRule::LowerRight,
        }
    }
}

/// Inclusive scissor rectangle, Y=0 at the top.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScissorRect {
    pub xmin: u16,
    pub ymin: u16,
    pub xmax: u16,
    pub ymax: u16,
}

impl ScissorRect {
    /// `min > max` on both axes: nothing passes.
    pub const NOTHING: Self = Self {
        xmin: 1,
        ymin: 1,
        xmax: 0,
        ymax: 0,
    };
}

/// SF viewport state: the relevant entries of the viewport matrix plus the scissor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SfViewport {
    pub m00: f32,
    pub m11: f32,
    pub m22: f32,
    pub m30: f32,
    pub m31: f32,
    pub m32: f32,
    pub scissor: ScissorRect,
}

impl SfViewport {
    pub const SIZE_BYTES: usize = 32;
    /// The unit state stores the pointer in 32-byte units.
    pub const ALIGNMENT: u32 = 32;
}

/// SF unit state as the hardware reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SfUnitState {
    pub thread0: u32,
    pub thread1: u32,
    pub thread2: u32,
    pub thread3: u32,
    pub thread4: u32,
    pub sf5: u32,
    pub sf6: u32,
    pub sf7: u32,
}

impl SfUnitState {
    pub const SIZE_BYTES: usize = 32;
    pub const ALIGNMENT: u32 = 64;
    pub const THREAD0_OFFSET: u32 = offset_of!(SfUnitState, thread0) as u32;
    pub const SF5_OFFSET: u32 = offset_of!(SfUnitState, sf5) as u32;

    pub fn decode(&self) -> SfUnitFields {
        SfUnitFields {
            grf_reg_count: thread0::GRF_REG_COUNT.extract(self.thread0),
            kernel_start_pointer: thread0::KERNEL_START_POINTER.extract(self.thread0),

            floating_point_mode: thread1::FLOATING_POINT_MODE.extract(self.thread1),
            binding_table_entry_count: thread1::BINDING_TABLE_ENTRY_COUNT.extract(self.thread1),
            single_program_flow: thread1::SINGLE_PROGRAM_FLOW.extract(self.thread1) != 0,

            per_thread_scratch_space: thread2::PER_THREAD_SCRATCH_SPACE.extract(self.thread2),
            scratch_space_base_pointer: thread2::SCRATCH_SPACE_BASE_POINTER.extract(self.thread2),

            dispatch_grf_start_reg: thread3::DISPATCH_GRF_START_REG.extract(self.thread3),
            urb_entry_read_offset: thread3::URB_ENTRY_READ_OFFSET.extract(self.thread3),
            urb_entry_read_length: thread3::URB_ENTRY_READ_LENGTH.extract(self.thread3),
            const_urb_entry_read_offset: thread3::CONST_URB_ENTRY_READ_OFFSET.extract(self.thread3),
            const_urb_entry_read_length: thread3::CONST_URB_ENTRY_READ_LENGTH.extract(self.thread3),

            stats_enable: thread4::STATS_ENABLE.extract(self.thread4) != 0,
            nr_urb_entries: thread4::NR_URB_ENTRIES.extract(self.thread4),
            urb_entry_allocation_size: thread4::URB_ENTRY_ALLOCATION_SIZE.extract(self.thread4),
            max_threads: thread4::MAX_THREADS.extract(self.thread4),

            front_winding: FrontWinding::from_u32(sf5::FRONT_WINDING.extract(self.sf5)),
            viewport_transform: sf5::VIEWPORT_TRANSFORM.extract(self.sf5) != 0,
            sf_viewport_state_offset: sf5::SF_VIEWPORT_STATE_OFFSET.extract(self.sf5),

            dest_org_vbias: sf6::DEST_ORG_VBIAS.extract(self.sf6),
            dest_org_hbias: sf6::DEST_ORG_HBIAS.extract(self.sf6),
            scissor: sf6::SCISSOR.extract(self.sf6) != 0,
            disable_2x2_trifilter: sf6::DISABLE_2X2_TRIFILTER.extract(self.sf6) != 0,
            disable_zero_pix_trifilter: sf6::DISABLE_ZERO_PIX_TRIFILTER.extract(self.sf6) != 0,
            point_rast_rule: PointRastRule::from_u32(sf6::POINT_RAST_RULE.extract(self.sf6)),
            line_endcap_aa_region_width: sf6::LINE_ENDCAP_AA_REGION_WIDTH.extract(self.sf6),
            line_width: sf6::LINE_WIDTH.extract(self.sf6),
            fast_scissor_disable: sf6::FAST_SCISSOR_DISABLE.extract(self.sf6) != 0,
            cull_mode: CullMode::from_u32(sf6::CULL_MODE.extract(self.sf6)),
            aa_enable: sf6::AA_ENABLE.extract(self.sf6) != 0,

            point_size: sf7::POINT_SIZE.extract(self.sf7),
            use_point_size_state: sf7::USE_POINT_SIZE_STATE.extract(self.sf7) != 0,
            subpixel_precision: sf7::SUBPIXEL_PRECISION.extract(self.sf7),
            sprite_point: sf7::SPRITE_POINT.extract(self.sf7) != 0,
            aa_line_distance_mode: sf7::AA_LINE_DISTANCE_MODE.extract(self.sf7),
            trifan_pv: sf7::TRIFAN_PV.extract(self.sf7),
            linestrip_pv: sf7::LINESTRIP_PV.extract(self.sf7),
            tristrip_pv: sf7::TRISTRIP_PV.extract(self.sf7),
            line_last_pixel_enable: sf7::LINE_LAST_PIXEL_ENABLE.extract(self.sf7) != 0,
        }
    }
}

/// Unpacked view of [`SfUnitState`]. `Default` is the all-zero block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfUnitFields {
    pub grf_reg_count: u32,
    /// Kernel address in 64-byte units.
    pub kernel_start_pointer: u32,

    pub floating_point_mode: u32,
    pub binding_table_entry_count: u32,
    pub single_program_flow: bool,

    pub per_thread_scratch_space: u32,
    pub scratch_space_base_pointer: u32,

    pub dispatch_grf_start_reg: u32,
    pub urb_entry_read_offset: u32,
    pub urb_entry_read_length: u32,
    pub const_urb_entry_read_offset: u32,
    pub const_urb_entry_read_length: u32,

    pub stats_enable: bool,
    pub nr_urb_entries: u32,
    pub urb_entry_allocation_size: u32,
    /// Thread count minus one.
    pub max_threads: u32,

    pub front_winding: FrontWinding,
    pub viewport_transform: bool,
    /// SF viewport address in 32-byte units.
    pub sf_viewport_state_offset: u32,

    /// Rasterization origin bias, U0.4 pixels.
    pub dest_org_vbias: u32,
    pub dest_org_hbias: u32,
    pub scissor: bool,
    pub disable_2x2_trifilter: bool,
    pub disable_zero_pix_trifilter: bool,
    pub point_rast_rule: PointRastRule,
    pub line_endcap_aa_region_width: u32,
    /// U3.1 pixels; 0 selects the default one-pixel line.
    pub line_width: u32,
    pub fast_scissor_disable: bool,
    pub cull_mode: CullMode,
    pub aa_enable: bool,

    /// U8.3 pixels.
    pub point_size: u32,
    pub use_point_size_state: bool,
    pub subpixel_precision: u32,
    pub sprite_point: bool,
    pub aa_line_distance_mode: u32,
    pub trifan_pv: u32,
    pub linestrip_pv: u32,
    pub tristrip_pv: u32,
    pub line_last_pixel_enable: bool,
}

impl SfUnitFields {
    pub fn pack(&self) -> SfUnitState {
        let mut s = SfUnitState::default();

        s.thread0 = thread0::GRF_REG_COUNT.insert(s.thread0, self.grf_reg_count);
        s.thread0 = thread0::KERNEL_START_POINTER.insert(s.thread0, self.kernel_start_pointer);

        s.thread1 = thread1::FLOATING_POINT_MODE.insert(s.thread1, self.floating_point_mode);
        s.thread1 =
            thread1::BINDING_TABLE_ENTRY_COUNT.insert(s.thread1, self.binding_table_entry_count);
        s.thread1 = thread1::SINGLE_PROGRAM_FLOW.insert(s.thread1, self.single_program_flow as u32);

        s.thread2 =
            thread2::PER_THREAD_SCRATCH_SPACE.insert(s.thread2, self.per_thread_scratch_space);
        s.thread2 =
            thread2::SCRATCH_SPACE_BASE_POINTER.insert(s.thread2, self.scratch_space_base_pointer);

        s.thread3 = thread3::DISPATCH_GRF_START_REG.insert(s.thread3, self.dispatch_grf_start_reg);
        s.thread3 = thread3::URB_ENTRY_READ_OFFSET.insert(s.thread3, self.urb_entry_read_offset);
        s.thread3 = thread3::URB_ENTRY_READ_LENGTH.insert(s.thread3, self.urb_entry_read_length);
        s.thread3 = thread3::CONST_URB_ENTRY_READ_OFFSET
            .insert(s.thread3, self.const_urb_entry_read_offset);
        s.thread3 = thread3::CONST_URB_ENTRY_READ_LENGTH
            .insert(s.thread3, self.const_urb_entry_read_length);

        s.thread4 = thread4::STATS_ENABLE.insert(s.thread4, self.stats_enable as u32);
        s.thread4 = thread4::NR_URB_ENTRIES.insert(s.thread4, self.nr_urb_entries);
        s.thread4 =
            thread4::URB_ENTRY_ALLOCATION_SIZE.insert(s.thread4, self.urb_entry_allocation_size);
        s.thread4 = thread4::MAX_THREADS.insert(s.thread4, self.max_threads);

        s.sf5 = sf5::FRONT_WINDING.insert(s.sf5, self.front_winding as u32);
        s.sf5 = sf5::VIEWPORT_TRANSFORM.insert(s.sf5, self.viewport_transform as u32);
        s.sf5 = sf5::SF_VIEWPORT_STATE_OFFSET.insert(s.sf5, self.sf_viewport_state_offset);

        s.sf6 = sf6::DEST_ORG_VBIAS.insert(s.sf6, self.dest_org_vbias);
        s.sf6 = sf6::DEST_ORG_HBIAS.insert(s.sf6, self.dest_org_hbias);
        s.sf6 = sf6::SCISSOR.insert(s.sf6, self.scissor as u32);
        s.sf6 = sf6::DISABLE_2X2_TRIFILTER.insert(s.sf6, self.disable_2x2_trifilter as u32);
        s.sf6 =
            sf6::DISABLE_ZERO_PIX_TRIFILTER.insert(s.sf6, self.disable_zero_pix_trifilter as u32);
        s.sf6 = sf6::POINT_RAST_RULE.insert(s.sf6, self.point_rast_rule as u32);
        s.sf6 =
            sf6::LINE_ENDCAP_AA_REGION_WIDTH.insert(s.sf6, self.line_endcap_aa_region_width);
        s.sf6 = sf6::LINE_WIDTH.insert(s.sf6, self.line_width);
        s.sf6 = sf6::FAST_SCISSOR_DISABLE.insert(s.sf6, self.fast_scissor_disable as u32);
        s.sf6 = sf6::CULL_MODE.insert(s.sf6, self.cull_mode as u32);
        s.sf6 = sf6::AA_ENABLE.insert(s.sf6, self.aa_enable as u32);

        s.sf7 = sf7::POINT_SIZE.insert(s.sf7, self.point_size);
        s.sf7 = sf7::USE_POINT_SIZE_STATE.insert(s.sf7, self.use_point_size_state as u32);
        s.sf7 = sf7::SUBPIXEL_PRECISION.insert(s.sf7, self.subpixel_precision);
        s.sf7 = sf7::SPRITE_POINT.insert(s.sf7, self.sprite_point as u32);
        s.sf7 = sf7::AA_LINE_DISTANCE_MODE.insert(s.sf7, self.aa_line_distance_mode);
        s.sf7 = sf7::TRIFAN_PV.insert(s.sf7, self.trifan_pv);
        s.sf7 = sf7::LINESTRIP_PV.insert(s.sf7, self.linestrip_pv);
        s.sf7 = sf7::TRISTRIP_PV.insert(s.sf7, self.tristrip_pv);
        s.sf7 = sf7::LINE_LAST_PIXEL_ENABLE.insert(s.sf7, self.line_last_pixel_enable as u32);

        s
    }
}
