use aero_gen4_batch::{
    apply_relocations, GemDomains, RecordingSubmitter, RelocTarget, Relocation, StateBatch,
    StateBatchDescriptor,
};
use pretty_assertions::assert_eq;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TwoDwords {
    pointer: u32,
    flags: u32,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn submitted_segment_patches_to_final_addresses() {
    let submitter = RecordingSubmitter::auto_retiring();
    let mut batch = StateBatch::new(
        StateBatchDescriptor {
            label: Some("patch test"),
            segment_size: 4096,
            segment_count: 2,
        },
        Box::new(submitter.clone()),
    )
    .unwrap();

    let pointee = batch.state_alloc(32, 32).unwrap();
    let block = batch.state_alloc(8, 64).unwrap();
    assert_eq!((pointee, block), (0, 64));

    // Presumed address is 0 before the segment was ever placed.
    let delta = pointee | 0b10;
    batch
        .write_pod(
            block,
            &TwoDwords {
                pointer: batch.presumed_address() as u32 + delta,
                flags: 0xCAFE,
            },
        )
        .unwrap();
    batch.emit_reloc(Relocation {
        offset: block,
        target: RelocTarget::StateBatch,
        delta,
        read_domains: GemDomains::INSTRUCTION,
        write_domain: GemDomains::empty(),
    });

    batch.flush().unwrap();

    let submissions = submitter.submissions();
    assert_eq!(submissions.len(), 1);
    let mut bytes = submissions[0].bytes.clone();
    assert_eq!(read_u32(&bytes, 64), 0b10);

    apply_relocations(&mut bytes, &submissions[0].relocations, |target| match target {
        RelocTarget::StateBatch => Some(0x0004_0000),
        RelocTarget::ProgramCache => None,
    })
    .unwrap();
    assert_eq!(read_u32(&bytes, 64), 0x0004_0002);
    assert_eq!(read_u32(&bytes, 68), 0xCAFE);
}
