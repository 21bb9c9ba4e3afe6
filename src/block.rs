// Delta-encoded block packing for sorted RVA records
use crate::constants::{BLOCK_HEADER_SIZE, BLOCK_RECORD_SIZE};
use crate::rva::RvaRecord;
use rayon::prelude::*;

/// One record inside a packed block: the RVA delta from the previous
/// record (zero for the first) and the absolute mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub addr_delta: u32,
    pub value: u32,
}

/// A capacity-bounded run of RVA records with delta-encoded addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RvaBlock {
    pub start_rva: u64,
    pub start_value: u32,
    pub records: Vec<BlockRecord>,
}

impl RvaBlock {
    fn open(record: RvaRecord) -> Self {
        RvaBlock {
            start_rva: record.rva,
            start_value: record.dump_offset,
            records: vec![BlockRecord {
                addr_delta: 0,
                value: record.dump_offset,
            }],
        }
    }

    /// On-disk size of this block in the IDX2 file.
    pub fn byte_size(&self) -> u32 {
        BLOCK_HEADER_SIZE + BLOCK_RECORD_SIZE * self.records.len() as u32
    }
}

/// Sort records by `(rva, dump_offset)` and greedily pack them into
/// blocks of at most `max_records_per_block` records.
///
/// A block also closes early when the delta to the next record would not
/// fit in 32 bits; the overflowing record opens the next block. Duplicate
/// records are preserved.
pub fn build_blocks(mut records: Vec<RvaRecord>, max_records_per_block: usize) -> Vec<RvaBlock> {
    debug_assert!(max_records_per_block >= 1);

    records.par_sort_unstable_by_key(|r| (r.rva, r.dump_offset));

    let mut blocks: Vec<RvaBlock> = Vec::new();
    let mut current: Option<RvaBlock> = None;
    let mut last_rva = 0u64;

    for record in records {
        let fits = current.as_ref().is_some_and(|block| {
            block.records.len() < max_records_per_block
                && record.rva - last_rva <= u32::MAX as u64
        });
        if fits {
            let block = current.as_mut().unwrap();
            block.records.push(BlockRecord {
                addr_delta: (record.rva - last_rva) as u32,
                value: record.dump_offset,
            });
        } else {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(RvaBlock::open(record));
        }
        last_rva = record.rva;
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }

    blocks
}
