// Floor lookup over the two-file RVA index
use crate::constants::BLOCK_HEADER_SIZE;
use crate::index_format::{self, DecodedBlock, Index1Entry};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Queries an IDX1/IDX2 pair for the mapped value at the greatest indexed
/// RVA `<=` a query RVA.
///
/// The routing table is held in memory; blocks are read from the IDX2
/// file lazily, one at a time, with the most recently decoded block kept
/// in a single-slot cache. Queries take `&mut self` because they move the
/// IDX2 file cursor and replace the cached block; callers that want
/// parallel queries open one lookup per thread or add external locking.
///
/// For v1/v2 indexes the mapped values are 1-based dump line numbers, for
/// v3 they are 0-based dump byte offsets.
#[derive(Debug)]
pub struct RvaIndexLookup {
    entries: Vec<Index1Entry>,
    total_dump_lines: u32,
    index2: File,
    cached_block_index: Option<usize>,
    cached_block: DecodedBlock,
}

impl RvaIndexLookup {
    /// Load both index files, validating headers, routing order, and the
    /// entry/block count cross-check. An empty index loads successfully;
    /// every lookup on it returns `Ok(None)`.
    pub fn load(index1_path: &Path, index2_path: &Path) -> Result<Self> {
        let index1_file = File::open(index1_path)
            .with_context(|| format!("Failed to open index1 file {}", index1_path.display()))?;
        let (_, entries) = index_format::read_index1(&mut BufReader::new(index1_file))?;

        let mut index2 = File::open(index2_path)
            .with_context(|| format!("Failed to open index2 file {}", index2_path.display()))?;
        let header = index_format::read_index2_header(&mut index2)?;

        if header.block_count as usize != entries.len() {
            anyhow::bail!(
                "index1 entry count ({}) does not match index2 block count ({})",
                entries.len(),
                header.block_count
            );
        }

        Ok(RvaIndexLookup {
            entries,
            total_dump_lines: header.total_dump_lines,
            index2,
            cached_block_index: None,
            cached_block: DecodedBlock::default(),
        })
    }

    /// Line count of the dump the index was built from (zero for v1
    /// indexes, which do not record it).
    pub fn total_dump_lines(&self) -> u32 {
        self.total_dump_lines
    }

    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    /// Floor lookup: the value mapped at the greatest indexed RVA
    /// `<= query_rva`, or `Ok(None)` when every indexed RVA is above the
    /// query (or the index is empty). Corrupt blocks surface as `Err`;
    /// an error never evicts an already-cached block.
    pub fn find_closest_lower_or_equal(&mut self, query_rva: u64) -> Result<Option<u32>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        if query_rva < self.entries[0].start_rva {
            return Ok(None);
        }

        let block_index = self.entries.partition_point(|e| e.start_rva <= query_rva) - 1;

        {
            let block = self.decoded_block(block_index)?;
            if let Some(i) = floor_index(&block.rvas, query_rva) {
                return Ok(Some(block.values[i]));
            }
        }

        // Routing can select a block whose first decoded RVA already sits
        // above the query (non-zero first delta); the previous block's
        // last record is then the floor.
        if block_index == 0 {
            return Ok(None);
        }
        let previous = self.decoded_block(block_index - 1)?;
        Ok(previous.values.last().copied())
    }

    fn decoded_block(&mut self, block_index: usize) -> Result<&DecodedBlock> {
        if self.cached_block_index == Some(block_index) {
            return Ok(&self.cached_block);
        }

        let entry = self.entries[block_index];
        if entry.block_size < BLOCK_HEADER_SIZE {
            anyhow::bail!(
                "Corrupt block {}: size {} smaller than block header",
                block_index,
                entry.block_size
            );
        }

        let mut buf = vec![0u8; entry.block_size as usize];
        self.index2
            .seek(SeekFrom::Start(entry.block_offset))
            .with_context(|| format!("Failed seeking to index2 block {}", block_index))?;
        self.index2
            .read_exact(&mut buf)
            .with_context(|| format!("Failed reading index2 block {}", block_index))?;

        let decoded = index_format::decode_block(&buf)
            .with_context(|| format!("Failed decoding index2 block {}", block_index))?;

        self.cached_block = decoded;
        self.cached_block_index = Some(block_index);
        Ok(&self.cached_block)
    }
}

/// Index of the greatest element `<= query` in a sorted slice.
fn floor_index(rvas: &[u64], query: u64) -> Option<usize> {
    let upper = rvas.partition_point(|&rva| rva <= query);
    upper.checked_sub(1)
}
