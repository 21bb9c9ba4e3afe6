// RVA index construction: scan the dump, extract records, write IDX1/IDX2
use crate::block;
use crate::index_format;
use crate::options::BuildOptions;
use crate::rva::{RvaExtractor, RvaRecord};
use crate::scanner::DumpScanner;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// How many lines between progress callbacks during the scan.
const PROGRESS_EVERY_LINES: u32 = 4096;

#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub total_lines: u32,
    pub records: usize,
    pub blocks: usize,
    pub index1_bytes: u64,
    pub index2_bytes: u64,
}

/// Build the two-file RVA index for `dump_path`.
///
/// IDX2 is written first so absolute block offsets can be collected for
/// the IDX1 routing table. Fails fast on the first error; partial output
/// may remain on disk (callers wanting atomicity write to temp paths and
/// rename).
pub fn build_rva_index(
    dump_path: &Path,
    index1_path: &Path,
    index2_path: &Path,
    options: &BuildOptions,
) -> Result<BuildStats> {
    build_rva_index_with_progress(dump_path, index1_path, index2_path, options, |_, _| {})
}

pub fn build_rva_index_with_progress<F>(
    dump_path: &Path,
    index1_path: &Path,
    index2_path: &Path,
    options: &BuildOptions,
    mut progress: F,
) -> Result<BuildStats>
where
    F: FnMut(u64, u64),
{
    if options.max_records_per_block == 0 {
        anyhow::bail!("max_records_per_block must be at least 1");
    }

    let total_start = Instant::now();
    let scanner = DumpScanner::open(dump_path)?;
    let dump_size = scanner.size() as u64;

    // Pass 1: collect (RVA, line offset) records
    let scan_start = Instant::now();
    let extractor = RvaExtractor::new();
    let mut records: Vec<RvaRecord> = Vec::new();
    let mut total_lines = 0u32;
    for line in scanner.lines() {
        total_lines += 1;
        if let Some(record) = extractor.extract(line) {
            records.push(record);
        }
        if total_lines % PROGRESS_EVERY_LINES == 0 {
            progress(line.offset as u64, dump_size);
        }
    }
    progress(dump_size, dump_size);
    let scan_duration = scan_start.elapsed();

    // Pass 2: sort and pack into delta-encoded blocks
    let pack_start = Instant::now();
    let record_count = records.len();
    let blocks = block::build_blocks(records, options.max_records_per_block);
    let pack_duration = pack_start.elapsed();

    // Pass 3: write IDX2 (collecting block offsets), then IDX1
    let write_start = Instant::now();
    let mut index2_writer = BufWriter::new(File::create(index2_path).with_context(|| {
        format!("Failed to create index2 file {}", index2_path.display())
    })?);
    let entries = index_format::write_index2(&mut index2_writer, &blocks, total_lines)?;
    index2_writer
        .flush()
        .with_context(|| format!("Failed to write index2 file {}", index2_path.display()))?;

    let mut index1_writer = BufWriter::new(File::create(index1_path).with_context(|| {
        format!("Failed to create index1 file {}", index1_path.display())
    })?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer
        .flush()
        .with_context(|| format!("Failed to write index1 file {}", index1_path.display()))?;
    let write_duration = write_start.elapsed();

    let stats = BuildStats {
        total_lines,
        records: record_count,
        blocks: blocks.len(),
        index1_bytes: (crate::constants::INDEX1_HEADER_SIZE
            + entries.len() * crate::constants::INDEX1_ENTRY_SIZE) as u64,
        index2_bytes: crate::constants::INDEX2_HEADER_SIZE as u64
            + entries.iter().map(|e| e.block_size as u64).sum::<u64>(),
    };

    log::debug!(
        "[RVA Index] Built {} blocks from {} records ({} lines) in {:.3}s (scan={:.3}s, pack={:.3}s, write={:.3}s)",
        stats.blocks,
        stats.records,
        stats.total_lines,
        total_start.elapsed().as_secs_f64(),
        scan_duration.as_secs_f64(),
        pack_duration.as_secs_f64(),
        write_duration.as_secs_f64(),
    );

    Ok(stats)
}
