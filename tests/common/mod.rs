use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use dumpidx::{build_rva_index, BuildOptionsBuilder, BuildStats};

pub fn setup_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(anyhow::Error::from)
}

pub fn write_dump(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join("dump.cs");
    fs::write(&path, content)?;
    Ok(path)
}

#[allow(dead_code)]
pub fn index_paths(dump: &Path) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}.rvaidx1", dump.display())),
        PathBuf::from(format!("{}.rvaidx2", dump.display())),
    )
}

/// Build the index pair next to `dump` and return its paths and stats.
#[allow(dead_code)]
pub fn build_index(dump: &Path, max_records_per_block: usize) -> Result<(PathBuf, PathBuf, BuildStats)> {
    let (index1, index2) = index_paths(dump);
    let options = BuildOptionsBuilder::new()
        .max_records_per_block(max_records_per_block)
        .build();
    let stats = build_rva_index(dump, &index1, &index2, &options)?;
    Ok((index1, index2, stats))
}

/// A dump with one method-RVA line per entry, returning the content and
/// the line-start offset of each line.
#[allow(dead_code)]
pub fn method_dump(rvas: &[u64]) -> (String, Vec<u32>) {
    let mut content = String::new();
    let mut offsets = Vec::with_capacity(rvas.len());
    for rva in rvas {
        offsets.push(content.len() as u32);
        content.push_str(&format!("\t// RVA: 0x{:X} Offset: 0x0\n", rva));
    }
    (content, offsets)
}

#[allow(dead_code)]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

#[allow(dead_code)]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[allow(dead_code)]
pub fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}
