// src/index_format.rs
//! Two-file RVA index format: IDX1 routing table + IDX2 packed blocks
//!
//! Layout (all integers little-endian):
//! - IDX1: 12-byte header (magic "IDX1", version, reserved, entry count)
//!   followed by 24-byte routing entries (start RVA, block byte offset
//!   into IDX2, block byte size, reserved)
//! - IDX2: header (magic "IDX2", version, reserved, block count, and for
//!   v2/v3 total dump lines) followed by the packed blocks in routing
//!   order. Each block: start RVA (u64), start value (u32), record count
//!   (u32), then record count pairs of (addr delta u32, absolute value u32)
//!
//! v1/v2 map RVAs to 1-based dump line numbers, v3 to 0-based dump byte
//! offsets; the wire layout is identical and the value domain is the
//! caller's concern. The writer emits v3.

use crate::block::RvaBlock;
use crate::constants::{
    BLOCK_HEADER_SIZE, CURRENT_FORMAT_VERSION, FORMAT_VERSION_1, FORMAT_VERSION_2,
    FORMAT_VERSION_3, INDEX1_ENTRY_SIZE, INDEX1_MAGIC, INDEX2_HEADER_SIZE, INDEX2_MAGIC,
};
use anyhow::{Context, Result};
use std::io::{Read, Write};

/// One routing-table entry pointing at a packed block in the IDX2 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index1Entry {
    pub start_rva: u64,
    pub block_offset: u64,
    pub block_size: u32,
}

/// Parsed IDX2 header.
#[derive(Debug, Clone, Copy)]
pub struct Index2Header {
    pub version: u16,
    pub block_count: u32,
    pub total_dump_lines: u32,
}

/// A block decoded back into parallel `rvas`/`values` arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBlock {
    pub rvas: Vec<u64>,
    pub values: Vec<u32>,
}

fn supported_version(version: u16) -> bool {
    version == FORMAT_VERSION_1 || version == FORMAT_VERSION_2 || version == FORMAT_VERSION_3
}

/// Write the IDX2 file: header plus packed blocks, returning the routing
/// entries with the absolute byte offset of each block.
pub fn write_index2<W: Write>(
    writer: &mut W,
    blocks: &[RvaBlock],
    total_dump_lines: u32,
) -> Result<Vec<Index1Entry>> {
    writer.write_all(INDEX2_MAGIC)?;
    writer.write_all(&CURRENT_FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?;
    writer.write_all(&(blocks.len() as u32).to_le_bytes())?;
    writer.write_all(&total_dump_lines.to_le_bytes())?;

    let mut entries = Vec::with_capacity(blocks.len());
    let mut position = INDEX2_HEADER_SIZE as u64;

    for block in blocks {
        writer.write_all(&block.start_rva.to_le_bytes())?;
        writer.write_all(&block.start_value.to_le_bytes())?;
        writer.write_all(&(block.records.len() as u32).to_le_bytes())?;
        for record in &block.records {
            writer.write_all(&record.addr_delta.to_le_bytes())?;
            writer.write_all(&record.value.to_le_bytes())?;
        }

        let block_size = block.byte_size();
        entries.push(Index1Entry {
            start_rva: block.start_rva,
            block_offset: position,
            block_size,
        });
        position += block_size as u64;
    }

    Ok(entries)
}

/// Write the IDX1 routing table for entries collected by [`write_index2`].
pub fn write_index1<W: Write>(writer: &mut W, entries: &[Index1Entry]) -> Result<()> {
    writer.write_all(INDEX1_MAGIC)?;
    writer.write_all(&CURRENT_FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?;
    writer.write_all(&(entries.len() as u32).to_le_bytes())?;

    for entry in entries {
        writer.write_all(&entry.start_rva.to_le_bytes())?;
        writer.write_all(&entry.block_offset.to_le_bytes())?;
        writer.write_all(&entry.block_size.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
    }

    Ok(())
}

/// Read and validate the IDX1 file: magic, supported version, and routing
/// entries sorted by start RVA (non-decreasing).
pub fn read_index1<R: Read>(reader: &mut R) -> Result<(u16, Vec<Index1Entry>)> {
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .context("Failed to read index1 header")?;
    if &header[0..4] != INDEX1_MAGIC {
        anyhow::bail!("index1 magic mismatch (expected IDX1)");
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if !supported_version(version) {
        anyhow::bail!("Unsupported index1 version: {}", version);
    }
    let entry_count = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut buf = [0u8; INDEX1_ENTRY_SIZE];
    for _ in 0..entry_count {
        reader
            .read_exact(&mut buf)
            .context("Failed to read index1 entry")?;
        entries.push(Index1Entry {
            start_rva: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            block_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            block_size: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        });
    }

    if entries.windows(2).any(|w| w[1].start_rva < w[0].start_rva) {
        anyhow::bail!("index1 entries are not sorted by start RVA");
    }

    Ok((version, entries))
}

/// Read and validate the IDX2 header, leaving the reader positioned at
/// the first block.
pub fn read_index2_header<R: Read>(reader: &mut R) -> Result<Index2Header> {
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .context("Failed to read index2 header")?;
    if &header[0..4] != INDEX2_MAGIC {
        anyhow::bail!("index2 magic mismatch (expected IDX2)");
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if !supported_version(version) {
        anyhow::bail!("Unsupported index2 version: {}", version);
    }
    let block_count = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

    let total_dump_lines = if version >= FORMAT_VERSION_2 {
        let mut buf = [0u8; 4];
        reader
            .read_exact(&mut buf)
            .context("Failed to read index2 total_dump_lines")?;
        u32::from_le_bytes(buf)
    } else {
        0
    };

    Ok(Index2Header {
        version,
        block_count,
        total_dump_lines,
    })
}

/// Decode one block read from IDX2 into parallel `rvas`/`values` arrays.
///
/// The first record's delta is zero as written, but a non-zero value is
/// tolerated and added to the start RVA. A zero first absolute value
/// falls back to the block-header start value.
pub fn decode_block(buf: &[u8]) -> Result<DecodedBlock> {
    if buf.len() < BLOCK_HEADER_SIZE as usize {
        anyhow::bail!("Corrupt block: size smaller than block header");
    }

    let start_rva = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let start_value = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    let record_count = u32::from_le_bytes(buf[12..16].try_into().unwrap());

    let expected = 16u64 + record_count as u64 * 8;
    if expected != buf.len() as u64 {
        anyhow::bail!("Corrupt block: record count does not match block size");
    }

    let mut decoded = DecodedBlock {
        rvas: Vec::with_capacity(record_count as usize),
        values: Vec::with_capacity(record_count as usize),
    };

    let mut current_rva = start_rva;
    let mut off = 16;
    for i in 0..record_count {
        let addr_delta = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let value = u32::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
        off += 8;

        // wrapping add: an overflowing delta shows up as a decreasing
        // RVA and fails the sortedness check below
        if i == 0 {
            current_rva = start_rva.wrapping_add(addr_delta as u64);
            decoded.values.push(if value == 0 { start_value } else { value });
        } else {
            current_rva = current_rva.wrapping_add(addr_delta as u64);
            decoded.values.push(value);
        }
        decoded.rvas.push(current_rva);
    }

    if decoded.rvas.windows(2).any(|w| w[1] < w[0]) {
        anyhow::bail!("Corrupt block: RVAs are not sorted");
    }

    Ok(decoded)
}
