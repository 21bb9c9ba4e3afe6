// Inspect command - header summaries of the companion index files
use super::utils;
use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Args;
use dumpidx::constants;
use dumpidx::index_format;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Args)]
#[command(
    about = "Show header summaries of a dump's companion indexes",
    long_about = "Read the headers of the RVA index pair and the definition/type
companions next to a dump and print what they contain: versions, entry
and block counts, and the staleness metadata recorded by the definition
builders. Missing companions are reported as absent, not as errors."
)]
pub struct InspectCommand {
    /// Dump file whose companions should be inspected
    pub dump: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RvaIndexReport {
    version: u16,
    entries: usize,
    blocks: u32,
    total_dump_lines: u32,
    first_rva: Option<u64>,
    last_rva: Option<u64>,
}

#[derive(Serialize)]
struct DefsReport {
    format: String,
    dump_size: u64,
    dump_mtime: u64,
    entries: usize,
}

#[derive(Serialize)]
struct CompanionReport {
    dump_size: u32,
    dump_mtime: u32,
    count: u32,
}

#[derive(Serialize)]
struct InspectReport {
    rva_index: Option<RvaIndexReport>,
    definitions: Option<DefsReport>,
    namespaces: Option<CompanionReport>,
    types: Option<CompanionReport>,
}

pub fn run(cmd: InspectCommand) -> Result<()> {
    let report = InspectReport {
        rva_index: read_rva_index(&cmd.dump)?,
        definitions: read_defs(&utils::companion_path(&cmd.dump, constants::DEFS_FILE_SUFFIX))?,
        namespaces: read_companion(
            &utils::companion_path(&cmd.dump, constants::NAMESPACE_FILE_SUFFIX),
            constants::NAMESPACE_INDEX_MAGIC,
        )?,
        types: read_companion(
            &utils::companion_path(&cmd.dump, constants::TYPE_FILE_SUFFIX),
            constants::TYPE_INDEX_MAGIC,
        )?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report.rva_index {
        Some(idx) => {
            println!("RVA index:        v{}, {} blocks, {} dump lines", idx.version, idx.blocks, idx.total_dump_lines);
            if let (Some(first), Some(last)) = (idx.first_rva, idx.last_rva) {
                println!("  RVA range:      0x{:X} - 0x{:X}", first, last);
            }
        }
        None => println!("RVA index:        absent"),
    }
    match &report.definitions {
        Some(defs) => println!(
            "Definition cache: {} entries ({}, dump {} bytes, modified {})",
            defs.entries,
            defs.format,
            defs.dump_size,
            format_mtime(defs.dump_mtime)
        ),
        None => println!("Definition cache: absent"),
    }
    match &report.namespaces {
        Some(ns) => println!("Namespace index:  {} offsets (modified {})", ns.count, format_mtime(ns.dump_mtime as u64)),
        None => println!("Namespace index:  absent"),
    }
    match &report.types {
        Some(types) => println!("Type index:       {} types (modified {})", types.count, format_mtime(types.dump_mtime as u64)),
        None => println!("Type index:       absent"),
    }

    Ok(())
}

fn format_mtime(mtime: u64) -> String {
    DateTime::from_timestamp(mtime as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| mtime.to_string())
}

fn read_rva_index(dump: &Path) -> Result<Option<RvaIndexReport>> {
    let index1_path = utils::index1_path(dump);
    let index2_path = utils::index2_path(dump);
    if !index1_path.exists() || !index2_path.exists() {
        return Ok(None);
    }

    let index1_file = File::open(&index1_path)
        .with_context(|| format!("Failed to open {}", index1_path.display()))?;
    let (version, entries) = index_format::read_index1(&mut BufReader::new(index1_file))?;

    let mut index2_file = File::open(&index2_path)
        .with_context(|| format!("Failed to open {}", index2_path.display()))?;
    let header = index_format::read_index2_header(&mut index2_file)?;

    Ok(Some(RvaIndexReport {
        version,
        entries: entries.len(),
        blocks: header.block_count,
        total_dump_lines: header.total_dump_lines,
        first_rva: entries.first().map(|e| e.start_rva),
        last_rva: entries.last().map(|e| e.start_rva),
    }))
}

fn read_defs(path: &Path) -> Result<Option<DefsReport>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader
        .read_line(&mut header)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut fields = header.trim_end().split('\t');
    let format = fields.next().unwrap_or("").to_string();
    let dump_size = u64::from_str_radix(fields.next().unwrap_or(""), 16).unwrap_or(0);
    let dump_mtime = u64::from_str_radix(fields.next().unwrap_or(""), 16).unwrap_or(0);

    let entries = reader.lines().map_while(|l| l.ok()).count();

    Ok(Some(DefsReport {
        format,
        dump_size,
        dump_mtime,
        entries,
    }))
}

fn read_companion(path: &Path, expected_magic: u32) -> Result<Option<CompanionReport>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut header = [0u8; 16];
    file.read_exact(&mut header)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;

    let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
    if magic != expected_magic {
        anyhow::bail!(
            "{}: magic mismatch (expected 0x{:08X}, got 0x{:08X})",
            path.display(),
            expected_magic,
            magic
        );
    }

    Ok(Some(CompanionReport {
        dump_size: u32::from_le_bytes(header[4..8].try_into().unwrap()),
        dump_mtime: u32::from_le_bytes(header[8..12].try_into().unwrap()),
        count: u32::from_le_bytes(header[12..16].try_into().unwrap()),
    }))
}
