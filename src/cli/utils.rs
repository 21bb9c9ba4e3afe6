// Shared helpers for CLI commands
use anyhow::{Context, Result};
use dumpidx::constants;
use std::path::{Path, PathBuf};

/// Default companion path for a dump: the dump file name with `suffix`
/// appended (e.g. `dump.cs` -> `dump.cs.rvaidx1`).
pub fn companion_path(dump: &Path, suffix: &str) -> PathBuf {
    let mut name = dump
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dump".to_string());
    name.push('.');
    name.push_str(suffix);
    dump.with_file_name(name)
}

pub fn index1_path(dump: &Path) -> PathBuf {
    companion_path(dump, constants::INDEX1_FILE_SUFFIX)
}

pub fn index2_path(dump: &Path) -> PathBuf {
    companion_path(dump, constants::INDEX2_FILE_SUFFIX)
}

/// Sibling temp path used for atomic writes (write temp, rename over
/// the target on success).
pub fn temp_path(target: &Path) -> PathBuf {
    target
        .file_name()
        .map(|name| target.with_file_name(format!("{}.tmp", name.to_string_lossy())))
        .unwrap_or_else(|| target.with_extension("tmp"))
}

pub fn commit_temp(temp: &Path, target: &Path) -> Result<()> {
    std::fs::rename(temp, target)
        .with_context(|| format!("Failed to replace {}", target.display()))
}

/// Parse an RVA argument: hex with an `0x` prefix, otherwise decimal.
pub fn parse_rva(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).with_context(|| format!("Invalid hex RVA: {}", input))
    } else {
        trimmed
            .parse::<u64>()
            .with_context(|| format!("Invalid RVA: {}", input))
    }
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let mut count = 0;

    for c in s.chars().rev() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
        count += 1;
    }

    result.chars().rev().collect()
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
