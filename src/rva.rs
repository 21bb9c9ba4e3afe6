// RVA extraction from annotated dump lines
use crate::scanner::DumpLine;
use regex::bytes::Regex;

/// A method entry parsed from the dump: its Relative Virtual Address and
/// the byte offset of the line that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RvaRecord {
    pub rva: u64,
    pub dump_offset: u32,
}

/// Matches the two RVA annotation shapes the analyzer emits, anchored at
/// column 0:
///
/// 1. method comments:          `\t// RVA: 0x<HEX>`
/// 2. generic instantiations:   `\t|-RVA: 0x<HEX>`
///
/// The first pattern wins; at most one record per line. Lines without a
/// match are skipped, as are hex tokens too large for u64.
pub struct RvaExtractor {
    method_pattern: Regex,
    generic_pattern: Regex,
}

impl RvaExtractor {
    pub fn new() -> Self {
        RvaExtractor {
            method_pattern: Regex::new(r"^\t// RVA:\s*0x([0-9A-Fa-f]+)\b")
                .expect("Invalid regex pattern"),
            generic_pattern: Regex::new(r"^\t\|-RVA:\s*0x([0-9A-Fa-f]+)\b")
                .expect("Invalid regex pattern"),
        }
    }

    pub fn extract(&self, line: DumpLine<'_>) -> Option<RvaRecord> {
        let hex = self
            .method_pattern
            .captures(line.raw)
            .or_else(|| self.generic_pattern.captures(line.raw))?
            .get(1)?;
        let hex = std::str::from_utf8(hex.as_bytes()).ok()?;
        let rva = u64::from_str_radix(hex, 16).ok()?;
        Some(RvaRecord {
            rva,
            dump_offset: line.offset,
        })
    }
}

impl Default for RvaExtractor {
    fn default() -> Self {
        Self::new()
    }
}
