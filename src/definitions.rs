// src/definitions.rs
//! Companion indexes for type-name lookup: a text definition cache, a
//! binary namespace-offsets file, and a binary type index, all built from
//! the same dump scan.
//!
//! The recognizer is intentionally shallow (keyword + name token) and
//! will misread unusual formatter output such as multi-line type headers.
//! Consumers needing exact parses should get them from the analyzer.

use crate::constants::{DEFS_CACHE_FORMAT, NAMESPACE_INDEX_MAGIC, TYPE_INDEX_MAGIC};
use crate::scanner::{DumpLine, DumpScanner};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

const NAMESPACE_MARKER: &str = "// Namespace:";
const TYPEDEF_MARKER: &str = "TypeDefIndex:";
const TYPEDEF_COMMENT: &str = "// TypeDefIndex:";

/// Definition words recognized at the start of a trimmed line.
const DEFINITION_WORDS: [&str; 3] = ["public class ", "public struct ", "public enum "];

/// Type-header keywords, checked in this order. The second element is the
/// default base type when the header declares none.
const TYPE_KEYWORDS: [(&str, &str); 4] = [
    (" class ", ""),
    (" struct ", "System.ValueType"),
    (" enum ", "System.Enum"),
    (" interface ", ""),
];

/// One parsed type header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub offset: u32,
    pub type_name: String,
    pub full_name: String,
    pub base_name: String,
    pub namespace: String,
}

/// Dump size and mtime, recorded in the companion files for staleness
/// detection.
#[derive(Debug, Clone, Copy)]
pub struct DumpMetadata {
    pub size: u64,
    pub mtime: u64,
}

impl DumpMetadata {
    pub fn read(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat dump file {}", path.display()))?;
        let mtime = meta
            .modified()
            .with_context(|| format!("Failed to read mtime of {}", path.display()))?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(DumpMetadata {
            size: meta.len(),
            mtime,
        })
    }

    /// Both fields as u32, or `None` when either does not fit (the binary
    /// companions are skipped in that case).
    pub fn as_u32(&self) -> Option<(u32, u32)> {
        Some((
            u32::try_from(self.size).ok()?,
            u32::try_from(self.mtime).ok()?,
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionStats {
    pub definition_names: usize,
    pub definition_offsets: usize,
    pub namespaces: usize,
    pub types: usize,
    pub namespace_index_written: bool,
    pub type_index_written: bool,
}

/// Accumulates definition words, namespace markers, and type headers
/// over one dump scan.
pub struct DefinitionIndexBuilder {
    definition_offsets: BTreeMap<String, Vec<u32>>,
    namespace_offsets: Vec<u32>,
    type_infos: Vec<TypeInfo>,
    current_namespace: String,
}

impl DefinitionIndexBuilder {
    pub fn new() -> Self {
        DefinitionIndexBuilder {
            definition_offsets: BTreeMap::new(),
            namespace_offsets: Vec::new(),
            type_infos: Vec::new(),
            current_namespace: String::new(),
        }
    }

    pub fn scan(&mut self, scanner: &DumpScanner) {
        for line in scanner.lines() {
            self.process_line(line);
        }
    }

    pub fn process_line(&mut self, line: DumpLine<'_>) {
        let Some(text) = line.text() else {
            return;
        };
        let trimmed = text.trim();

        if let Some(rest) = trimmed.strip_prefix(NAMESPACE_MARKER) {
            self.namespace_offsets.push(line.offset);
            self.current_namespace = rest.trim().to_string();
        }

        for word in DEFINITION_WORDS {
            if let Some(rest) = trimmed.strip_prefix(word) {
                let token = name_token(rest);
                if !token.is_empty() {
                    self.definition_offsets
                        .entry(token.to_string())
                        .or_default()
                        .push(line.offset);
                }
                break;
            }
        }

        if trimmed.contains(TYPEDEF_MARKER) {
            if let Some(info) = self.parse_type_header(trimmed, line.offset) {
                self.type_infos.push(info);
            }
        }
    }

    /// Sort and deduplicate the accumulated tables. Call once, after the
    /// scan and before writing.
    pub fn finish(&mut self) {
        for offsets in self.definition_offsets.values_mut() {
            offsets.sort_unstable();
            offsets.dedup();
        }
        self.namespace_offsets.sort_unstable();
        self.namespace_offsets.dedup();
        self.type_infos.sort_by_key(|t| t.offset);
    }

    pub fn definition_offsets(&self) -> &BTreeMap<String, Vec<u32>> {
        &self.definition_offsets
    }

    pub fn namespace_offsets(&self) -> &[u32] {
        &self.namespace_offsets
    }

    pub fn type_infos(&self) -> &[TypeInfo] {
        &self.type_infos
    }

    fn parse_type_header(&self, line: &str, offset: u32) -> Option<TypeInfo> {
        let head = match line.find(TYPEDEF_COMMENT) {
            Some(pos) => &line[..pos],
            None => line,
        };

        let (keyword, default_base) = TYPE_KEYWORDS
            .into_iter()
            .find(|(keyword, _)| head.contains(keyword))?;
        let after_keyword = &head[head.find(keyword).unwrap() + keyword.len()..];

        let (token, rest) = split_name_token(after_keyword);
        if token.is_empty() {
            return None;
        }
        let type_name = normalize_type_name(token);

        let base_name = match rest.find(':') {
            Some(colon) => {
                let base = rest[colon + 1..]
                    .split([',', '{'])
                    .next()
                    .unwrap_or("");
                normalize_type_name(name_token(base))
            }
            None => default_base.to_string(),
        };

        let full_name = if self.current_namespace.is_empty() {
            type_name.clone()
        } else {
            format!("{}.{}", self.current_namespace, type_name)
        };

        Some(TypeInfo {
            offset,
            type_name,
            full_name,
            base_name,
            namespace: self.current_namespace.clone(),
        })
    }

    /// Write the text definition cache: a `v2` header line with dump size
    /// and mtime, then one `D` line per (name, offset) pair, sorted by
    /// name (ordinal) with ties by offset. Hex is uppercase, unprefixed.
    pub fn write_definition_cache<W: Write>(
        &self,
        writer: &mut W,
        dump_size: u64,
        dump_mtime: u64,
    ) -> Result<()> {
        writeln!(writer, "{}\t{:X}\t{:X}", DEFS_CACHE_FORMAT, dump_size, dump_mtime)?;
        for (word, offsets) in &self.definition_offsets {
            for offset in offsets {
                writeln!(writer, "D\t{}\t{:X}", word, offset)?;
            }
        }
        Ok(())
    }

    pub fn write_namespace_index<W: Write>(
        &self,
        writer: &mut W,
        dump_size: u32,
        dump_mtime: u32,
    ) -> Result<()> {
        writer.write_all(&NAMESPACE_INDEX_MAGIC.to_le_bytes())?;
        writer.write_all(&dump_size.to_le_bytes())?;
        writer.write_all(&dump_mtime.to_le_bytes())?;
        writer.write_all(&(self.namespace_offsets.len() as u32).to_le_bytes())?;
        for offset in &self.namespace_offsets {
            writer.write_all(&offset.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn write_type_index<W: Write>(
        &self,
        writer: &mut W,
        dump_size: u32,
        dump_mtime: u32,
    ) -> Result<()> {
        writer.write_all(&TYPE_INDEX_MAGIC.to_le_bytes())?;
        writer.write_all(&dump_size.to_le_bytes())?;
        writer.write_all(&dump_mtime.to_le_bytes())?;
        writer.write_all(&(self.type_infos.len() as u32).to_le_bytes())?;
        for info in &self.type_infos {
            writer.write_all(&info.offset.to_le_bytes())?;
            write_string(writer, &info.type_name)?;
            write_string(writer, &info.full_name)?;
            write_string(writer, &info.base_name)?;
            write_string(writer, &info.namespace)?;
        }
        Ok(())
    }
}

impl Default for DefinitionIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    writer.write_all(&(s.len() as u32).to_le_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '<' | '>' | '`')
}

/// The first contiguous run of name characters in `s`.
fn name_token(s: &str) -> &str {
    split_name_token(s).0
}

/// The first name-character run and the remainder following it.
fn split_name_token(s: &str) -> (&str, &str) {
    let Some(start) = s.find(is_name_char) else {
        return ("", "");
    };
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !is_name_char(c))
        .unwrap_or(rest.len());
    (&rest[..end], &rest[end..])
}

/// Normalize a type name for lookup: strip trailing `[]` pairs (counting
/// dimensions), reduce to the name-character run, drop a leading
/// `global::` and trailing `,`/`;`, then re-append the array suffixes.
pub fn normalize_type_name(name: &str) -> String {
    let mut core = name.trim();
    let mut dimensions = 0usize;
    while let Some(stripped) = core.strip_suffix("[]") {
        core = stripped.trim_end();
        dimensions += 1;
    }

    let mut token = name_token(core);
    token = token.strip_prefix("global::").unwrap_or(token);
    let token = token.trim_end_matches([',', ';']);

    let mut out = String::with_capacity(token.len() + dimensions * 2);
    out.push_str(token);
    for _ in 0..dimensions {
        out.push_str("[]");
    }
    out
}

/// Build all three companion indexes for `dump_path`.
///
/// The text cache is always written. The binary companions are skipped
/// when the dump metadata does not fit in 32 bits, and the type index is
/// additionally skipped when no type headers were found; consumers treat
/// an absent file as "no index".
pub fn build_definition_indexes(
    dump_path: &Path,
    defs_path: &Path,
    namespace_path: &Path,
    type_path: &Path,
) -> Result<DefinitionStats> {
    let scanner = DumpScanner::open(dump_path)?;
    let metadata = DumpMetadata::read(dump_path)?;

    let mut builder = DefinitionIndexBuilder::new();
    builder.scan(&scanner);
    builder.finish();

    let mut writer = BufWriter::new(File::create(defs_path).with_context(|| {
        format!("Failed to create definition cache {}", defs_path.display())
    })?);
    builder.write_definition_cache(&mut writer, metadata.size, metadata.mtime)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write definition cache {}", defs_path.display()))?;

    let mut stats = DefinitionStats {
        definition_names: builder.definition_offsets.len(),
        definition_offsets: builder.definition_offsets.values().map(Vec::len).sum(),
        namespaces: builder.namespace_offsets.len(),
        types: builder.type_infos.len(),
        namespace_index_written: false,
        type_index_written: false,
    };

    match metadata.as_u32() {
        Some((size, mtime)) => {
            let mut writer = BufWriter::new(File::create(namespace_path).with_context(|| {
                format!("Failed to create namespace index {}", namespace_path.display())
            })?);
            builder.write_namespace_index(&mut writer, size, mtime)?;
            writer.flush().with_context(|| {
                format!("Failed to write namespace index {}", namespace_path.display())
            })?;
            stats.namespace_index_written = true;

            if !builder.type_infos.is_empty() {
                let mut writer = BufWriter::new(File::create(type_path).with_context(|| {
                    format!("Failed to create type index {}", type_path.display())
                })?);
                builder.write_type_index(&mut writer, size, mtime)?;
                writer.flush().with_context(|| {
                    format!("Failed to write type index {}", type_path.display())
                })?;
                stats.type_index_written = true;
            }
        }
        None => {
            log::debug!(
                "[Defs] Dump metadata exceeds 32 bits (size={}, mtime={}); skipping binary companions",
                metadata.size,
                metadata.mtime
            );
        }
    }

    log::debug!(
        "[Defs] Indexed {} definition names, {} namespaces, {} types",
        stats.definition_names,
        stats.namespaces,
        stats.types
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with(lines: &[&str]) -> DefinitionIndexBuilder {
        let mut builder = DefinitionIndexBuilder::new();
        let mut offset = 0u32;
        for text in lines {
            builder.process_line(DumpLine {
                offset,
                raw: text.as_bytes(),
            });
            offset += text.len() as u32 + 1;
        }
        builder.finish();
        builder
    }

    #[test]
    fn test_normalize_plain_name() {
        assert_eq!(normalize_type_name("Foo"), "Foo");
        assert_eq!(normalize_type_name("  Foo  "), "Foo");
    }

    #[test]
    fn test_normalize_array_suffixes() {
        assert_eq!(normalize_type_name("Foo[]"), "Foo[]");
        assert_eq!(normalize_type_name("Foo[][]"), "Foo[][]");
        assert_eq!(normalize_type_name("Foo[] []"), "Foo[][]");
    }

    #[test]
    fn test_normalize_global_prefix() {
        assert_eq!(normalize_type_name("global::System.Int32"), "System.Int32");
    }

    #[test]
    fn test_normalize_trailing_punctuation() {
        assert_eq!(normalize_type_name("Foo,"), "Foo");
        assert_eq!(normalize_type_name("Foo;"), "Foo");
    }

    #[test]
    fn test_normalize_generic_backtick() {
        assert_eq!(
            normalize_type_name("List`1[]"),
            "List`1[]"
        );
    }

    #[test]
    fn test_namespace_tracking() {
        let builder = builder_with(&[
            "// Namespace: Game.Core",
            "public class Player // TypeDefIndex: 10",
        ]);
        assert_eq!(builder.namespace_offsets(), &[0]);
        let info = &builder.type_infos()[0];
        assert_eq!(info.namespace, "Game.Core");
        assert_eq!(info.full_name, "Game.Core.Player");
    }

    #[test]
    fn test_empty_namespace_resets() {
        let builder = builder_with(&[
            "// Namespace: Game",
            "// Namespace: ",
            "public class Orphan // TypeDefIndex: 3",
        ]);
        assert_eq!(builder.type_infos()[0].full_name, "Orphan");
        assert_eq!(builder.namespace_offsets().len(), 2);
    }

    #[test]
    fn test_definition_words() {
        let builder = builder_with(&[
            "public class Foo",
            "public struct Bar",
            "public enum Baz",
            "internal class Hidden",
        ]);
        let keys: Vec<&String> = builder.definition_offsets().keys().collect();
        assert_eq!(keys, ["Bar", "Baz", "Foo"]);
    }

    #[test]
    fn test_definition_offsets_sorted_and_deduped() {
        let mut builder = DefinitionIndexBuilder::new();
        for offset in [30u32, 10, 30] {
            builder.process_line(DumpLine {
                offset,
                raw: b"public class Foo",
            });
        }
        builder.finish();
        assert_eq!(builder.definition_offsets()["Foo"], vec![10, 30]);
    }

    #[test]
    fn test_type_header_with_base() {
        let builder = builder_with(&[
            "public class Player : Entity, IDamageable // TypeDefIndex: 4",
        ]);
        let info = &builder.type_infos()[0];
        assert_eq!(info.type_name, "Player");
        assert_eq!(info.base_name, "Entity");
    }

    #[test]
    fn test_type_header_default_bases() {
        let builder = builder_with(&[
            "public struct Vec3 // TypeDefIndex: 1",
            "public enum Mode // TypeDefIndex: 2",
            "public class Free // TypeDefIndex: 3",
            "public interface IThing // TypeDefIndex: 4",
        ]);
        let bases: Vec<&str> = builder
            .type_infos()
            .iter()
            .map(|t| t.base_name.as_str())
            .collect();
        assert_eq!(bases, ["System.ValueType", "System.Enum", "", ""]);
    }

    #[test]
    fn test_type_header_generic_base_stops_at_comma() {
        let builder = builder_with(&[
            "public class Inventory : Container, ISerializable // TypeDefIndex: 9",
        ]);
        assert_eq!(builder.type_infos()[0].base_name, "Container");
    }

    #[test]
    fn test_type_header_without_keyword_is_skipped() {
        let builder = builder_with(&["// some comment mentioning TypeDefIndex: 42"]);
        assert!(builder.type_infos().is_empty());
    }

    #[test]
    fn test_sealed_class_header_is_parsed() {
        // modifier soup before the keyword does not matter
        let builder = builder_with(&[
            "public sealed class Config : ScriptableObject // TypeDefIndex: 7",
        ]);
        let info = &builder.type_infos()[0];
        assert_eq!(info.type_name, "Config");
        assert_eq!(info.base_name, "ScriptableObject");
    }

    #[test]
    fn test_definition_cache_output() {
        let builder = builder_with(&["public class Foo", "public struct Bar"]);
        let mut out = Vec::new();
        builder.write_definition_cache(&mut out, 0x1234, 0xABCD).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "v2\t1234\tABCD");
        assert_eq!(lines[1], "D\tBar\t11");
        assert_eq!(lines[2], "D\tFoo\t0");
    }
}
