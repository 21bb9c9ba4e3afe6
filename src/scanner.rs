// Byte-wise dump scanning with line-start offset accounting
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A single dump line.
///
/// `offset` is the byte offset of the first byte of the line within the
/// dump. `raw` is the line content with the terminating `\n` excluded and
/// a trailing `\r` (if any) trimmed; the trim affects the text only, never
/// the offset accounting of following lines.
#[derive(Debug, Clone, Copy)]
pub struct DumpLine<'a> {
    pub offset: u32,
    pub raw: &'a [u8],
}

impl<'a> DumpLine<'a> {
    /// Line content as UTF-8, or `None` for lines with invalid bytes.
    pub fn text(&self) -> Option<&'a str> {
        std::str::from_utf8(self.raw).ok()
    }
}

/// Read-only view of a dump file.
///
/// The file is memory-mapped; offsets into it must fit in 32 bits, so
/// opening a dump of 2^32 bytes or more fails.
pub struct DumpScanner {
    map: Option<Mmap>,
    size: u32,
}

impl DumpScanner {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dump file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat dump file {}", path.display()))?
            .len();
        if len > u32::MAX as u64 {
            anyhow::bail!(
                "Dump file {} is {} bytes; offsets must fit in 32 bits",
                path.display(),
                len
            );
        }

        // Mapping a zero-length file is an error on most platforms
        let map = if len == 0 {
            None
        } else {
            Some(unsafe {
                Mmap::map(&file)
                    .with_context(|| format!("Failed to mmap dump file {}", path.display()))?
            })
        };

        Ok(DumpScanner {
            map,
            size: len as u32,
        })
    }

    /// Total dump size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Iterate over lines in dump order.
    pub fn lines(&self) -> LineIter<'_> {
        LineIter::new(self.data())
    }
}

/// Iterator over `(offset, line)` pairs of a dump byte buffer.
///
/// A line is emitted for every `\n`; a final unterminated line is emitted
/// identically.
pub struct LineIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LineIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        LineIter { data, pos: 0 }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = DumpLine<'a>;

    fn next(&mut self) -> Option<DumpLine<'a>> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.data[start..];
        let (mut line, next_pos) = match rest.iter().position(|&b| b == b'\n') {
            Some(i) => (&rest[..i], start + i + 1),
            None => (rest, self.data.len()),
        };
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        self.pos = next_pos;
        Some(DumpLine {
            offset: start as u32,
            raw: line,
        })
    }
}
