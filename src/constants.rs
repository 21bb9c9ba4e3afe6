// Constants for index formats and binary identification

/// Binary name used in logs and metadata
pub const BINARY_NAME: &str = "dumpidx";

/// Package version from Cargo.toml (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// RVA Index Constants (IDX1 routing table + IDX2 packed blocks)
// ============================================================================

/// Magic bytes at the start of the routing-table file
pub const INDEX1_MAGIC: &[u8; 4] = b"IDX1";

/// Magic bytes at the start of the packed-block file
pub const INDEX2_MAGIC: &[u8; 4] = b"IDX2";

/// Original format: blocks map RVAs to 1-based dump line numbers
pub const FORMAT_VERSION_1: u16 = 1;

/// Adds total_dump_lines to the IDX2 header
pub const FORMAT_VERSION_2: u16 = 2;

/// Same layout as v2; mapped values are 0-based dump byte offsets
pub const FORMAT_VERSION_3: u16 = 3;

/// Version emitted by the writer
pub const CURRENT_FORMAT_VERSION: u16 = FORMAT_VERSION_3;

/// IDX1 header: magic (4) + version (2) + reserved (2) + entry count (4)
pub const INDEX1_HEADER_SIZE: usize = 12;

/// IDX1 routing entry: start RVA (8) + block offset (8) + block size (4) + reserved (4)
pub const INDEX1_ENTRY_SIZE: usize = 24;

/// IDX2 v1 header: magic (4) + version (2) + reserved (2) + block count (4)
pub const INDEX2_BASE_HEADER_SIZE: usize = 12;

/// IDX2 v2/v3 header: base header + total_dump_lines (4)
pub const INDEX2_HEADER_SIZE: usize = 16;

/// Per-block header: start RVA (8) + start value (4) + record count (4)
pub const BLOCK_HEADER_SIZE: u32 = 16;

/// Per-record size: addr delta (4) + absolute value (4)
pub const BLOCK_RECORD_SIZE: u32 = 8;

/// Default number of records packed into one IDX2 block
pub const DEFAULT_MAX_RECORDS_PER_BLOCK: usize = 1024;

// ============================================================================
// Companion Index Constants (definition cache, namespace/type indexes)
// ============================================================================

/// Namespace-offsets file magic ("NIS1" little-endian)
pub const NAMESPACE_INDEX_MAGIC: u32 = 0x3153_494E;

/// Type-index file magic ("TYP2" little-endian)
pub const TYPE_INDEX_MAGIC: u32 = 0x3259_5054;

/// Format tag on the first line of the text definition cache
pub const DEFS_CACHE_FORMAT: &str = "v2";

// ============================================================================
// Default File Names
// ============================================================================

/// Routing-table file extension, appended to the dump file name
pub const INDEX1_FILE_SUFFIX: &str = "rvaidx1";

/// Packed-block file extension, appended to the dump file name
pub const INDEX2_FILE_SUFFIX: &str = "rvaidx2";

/// Text definition cache extension
pub const DEFS_FILE_SUFFIX: &str = "defs";

/// Binary namespace-offsets index extension
pub const NAMESPACE_FILE_SUFFIX: &str = "nsidx";

/// Binary type index extension
pub const TYPE_FILE_SUFFIX: &str = "typeidx";
