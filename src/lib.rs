// src/lib.rs
pub mod block;
pub mod builder;
pub mod constants;
pub mod definitions;
pub mod index_format;
pub mod lookup;
pub mod options;
pub mod rva;
pub mod scanner;

// Re-export main types
pub use block::{build_blocks, BlockRecord, RvaBlock};
pub use builder::{build_rva_index, build_rva_index_with_progress, BuildStats};
pub use definitions::{
    build_definition_indexes, normalize_type_name, DefinitionIndexBuilder, DefinitionStats,
    DumpMetadata, TypeInfo,
};
pub use index_format::{DecodedBlock, Index1Entry, Index2Header};
pub use lookup::RvaIndexLookup;
pub use options::{BuildOptions, BuildOptionsBuilder};
pub use rva::{RvaExtractor, RvaRecord};
pub use scanner::{DumpLine, DumpScanner, LineIter};
