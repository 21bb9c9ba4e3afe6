// Build the definition and type companion indexes for a dump
use super::utils::{self, format_number};
use anyhow::Result;
use clap::Args;
use dumpidx::build_definition_indexes;
use dumpidx::constants;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Args)]
#[command(
    about = "Build the definition/type companion indexes for a dump",
    long_about = "Scan a dump listing for namespace markers, public definition words and
type headers, and write the companion indexes:

  <dump>.defs      text definition cache (name -> dump offset)
  <dump>.nsidx     binary namespace-offsets index
  <dump>.typeidx   binary type index (name, full name, base, namespace)

The binary companions carry the dump size and mtime for staleness
detection and are skipped when either does not fit in 32 bits; consumers
treat an absent file as \"no index\"."
)]
pub struct DefsCommand {
    /// Dump file to index
    pub dump: PathBuf,

    /// Definition cache output path (default: <dump>.defs)
    #[arg(long)]
    pub defs: Option<PathBuf>,

    /// Namespace index output path (default: <dump>.nsidx)
    #[arg(long)]
    pub namespaces: Option<PathBuf>,

    /// Type index output path (default: <dump>.typeidx)
    #[arg(long)]
    pub types: Option<PathBuf>,
}

pub fn run(cmd: DefsCommand, _quiet: bool) -> Result<()> {
    let defs_path = cmd
        .defs
        .unwrap_or_else(|| utils::companion_path(&cmd.dump, constants::DEFS_FILE_SUFFIX));
    let namespace_path = cmd
        .namespaces
        .unwrap_or_else(|| utils::companion_path(&cmd.dump, constants::NAMESPACE_FILE_SUFFIX));
    let type_path = cmd
        .types
        .unwrap_or_else(|| utils::companion_path(&cmd.dump, constants::TYPE_FILE_SUFFIX));

    let start = Instant::now();

    // The builders skip files they decide not to write, so stage every
    // output through a temp path and only commit the ones that exist.
    let temp_defs = utils::temp_path(&defs_path);
    let temp_ns = utils::temp_path(&namespace_path);
    let temp_types = utils::temp_path(&type_path);

    let stats = build_definition_indexes(&cmd.dump, &temp_defs, &temp_ns, &temp_types)
        .inspect_err(|_| {
            std::fs::remove_file(&temp_defs).ok();
            std::fs::remove_file(&temp_ns).ok();
            std::fs::remove_file(&temp_types).ok();
        })?;

    utils::commit_temp(&temp_defs, &defs_path)?;
    if stats.namespace_index_written {
        utils::commit_temp(&temp_ns, &namespace_path)?;
    }
    if stats.type_index_written {
        utils::commit_temp(&temp_types, &type_path)?;
    }

    let elapsed = start.elapsed();

    eprintln!();
    eprintln!("Definition Index Summary");
    eprintln!("========================");
    eprintln!("  Definition names:   {}", format_number(stats.definition_names));
    eprintln!("  Definition offsets: {}", format_number(stats.definition_offsets));
    eprintln!("  Namespaces:         {}", format_number(stats.namespaces));
    eprintln!("  Types:              {}", format_number(stats.types));
    eprintln!("  Cache:              {}", defs_path.display());
    if stats.namespace_index_written {
        eprintln!("  Namespace index:    {}", namespace_path.display());
    } else {
        eprintln!("  Namespace index:    skipped");
    }
    if stats.type_index_written {
        eprintln!("  Type index:         {}", type_path.display());
    } else {
        eprintln!("  Type index:         skipped");
    }
    eprintln!("  Build time:         {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
