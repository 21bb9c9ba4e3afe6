// Query the RVA index
use super::utils;
use anyhow::Result;
use clap::Args;
use dumpidx::RvaIndexLookup;
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Resolve RVAs to dump offsets via the index",
    long_about = "Load the IDX1/IDX2 pair built by `dumpidx index` and resolve one or
more query RVAs. Each query prints the mapped value at the greatest
indexed RVA at or below it (a dump byte offset for v3 indexes, a 1-based
line number for v1/v2), or \"not found\" when every indexed RVA is above
the query.",
    after_help = "Examples:\n  \
        dumpidx lookup dump.cs 0x180045C0\n  \
        dumpidx lookup dump.cs 0x100 0x200 0x300"
)]
pub struct LookupCommand {
    /// Dump file whose companion indexes should be queried
    pub dump: PathBuf,

    /// RVAs to resolve (0x-prefixed hex or decimal)
    #[arg(required = true)]
    pub rvas: Vec<String>,

    /// Routing table path (default: <dump>.rvaidx1)
    #[arg(long)]
    pub index1: Option<PathBuf>,

    /// Block file path (default: <dump>.rvaidx2)
    #[arg(long)]
    pub index2: Option<PathBuf>,
}

pub fn run(cmd: LookupCommand) -> Result<()> {
    let index1_path = cmd.index1.unwrap_or_else(|| utils::index1_path(&cmd.dump));
    let index2_path = cmd.index2.unwrap_or_else(|| utils::index2_path(&cmd.dump));

    let mut lookup = RvaIndexLookup::load(&index1_path, &index2_path)?;

    for input in &cmd.rvas {
        let rva = utils::parse_rva(input)?;
        match lookup.find_closest_lower_or_equal(rva)? {
            Some(offset) => println!("0x{:X}\t{}", rva, offset),
            None => println!("0x{:X}\tnot found", rva),
        }
    }

    Ok(())
}
