// Build the two-file RVA index for a dump
use super::utils::{self, format_bytes, format_number};
use anyhow::Result;
use clap::Args;
use dumpidx::{build_rva_index_with_progress, BuildOptionsBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Args)]
#[command(
    about = "Build the RVA index (IDX1/IDX2) for a dump",
    long_about = "Scan a dump listing for RVA-annotated lines and write the two-file index:

  <dump>.rvaidx1   routing table (one entry per block)
  <dump>.rvaidx2   delta-encoded record blocks

Both files are written to temp paths and renamed into place on success,
so a failed build never leaves a half-written index behind.",
    after_help = "Examples:\n  \
        # Index a dump with the default block capacity\n  \
        dumpidx index dump.cs\n\n  \
        # Choose output paths and a smaller block capacity\n  \
        dumpidx index dump.cs --index1 out.idx1 --index2 out.idx2 --block-capacity 256"
)]
pub struct IndexCommand {
    /// Dump file to index
    pub dump: PathBuf,

    /// Routing table output path (default: <dump>.rvaidx1)
    #[arg(long)]
    pub index1: Option<PathBuf>,

    /// Block file output path (default: <dump>.rvaidx2)
    #[arg(long)]
    pub index2: Option<PathBuf>,

    /// Maximum records per block
    #[arg(long, default_value_t = dumpidx::constants::DEFAULT_MAX_RECORDS_PER_BLOCK)]
    pub block_capacity: usize,
}

pub fn run(cmd: IndexCommand, quiet: bool) -> Result<()> {
    let index1_path = cmd.index1.unwrap_or_else(|| utils::index1_path(&cmd.dump));
    let index2_path = cmd.index2.unwrap_or_else(|| utils::index2_path(&cmd.dump));

    let options = BuildOptionsBuilder::new()
        .max_records_per_block(cmd.block_capacity)
        .build();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}")?
                .progress_chars("=>-"),
        );
        pb
    };

    let start = Instant::now();

    let temp1 = utils::temp_path(&index1_path);
    let temp2 = utils::temp_path(&index2_path);
    let stats = build_rva_index_with_progress(&cmd.dump, &temp1, &temp2, &options, |done, total| {
        pb.set_length(total);
        pb.set_position(done);
    })
    .inspect_err(|_| {
        // Leave nothing behind on failure
        std::fs::remove_file(&temp1).ok();
        std::fs::remove_file(&temp2).ok();
    })?;

    // IDX2 first, matching the build order
    utils::commit_temp(&temp2, &index2_path)?;
    utils::commit_temp(&temp1, &index1_path)?;

    pb.finish_and_clear();
    let elapsed = start.elapsed();

    eprintln!();
    eprintln!("Index Summary");
    eprintln!("=============");
    eprintln!("  Lines scanned:  {}", format_number(stats.total_lines as usize));
    eprintln!("  RVA records:    {}", format_number(stats.records));
    eprintln!("  Blocks:         {}", format_number(stats.blocks));
    eprintln!("  Routing table:  {} ({})", index1_path.display(), format_bytes(stats.index1_bytes));
    eprintln!("  Block file:     {} ({})", index2_path.display(), format_bytes(stats.index2_bytes));
    eprintln!("  Build time:     {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
