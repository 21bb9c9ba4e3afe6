mod common;

use anyhow::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use dumpidx::index_format::{self, Index1Entry};
use dumpidx::{BlockRecord, RvaBlock, RvaIndexLookup};

fn patch_file(path: &Path, offset: u64, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    Ok(())
}

#[test]
fn test_two_block_floor_lookup() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let line1 = "\t// RVA: 0x100 Offset: 0x100 VA: 0x100\n";
    let line2 = "\t// RVA: 0x200 Offset: 0x200 VA: 0x200\n";
    let line3 = "\t|-RVA: 0x300 Offset: 0x300\n";
    let dump = common::write_dump(dir.path(), &format!("{}{}{}", line1, line2, line3))?;
    let offset2 = line1.len() as u32;
    let offset3 = (line1.len() + line2.len()) as u32;

    let (index1, index2, stats) = common::build_index(&dump, 2)?;
    assert_eq!(stats.blocks, 2);

    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;
    assert_eq!(lookup.total_dump_lines(), 3);
    assert_eq!(lookup.block_count(), 2);

    assert_eq!(lookup.find_closest_lower_or_equal(0x250)?, Some(offset2));
    assert_eq!(lookup.find_closest_lower_or_equal(0xFF)?, None);
    assert_eq!(lookup.find_closest_lower_or_equal(0x350)?, Some(offset3));
    assert_eq!(lookup.find_closest_lower_or_equal(0x100)?, Some(0));
    assert_eq!(lookup.find_closest_lower_or_equal(0x300)?, Some(offset3));
    Ok(())
}

#[test]
fn test_floor_round_trip() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let rvas = [0x100u64, 0x200, 0x300, 0x500];
    let (content, offsets) = common::method_dump(&rvas);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 2)?;
    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;

    for (i, &rva) in rvas.iter().enumerate() {
        // exact hit resolves to its own line
        assert_eq!(lookup.find_closest_lower_or_equal(rva)?, Some(offsets[i]));
        // one below resolves to the previous line, or nothing before the first
        let expected_below = if i == 0 { None } else { Some(offsets[i - 1]) };
        assert_eq!(lookup.find_closest_lower_or_equal(rva - 1)?, expected_below);
    }

    // above the last record, the last record wins
    assert_eq!(
        lookup.find_closest_lower_or_equal(u64::MAX)?,
        Some(*offsets.last().unwrap())
    );
    Ok(())
}

#[test]
fn test_duplicate_rvas_resolve_to_last_record() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let (content, offsets) = common::method_dump(&[0x100, 0x200, 0x200, 0x300]);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 1024)?;
    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;

    // ties sort by dump offset; the floor picks the later line
    assert_eq!(lookup.find_closest_lower_or_equal(0x200)?, Some(offsets[2]));
    Ok(())
}

#[test]
fn test_empty_index_loads_and_finds_nothing() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let dump = common::write_dump(dir.path(), "no annotations here\n")?;

    let (index1, index2, _) = common::build_index(&dump, 1024)?;
    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;
    assert_eq!(lookup.block_count(), 0);
    assert_eq!(lookup.find_closest_lower_or_equal(0)?, None);
    assert_eq!(lookup.find_closest_lower_or_equal(u64::MAX)?, None);
    Ok(())
}

#[test]
fn test_corrupt_block_fails_lookup_but_not_cache() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let (content, offsets) = common::method_dump(&[0x100, 0x200]);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 1)?;

    // block 0 at 16, block 1 at 40; claim 3 records in block 1 while its
    // routed size stays 24 bytes
    patch_file(&index2, 40 + 12, &3u32.to_le_bytes())?;

    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;

    // healthy block still resolves and lands in the cache
    assert_eq!(lookup.find_closest_lower_or_equal(0x100)?, Some(offsets[0]));

    // the corrupt block errors out
    let err = lookup.find_closest_lower_or_equal(0x200).unwrap_err();
    assert!(err.to_string().contains("block 1"));

    // the failure did not evict the cached block
    assert_eq!(lookup.find_closest_lower_or_equal(0x100)?, Some(offsets[0]));
    Ok(())
}

#[test]
fn test_undersized_routing_entry_fails_lookup() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let (content, _) = common::method_dump(&[0x100]);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 1024)?;

    // block size field of entry 0 (header 12 + start_rva 8 + offset 8)
    patch_file(&index1, 12 + 16, &8u32.to_le_bytes())?;

    let mut lookup = RvaIndexLookup::load(&index1, &index2)?;
    let err = lookup.find_closest_lower_or_equal(0x100).unwrap_err();
    assert!(err.to_string().contains("smaller than block header"));
    Ok(())
}

#[test]
fn test_block_count_mismatch_is_rejected() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let (content, _) = common::method_dump(&[0x100]);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 1024)?;
    patch_file(&index2, 8, &7u32.to_le_bytes())?;

    let err = RvaIndexLookup::load(&index1, &index2).unwrap_err();
    assert!(err.to_string().contains("does not match"));
    Ok(())
}

#[test]
fn test_bad_magic_and_version_are_rejected() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let (content, _) = common::method_dump(&[0x100]);
    let dump = common::write_dump(dir.path(), &content)?;

    let (index1, index2, _) = common::build_index(&dump, 1024)?;

    let original = fs::read(&index1)?;
    patch_file(&index1, 0, b"XDX1")?;
    assert!(RvaIndexLookup::load(&index1, &index2)
        .unwrap_err()
        .to_string()
        .contains("magic mismatch"));

    fs::write(&index1, &original)?;
    patch_file(&index1, 4, &9u16.to_le_bytes())?;
    assert!(RvaIndexLookup::load(&index1, &index2)
        .unwrap_err()
        .to_string()
        .contains("Unsupported index1 version"));
    Ok(())
}

#[test]
fn test_boundary_fallback_to_previous_block() -> Result<()> {
    // Hand-built index whose second block decodes to RVAs strictly above
    // its routing start (non-zero first delta).
    let dir = common::setup_temp_dir()?;
    let index1_path = dir.path().join("hand.rvaidx1");
    let index2_path = dir.path().join("hand.rvaidx2");

    let blocks = vec![
        RvaBlock {
            start_rva: 0x100,
            start_value: 7,
            records: vec![BlockRecord { addr_delta: 0, value: 7 }],
        },
        RvaBlock {
            start_rva: 0x200,
            start_value: 99,
            records: vec![BlockRecord { addr_delta: 0x10, value: 99 }],
        },
    ];

    let mut index2_writer = BufWriter::new(File::create(&index2_path)?);
    let entries = index_format::write_index2(&mut index2_writer, &blocks, 2)?;
    index2_writer.flush()?;

    let mut index1_writer = BufWriter::new(File::create(&index1_path)?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer.flush()?;

    let mut lookup = RvaIndexLookup::load(&index1_path, &index2_path)?;

    // routing selects block 1 (0x200 <= 0x205) but its only decoded RVA
    // is 0x210; the floor is block 0's last record
    assert_eq!(lookup.find_closest_lower_or_equal(0x205)?, Some(7));
    // at the decoded RVA the block answers for itself
    assert_eq!(lookup.find_closest_lower_or_equal(0x210)?, Some(99));
    Ok(())
}

#[test]
fn test_boundary_fallback_with_no_previous_block() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let index1_path = dir.path().join("hand.rvaidx1");
    let index2_path = dir.path().join("hand.rvaidx2");

    let blocks = vec![RvaBlock {
        start_rva: 0x200,
        start_value: 99,
        records: vec![BlockRecord { addr_delta: 0x10, value: 99 }],
    }];

    let mut index2_writer = BufWriter::new(File::create(&index2_path)?);
    let entries = index_format::write_index2(&mut index2_writer, &blocks, 1)?;
    index2_writer.flush()?;
    let mut index1_writer = BufWriter::new(File::create(&index1_path)?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer.flush()?;

    let mut lookup = RvaIndexLookup::load(&index1_path, &index2_path)?;
    assert_eq!(lookup.find_closest_lower_or_equal(0x205)?, None);
    Ok(())
}

#[test]
fn test_out_of_order_routing_is_rejected() -> Result<()> {
    let dir = common::setup_temp_dir()?;
    let index1_path = dir.path().join("hand.rvaidx1");
    let index2_path = dir.path().join("hand.rvaidx2");

    let blocks = vec![
        RvaBlock {
            start_rva: 0x100,
            start_value: 0,
            records: vec![BlockRecord { addr_delta: 0, value: 0 }],
        },
        RvaBlock {
            start_rva: 0x200,
            start_value: 1,
            records: vec![BlockRecord { addr_delta: 0, value: 1 }],
        },
    ];

    let mut index2_writer = BufWriter::new(File::create(&index2_path)?);
    let mut entries = index_format::write_index2(&mut index2_writer, &blocks, 2)?;
    index2_writer.flush()?;

    // write the routing entries in the wrong order
    entries.swap(0, 1);
    let mut index1_writer = BufWriter::new(File::create(&index1_path)?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer.flush()?;

    let err = RvaIndexLookup::load(&index1_path, &index2_path).unwrap_err();
    assert!(err.to_string().contains("not sorted"));
    Ok(())
}

#[test]
fn test_equal_adjacent_routing_entries_are_tolerated() -> Result<()> {
    // Capacity splits can in principle produce adjacent blocks sharing a
    // start RVA (a duplicate run longer than the capacity); the loader
    // accepts them and the floor picks the later block.
    let dir = common::setup_temp_dir()?;
    let index1_path = dir.path().join("hand.rvaidx1");
    let index2_path = dir.path().join("hand.rvaidx2");

    let blocks = vec![
        RvaBlock {
            start_rva: 0x100,
            start_value: 10,
            records: vec![
                BlockRecord { addr_delta: 0, value: 10 },
                BlockRecord { addr_delta: 0, value: 20 },
            ],
        },
        RvaBlock {
            start_rva: 0x100,
            start_value: 30,
            records: vec![BlockRecord { addr_delta: 0, value: 30 }],
        },
    ];

    let mut index2_writer = BufWriter::new(File::create(&index2_path)?);
    let entries = index_format::write_index2(&mut index2_writer, &blocks, 3)?;
    index2_writer.flush()?;
    let mut index1_writer = BufWriter::new(File::create(&index1_path)?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer.flush()?;

    let mut lookup = RvaIndexLookup::load(&index1_path, &index2_path)?;
    assert_eq!(lookup.find_closest_lower_or_equal(0x100)?, Some(30));
    Ok(())
}

#[test]
fn test_load_checks_routing_against_hand_entries() -> Result<()> {
    // An IDX1 that references more blocks than IDX2 carries is rejected
    // at load, before any lookup touches the block file.
    let dir = common::setup_temp_dir()?;
    let index1_path = dir.path().join("hand.rvaidx1");
    let index2_path = dir.path().join("hand.rvaidx2");

    let blocks = vec![RvaBlock {
        start_rva: 0x100,
        start_value: 0,
        records: vec![BlockRecord { addr_delta: 0, value: 0 }],
    }];

    let mut index2_writer = BufWriter::new(File::create(&index2_path)?);
    let mut entries = index_format::write_index2(&mut index2_writer, &blocks, 1)?;
    index2_writer.flush()?;

    entries.push(Index1Entry {
        start_rva: 0x500,
        block_offset: 40,
        block_size: 24,
    });
    let mut index1_writer = BufWriter::new(File::create(&index1_path)?);
    index_format::write_index1(&mut index1_writer, &entries)?;
    index1_writer.flush()?;

    let err = RvaIndexLookup::load(&index1_path, &index2_path).unwrap_err();
    assert!(err.to_string().contains("does not match"));
    Ok(())
}
