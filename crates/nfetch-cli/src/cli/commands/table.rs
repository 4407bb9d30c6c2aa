//! `nfetch table` – show what an unfinished download has on disk.

use anyhow::Result;
use nfetch_core::segment_table::{LockProbe, SegmentTable};
use nfetch_core::storage::table_path;
use std::path::Path;

pub fn run_table(target: &Path) -> Result<()> {
    let lock = match SegmentTable::probe(target)? {
        LockProbe::Missing => {
            println!("No segment table at {}.", table_path(target).display());
            return Ok(());
        }
        LockProbe::Held => "held (download in progress)",
        LockProbe::Free => "free (download interrupted)",
    };
    let Some(snapshot) = SegmentTable::inspect(target)? else {
        println!("{}: not initialized yet; lock {}", table_path(target).display(), lock);
        return Ok(());
    };
    let total = snapshot
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!("table:      {}", table_path(target).display());
    println!("name:       {}", snapshot.layout.qualified_name);
    println!("chunk size: {}", snapshot.layout.chunk_size);
    println!("segments:   {} / {}", snapshot.completed, total);
    println!("lock:       {}", lock);
    Ok(())
}
