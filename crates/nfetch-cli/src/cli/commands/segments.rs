//! `nfetch segments` – segment layout of a local file.

use anyhow::{bail, Context, Result};
use nfetch_core::segmenter::{final_segment_for_size, segment_count};
use std::path::Path;

pub fn run_segments(path: &Path, chunk_size: u32) -> Result<()> {
    if chunk_size == 0 {
        bail!("chunk size must be positive");
    }
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    let final_segment = final_segment_for_size(size, chunk_size as u64);
    println!("size:          {} bytes", size);
    println!("chunk size:    {} bytes", chunk_size);
    println!("segments:      {}", segment_count(final_segment));
    println!("final segment: {}", final_segment);
    Ok(())
}
