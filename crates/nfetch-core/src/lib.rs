//! nfetch core: segmented, resumable transfer of named content.

pub mod config;
pub mod logging;

pub mod checksum;
pub mod fetch;
pub mod name;
pub mod pending;
pub mod progress;
pub mod retry;
pub mod segment_table;
pub mod segmenter;
pub mod serve;
pub mod storage;
pub mod target;
pub mod transport;
pub mod watcher;
