//! CLI command handlers, one per file.

mod checksum;
mod copy;
mod segments;
mod table;

pub use checksum::run_checksum;
pub use copy::run_copy;
pub use segments::run_segments;
pub use table::run_table;
