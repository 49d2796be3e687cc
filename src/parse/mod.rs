pub mod metadata;
pub mod structure;

pub use metadata::extract_metadata;
pub use structure::{parse_blocks, BlockArena, ParseOutcome};
