pub mod walker;
pub mod writer;

pub use walker::FileWalker;
pub use writer::write_report;
