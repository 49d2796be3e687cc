pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod errors;
pub mod io;
pub mod lexer;
pub mod parse;
pub mod pipeline;
pub mod report;

pub use config::{AnalysisConfig, Thresholds};
pub use errors::AnalyzeError;
pub use pipeline::analyze_procedure;
pub use report::AnalysisReport;
