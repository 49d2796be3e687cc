use std::path::PathBuf;
use thiserror::Error;

/// Fatal library errors. Malformed SQL is never fatal; these cover the
/// cases where there is nothing to analyze or nowhere to put the result.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {}: {source}", path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", path.display())]
    UndecodableBytes { path: PathBuf },

    #[error("failed to write report to {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no .sql files found under {}", path.display())]
    EmptyInput { path: PathBuf },
}
