use crate::errors::AnalyzeError;
use crate::report::AnalysisReport;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write a report atomically: serialize into a temporary file in the
/// destination directory, then rename over the target. A crash mid-write
/// never leaves a partial report behind.
pub fn write_report(report: &AnalysisReport, path: &Path, pretty: bool) -> Result<()> {
    let json = report
        .to_json(pretty)
        .context("failed to serialize report")?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|source| AnalyzeError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })?;

    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .map_err(|source| AnalyzeError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })?;

    tmp.persist(path)
        .map_err(|e| AnalyzeError::ReportWrite {
            path: path.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_trailing_newline_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        write_report(&AnalysisReport::default(), &out, false).unwrap();
        let body = std::fs::read_to_string(&out).unwrap();
        assert!(body.ends_with('\n'));
        assert!(serde_json::from_str::<serde_json::Value>(&body).is_ok());
    }

    #[test]
    fn overwrites_existing_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.json");
        std::fs::write(&out, "stale").unwrap();
        write_report(&AnalysisReport::default(), &out, true).unwrap();
        let body = std::fs::read_to_string(&out).unwrap();
        assert!(!body.contains("stale"));
    }
}
