//! The analyze command: one file in, one report out; a directory fans out
//! to independent units, optionally in parallel. One failing unit never
//! aborts the batch.

use crate::config::AnalysisConfig;
use crate::errors::AnalyzeError;
use crate::io::{write_report, FileWalker};
use crate::pipeline::analyze_procedure;
use anyhow::{bail, Result};
use colored::Colorize;
use log::{debug, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub struct AnalyzeOptions {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub pretty: bool,
    pub basic: bool,
    pub jobs: usize,
    pub no_parallel: bool,
    pub ignore: Vec<String>,
}

/// Per-file result in batch mode.
pub struct UnitStatus {
    pub path: PathBuf,
    pub outcome: Result<()>,
}

pub fn run(options: AnalyzeOptions) -> Result<()> {
    let config = if options.basic {
        AnalysisConfig::basic()
    } else {
        AnalysisConfig::default()
    };

    if options.path.is_dir() {
        run_batch(&options, &config)
    } else {
        run_single(&options, &config)
    }
}

fn read_source(path: &Path) -> Result<String, AnalyzeError> {
    let bytes = fs::read(path).map_err(|source| AnalyzeError::UnreadableInput {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| AnalyzeError::UndecodableBytes {
        path: path.to_path_buf(),
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "procedure".to_string())
}

fn run_single(options: &AnalyzeOptions, config: &AnalysisConfig) -> Result<()> {
    let source = read_source(&options.path)?;
    let report = analyze_procedure(&source, Some(&file_stem(&options.path)), config)?;

    match &options.output {
        Some(path) => {
            write_report(&report, path, options.pretty)?;
            info!("wrote {}", path.display());
        }
        None => println!("{}", report.to_json(options.pretty)?),
    }
    Ok(())
}

fn analyze_unit(path: &Path, out_dir: &Path, options: &AnalyzeOptions, config: &AnalysisConfig) -> Result<()> {
    let source = read_source(path)?;
    let report = analyze_procedure(&source, Some(&file_stem(path)), config)?;
    let out_path = out_dir.join(format!("{}.json", file_stem(path)));
    write_report(&report, &out_path, options.pretty)?;
    debug!("{} -> {}", path.display(), out_path.display());
    Ok(())
}

fn run_batch(options: &AnalyzeOptions, config: &AnalysisConfig) -> Result<()> {
    let files = FileWalker::new(options.path.clone())
        .with_ignore_patterns(options.ignore.clone())
        .walk()?;
    if files.is_empty() {
        return Err(AnalyzeError::EmptyInput {
            path: options.path.clone(),
        }
        .into());
    }

    let out_dir = options
        .output
        .clone()
        .unwrap_or_else(|| options.path.clone());
    fs::create_dir_all(&out_dir).map_err(|source| AnalyzeError::ReportWrite {
        path: out_dir.clone(),
        source,
    })?;

    let analyze_one = |path: &PathBuf| UnitStatus {
        path: path.clone(),
        outcome: analyze_unit(path, &out_dir, options, config),
    };

    let statuses: Vec<UnitStatus> = if options.no_parallel {
        files.iter().map(analyze_one).collect()
    } else if options.jobs > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()?;
        pool.install(|| files.par_iter().map(analyze_one).collect())
    } else {
        files.par_iter().map(analyze_one).collect()
    };

    let mut failed = 0usize;
    for status in &statuses {
        match &status.outcome {
            Ok(()) => println!("{} {}", "ok".green(), status.path.display()),
            Err(e) => {
                failed += 1;
                println!("{} {}: {e:#}", "failed".red(), status.path.display());
            }
        }
    }
    info!("{} units, {} failed", statuses.len(), failed);

    if failed > 0 {
        bail!("{failed} of {} units failed", statuses.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(path: PathBuf, output: Option<PathBuf>) -> AnalyzeOptions {
        AnalyzeOptions {
            path,
            output,
            pretty: false,
            basic: false,
            jobs: 0,
            no_parallel: true,
            ignore: vec![],
        }
    }

    #[test]
    fn batch_writes_one_report_per_unit() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.sql"), "SELECT 1 FROM Orders").unwrap();
        fs::write(dir.path().join("two.sql"), "SELECT 2 FROM Customers").unwrap();

        run(options(
            dir.path().to_path_buf(),
            Some(out.path().to_path_buf()),
        ))
        .unwrap();

        assert!(out.path().join("one.json").exists());
        assert!(out.path().join("two.json").exists());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(options(dir.path().to_path_buf(), None)).unwrap_err();
        assert!(err.to_string().contains("no .sql files"));
    }

    #[test]
    fn undecodable_unit_fails_without_aborting_batch() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.sql"), "SELECT 1 FROM Orders").unwrap();
        fs::write(dir.path().join("bad.sql"), [0xff, 0xfe, 0x00]).unwrap();

        let err = run(options(
            dir.path().to_path_buf(),
            Some(out.path().to_path_buf()),
        ))
        .unwrap_err();

        assert!(err.to_string().contains("1 of 2 units failed"));
        assert!(out.path().join("good.json").exists());
    }
}
