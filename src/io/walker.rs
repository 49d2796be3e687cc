use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collects the `.sql` files under a root, sorted so batch runs process
/// units in a stable order.
pub struct FileWalker {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl FileWalker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ignore_patterns: vec![],
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && self.should_process(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn should_process(&self, path: &Path) -> bool {
        let is_sql = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("sql"))
            .unwrap_or(false);
        if !is_sql {
            return false;
        }

        let path_str = path.to_string_lossy();
        !self
            .ignore_patterns
            .iter()
            .any(|pattern| path_str.contains(pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_only_sql_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("a.sql"), "SELECT 2").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let files = FileWalker::new(dir.path().to_path_buf()).walk().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.sql", "b.sql"]);
    }

    #[test]
    fn ignore_patterns_filter_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archived = dir.path().join("archived");
        fs::create_dir(&archived).unwrap();
        fs::write(archived.join("old.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("live.sql"), "SELECT 2").unwrap();

        let files = FileWalker::new(dir.path().to_path_buf())
            .with_ignore_patterns(vec!["archived".to_string()])
            .walk()
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("live.sql"));
    }
}
