use std::fs;
use std::path::{Path, PathBuf};

use intake_core::FileEvent;

use super::types::ProcessedSet;

/// Regular files directly inside `dir`, sorted by path.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Files present now that have not been dispatched yet.
pub fn new_files(dir: &Path, processed: &ProcessedSet) -> std::io::Result<Vec<FileEvent>> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|p| !processed.contains(p))
        .map(FileEvent::from_path)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_regular_files_sorted() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("a.log"), "").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        let files = list_files(tmp.path()).unwrap();
        assert_eq!(files, vec![tmp.path().join("a.log"), tmp.path().join("b.txt")]);
    }

    #[test]
    fn processed_paths_are_excluded() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("a.log"), "").unwrap();
        fs::write(tmp.path().join("b.log"), "").unwrap();
        let mut processed = ProcessedSet::new();
        processed.insert(tmp.path().join("a.log"));
        let new = new_files(tmp.path(), &processed).unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].name, "b.log");
    }

    #[test]
    fn missing_dir_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(list_files(&tmp.path().join("gone")).is_err());
    }
}
