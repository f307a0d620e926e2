//! Test data and tree helpers used by the integration tests

use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros - highly compressible
    Zeros,
    /// Deterministic pseudo-random bytes - incompressible
    Random,
    /// Repeated lines of text, like a typical document
    Text,
}

/// Generate `size` bytes following `pattern`
///
/// The random pattern is seeded so every call with the same size yields the
/// same bytes.
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Random => {
            let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
            (0..size)
                .map(|_| {
                    // xorshift64
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 24) as u8
                })
                .collect()
        }
        TestDataPattern::Text => {
            let line = b"the quick brown fox jumps over the lazy dog\n";
            line.iter().copied().cycle().take(size).collect()
        }
    }
}

/// Create a file named `name` inside `temp_dir`
pub fn create_test_file(
    temp_dir: &TempDir,
    name: &str,
    size: usize,
    pattern: TestDataPattern,
) -> PathBuf {
    let file_path = temp_dir.path().join(name);
    write_file(&file_path, &generate_test_data(size, pattern));
    file_path
}

/// Write `contents` to `path`, creating parent directories
pub fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, contents).expect("Failed to write test file");
}

/// Populate `root` with `(relative path, contents)` pairs
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (relative, contents) in files {
        write_file(&root.join(relative), contents);
    }
}

/// Set the modification time of `path` to `secs` seconds after the epoch
pub fn set_modified(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0))
        .expect("Failed to set modification time");
}

/// Number of stored objects under a provider root
pub fn count_objects(store: &Path) -> usize {
    let objects = store.join("objects");
    if !objects.exists() {
        return 0;
    }
    walkdir::WalkDir::new(objects)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}

/// Relative paths of every regular file under `root`, sorted
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
