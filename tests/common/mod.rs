//! Common test utilities

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Create a temporary directory for testing
#[allow(dead_code)] // Test utility for integration tests
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// In-memory terminal stream shared between the test and the sink.
#[derive(Clone, Default)]
#[allow(dead_code)] // Test utility for integration tests
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)] // Test utility for integration tests
impl SharedBuffer {
    pub fn boxed(&self) -> Box<dyn Write + Send> {
        Box::new(self.clone())
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().expect("buffer lock").clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.bytes()).expect("terminal output is UTF-8")
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parse every line of a log file as JSON, failing on any malformed line.
#[allow(dead_code)] // Test utility for integration tests
pub fn read_json_lines(path: &Path) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    assert!(
        content.is_empty() || content.ends_with('\n'),
        "{} ends with a truncated line",
        path.display()
    );
    content
        .lines()
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("Invalid JSON line {line:?} in {}: {e}", path.display()))
        })
        .collect()
}

/// Assert a parsed record carries the required keys.
#[allow(dead_code)] // Test utility for integration tests
pub fn assert_required_keys(record: &serde_json::Value) {
    for key in ["level", "time", "message"] {
        assert!(record.get(key).is_some(), "record {record} is missing {key}");
    }
    let time = record["time"].as_str().expect("time is a string");
    chrono::DateTime::parse_from_rfc3339(time).expect("time is RFC 3339");
}

/// Regular files in `dir`, sorted by name.
#[allow(dead_code)] // Test utility for integration tests
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("Failed to list directory")
        .map(|entry| entry.expect("directory entry").path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

#[allow(dead_code)] // Test utility for integration tests
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).expect("Failed to stat file").len()
}
