#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The `field-mapper` binary with logging silenced.
pub fn field_mapper() -> Command {
    let mut cmd = Command::cargo_bin("field-mapper").expect("binary exists");
    cmd.env("RUST_LOG", "off")
        .env_remove("FIELD_MAPPER_API_URL")
        .env_remove("NEXT_PUBLIC_API_URL")
        .env_remove("FIELD_MAPPER_TOKEN");
    cmd
}

/// Scratch directory that holds sources, mapping files and exports.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Copies a fixture into the workspace so commands may rewrite it.
    pub fn copy_fixture(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::copy(fixture_path(name), &path).expect("copy fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}
