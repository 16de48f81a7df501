//! Shared testing utilities for dve-group-cli tests.

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SESSION_FIXTURE: &str = include_str!("../fixtures/session.tcl");
const GROUPS_FIXTURE: &str = include_str!("../fixtures/groups.yaml");

/// Isolated working directory holding a session file and a group configuration.
#[allow(dead_code)]
pub struct TestContext {
    root: TempDir,
}

#[allow(dead_code)]
impl TestContext {
    /// Create a new environment seeded with the fixture files.
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory for tests");
        fs::write(root.path().join("session.tcl"), SESSION_FIXTURE)
            .expect("Failed to write session fixture");
        fs::write(root.path().join("groups.yaml"), GROUPS_FIXTURE)
            .expect("Failed to write config fixture");
        Self { root }
    }

    pub fn work_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    pub fn session(&self) -> PathBuf {
        self.path("session.tcl")
    }

    pub fn config(&self) -> PathBuf {
        self.path("groups.yaml")
    }

    /// Replace the group configuration with `content`.
    pub fn write_config(&self, content: &str) {
        fs::write(self.config(), content).expect("Failed to write config");
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).expect("Failed to read output")
    }

    /// Build a command for the compiled binary, run inside the work directory
    /// with `DESIGN_TOP` set.
    pub fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("dve-group-cli").expect("Failed to locate dve-group-cli binary");
        cmd.current_dir(self.work_dir()).env("DESIGN_TOP", "tb.dut");
        cmd
    }
}
