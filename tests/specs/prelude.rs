//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for testing corral CLI behavior.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub use assert_cmd::prelude::*;
pub use predicates;
pub use predicates::prelude::PredicateBooleanExt;
use std::path::Path;
use std::process::Command;

/// Returns a Command configured to run the corral binary with a clean
/// environment.
pub fn corral_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("corral"));
    cmd.env_remove("CORRAL_CONFIG").env_remove("CORRAL_LOG");
    cmd
}

/// A temporary directory marked as a git root, so config discovery stops
/// inside it.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the workspace.
    pub fn file(&self, name: &str, content: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}
