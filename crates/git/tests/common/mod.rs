use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{Commit, Repository, Signature, Time};
use tempfile::TempDir;

/// Scratch repository whose commits have a fixed author and date.
pub struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn root(&self) -> PathBuf {
        std::path::absolute(self.dir.path()).unwrap()
    }

    /// Write `files`, delete `removed`, commit on HEAD; returns the hash.
    pub fn commit(&self, files: &[(&str, &str)], removed: &[&str], message: &str) -> String {
        let mut index = self.repo.index().unwrap();
        for (name, content) in files {
            let path = self.dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        for name in removed {
            fs::remove_file(self.dir.path().join(name)).unwrap();
            index.remove_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();

        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        // 2024-01-15 12:30:00 UTC, written as +01:00
        let sig = Signature::new("Jane Doe", "jane@example.com", &Time::new(1_705_321_800, 60)).unwrap();
        let parents: Vec<Commit> = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&Commit> = parents.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }
}

impl Fixture {
    /// Replace `name` with a symlink to `target` and stage it.
    #[cfg(unix)]
    pub fn symlink(&self, name: &str, target: &str) {
        let path = self.dir.path().join(name);
        if path.symlink_metadata().is_ok() {
            fs::remove_file(&path).unwrap();
        }
        std::os::unix::fs::symlink(target, &path).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}
