//! Local bare repositories standing in for GitHub remotes in tests.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Runs git synchronously and returns its trimmed stdout. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .args(["-c", "user.name=Test", "-c", "user.email=test@test.com"])
        .args(["-c", "init.defaultBranch=master"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A directory of bare repositories named `<repo>.git`.
pub struct Remotes {
    dir: TempDir,
}

impl Remotes {
    pub fn new() -> Self {
        Remotes {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn bare(&self, repo: &str) -> PathBuf {
        self.dir.path().join(format!("{}.git", repo))
    }

    /// Creates `repo` with one commit holding `files` on `master` and on
    /// every branch in `branches`.
    pub fn create(&self, repo: &str, files: &[(&str, &str)], branches: &[&str]) -> PathBuf {
        let bare = self.bare(repo);
        let seed = self.dir.path().join(format!("{}.seed", repo));
        std::fs::create_dir_all(&bare).unwrap();
        std::fs::create_dir_all(&seed).unwrap();

        git(&bare, &["init", "--bare"]);
        git(&seed, &["init"]);
        for (path, content) in files {
            let file = seed.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(file, content).unwrap();
        }
        git(&seed, &["add", "."]);
        git(&seed, &["commit", "-m", "Initial commit"]);
        let target = bare.to_str().unwrap();
        git(&seed, &["push", target, "HEAD:refs/heads/master"]);
        for branch in branches {
            git(&seed, &["push", target, &format!("HEAD:refs/heads/{}", branch)]);
        }
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        bare
    }

    /// Tags the tip of `master` of `repo` with `tag`.
    pub fn tag(&self, repo: &str, tag: &str) {
        git(&self.bare(repo), &["tag", tag, "master"]);
    }

    /// Content of `path` at `rev` (branch, tag or commit).
    pub fn show(&self, repo: &str, rev: &str, path: &str) -> String {
        git(&self.bare(repo), &["show", &format!("{}:{}", rev, path)])
    }

    /// Subject of the newest commit on `branch`.
    pub fn subject(&self, repo: &str, branch: &str) -> String {
        git(&self.bare(repo), &["log", "-1", "--format=%s", branch])
    }

    pub fn commit_count(&self, repo: &str, branch: &str) -> usize {
        git(&self.bare(repo), &["rev-list", "--count", branch])
            .parse()
            .unwrap()
    }

    pub fn has_ref(&self, repo: &str, reference: &str) -> bool {
        Command::new("git")
            .current_dir(self.bare(repo))
            .args(["rev-parse", "--verify", "--quiet", reference])
            .output()
            .unwrap()
            .status
            .success()
    }
}
