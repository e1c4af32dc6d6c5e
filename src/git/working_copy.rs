//! Scratch clones of remote repositories.

use std::io;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::patch::FileSystem;

use super::{
    CommitIdentity, GitError, GitResult, RemoteUrl, git_command, git_commit_command, run, run_git,
    run_git_stdout,
};

/// A clone of a remote repository in a private temporary directory.
///
/// The directory is deleted when the value is dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    remote: RemoteUrl,
    branch: String,
    identity: CommitIdentity,
}

impl WorkingCopy {
    /// Shallow-clones `remote` with all branch tips and checks out `branch`.
    ///
    /// If the branch does not exist on the remote it is created from the
    /// default branch. Either way the worktree ends up on `branch`.
    pub async fn clone_and_checkout(
        remote: &RemoteUrl,
        branch: &str,
        identity: CommitIdentity,
    ) -> GitResult<Self> {
        let dir = TempDir::new()?;
        run_git(
            dir.path(),
            &["clone", "--depth", "1", "--no-single-branch", remote.expose(), "."],
        )
        .await?;

        let remote_ref = format!("refs/remotes/origin/{}", branch);
        let exists = git_command(dir.path())
            .args(["rev-parse", "--verify", "--quiet", &remote_ref])
            .output()
            .await?
            .status
            .success();

        if exists {
            run_git(dir.path(), &["checkout", branch]).await?;
        } else {
            debug!(remote = %remote, branch, "branch does not exist, creating it");
            run_git(dir.path(), &["checkout", "-b", branch]).await?;
        }

        Ok(WorkingCopy {
            dir,
            remote: remote.clone(),
            branch: branch.to_string(),
            identity,
        })
    }

    /// Shallow-clones a single branch or tag. Intended for reading.
    pub async fn clone_at_ref(remote: &RemoteUrl, reference: &str) -> GitResult<Self> {
        let dir = TempDir::new()?;
        let result = run_git(
            dir.path(),
            &[
                "clone",
                "--depth",
                "1",
                "--single-branch",
                "--branch",
                reference,
                remote.expose(),
                ".",
            ],
        )
        .await;

        match result {
            Ok(_) => Ok(WorkingCopy {
                dir,
                remote: remote.clone(),
                branch: reference.to_string(),
                identity: CommitIdentity::default(),
            }),
            Err(GitError::CommandFailed { stderr, .. })
                if stderr.contains("not found in upstream") =>
            {
                Err(GitError::RefNotFound {
                    refspec: reference.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Reads a file from `remote` at a branch or tag.
    pub async fn read_file_at_ref(
        remote: &RemoteUrl,
        reference: &str,
        path: &str,
    ) -> GitResult<String> {
        let copy = WorkingCopy::clone_at_ref(remote, reference).await?;
        copy.read_file(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GitError::FileNotFound {
                path: path.to_string(),
            },
            _ => GitError::Io(e),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Stages everything, commits with the configured identity and pushes
    /// the current branch to origin.
    ///
    /// Returns [`GitError::NoChanges`] when the tree is clean after staging.
    pub async fn commit_and_push(&self, message: &str) -> GitResult<()> {
        run_git(self.path(), &["add", "-A"]).await?;

        let status = run_git_stdout(self.path(), &["status", "--porcelain"]).await?;
        if status.is_empty() {
            return Err(GitError::NoChanges);
        }

        run(
            git_commit_command(self.path(), &self.identity),
            &["commit", "-m", message],
        )
        .await?;

        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        run_git(self.path(), &["push", "origin", &refspec]).await?;

        info!(remote = %self.remote, branch = %self.branch, "pushed commit");
        Ok(())
    }

    /// Creates a lightweight tag at the tip of `branch` on `remote` and
    /// pushes it.
    pub async fn create_tag(remote: &RemoteUrl, branch: &str, tag: &str) -> GitResult<()> {
        let copy = WorkingCopy::clone_at_ref(remote, branch).await?;
        run_git(copy.path(), &["tag", tag]).await?;

        let refspec = format!("refs/tags/{}", tag);
        run_git(copy.path(), &["push", "origin", &refspec]).await?;

        info!(remote = %remote, branch, tag, "pushed tag");
        Ok(())
    }

    /// Force-pushes `source_branch` of `source` to `target_branch` of
    /// `target`.
    ///
    /// The source branch is cloned with full history: the target does not
    /// share the shallow boundary, so a shallow push would be rejected.
    pub async fn push_across_remotes(
        source: &RemoteUrl,
        source_branch: &str,
        target: &RemoteUrl,
        target_branch: &str,
    ) -> GitResult<()> {
        let dir = TempDir::new()?;
        run_git(
            dir.path(),
            &[
                "clone",
                "--single-branch",
                "--branch",
                source_branch,
                source.expose(),
                ".",
            ],
        )
        .await?;

        run_git(dir.path(), &["remote", "add", "target", target.expose()]).await?;

        let refspec = format!("HEAD:refs/heads/{}", target_branch);
        run_git(dir.path(), &["push", "--force", "target", &refspec]).await?;

        info!(
            source = %source,
            source_branch,
            target = %target,
            target_branch,
            "pushed branch across remotes"
        );
        Ok(())
    }
}

impl FileSystem for WorkingCopy {
    fn read_file(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.path().join(path))
    }

    fn write_file(&mut self, path: &str, content: &str) -> io::Result<()> {
        std::fs::write(self.path().join(path), content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .current_dir(dir)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .args(["-c", "user.name=Test", "-c", "user.email=test@test.com"])
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

    /// A bare "remote" with `master` and `develop` branches.
    fn create_remote() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let bare = temp.path().join("remote.git");
        let work = temp.path().join("seed");
        std::fs::create_dir_all(&bare).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        git(&bare, &["init", "--bare"]);
        git(&work, &["init"]);
        std::fs::write(work.join("release.yaml"), "metalctl:\n  tag: v0.8.0\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-m", "Initial commit"]);
        git(&work, &["push", bare.to_str().unwrap(), "HEAD:refs/heads/master"]);
        git(&work, &["push", bare.to_str().unwrap(), "HEAD:refs/heads/develop"]);
        git(&work, &["tag", "v0.8.0"]);
        git(&work, &["push", bare.to_str().unwrap(), "refs/tags/v0.8.0"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        (temp, bare)
    }

    fn remote(bare: &Path) -> RemoteUrl {
        RemoteUrl::new(bare.to_str().unwrap())
    }

    #[tokio::test]
    async fn checks_out_existing_branch() {
        let (_temp, bare) = create_remote();
        let copy = WorkingCopy::clone_and_checkout(&remote(&bare), "develop", CommitIdentity::default())
            .await
            .unwrap();

        assert_eq!(git(copy.path(), &["rev-parse", "--abbrev-ref", "HEAD"]), "develop");
        assert_eq!(
            copy.read_file("release.yaml").unwrap(),
            "metalctl:\n  tag: v0.8.0\n"
        );
    }

    #[tokio::test]
    async fn creates_missing_branch() {
        let (_temp, bare) = create_remote();
        let copy = WorkingCopy::clone_and_checkout(
            &remote(&bare),
            "auto-generate/v0.15.1",
            CommitIdentity::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            git(copy.path(), &["rev-parse", "--abbrev-ref", "HEAD"]),
            "auto-generate/v0.15.1"
        );
    }

    #[tokio::test]
    async fn clean_tree_reports_no_changes() {
        let (_temp, bare) = create_remote();
        let copy = WorkingCopy::clone_and_checkout(&remote(&bare), "develop", CommitIdentity::default())
            .await
            .unwrap();

        let err = copy.commit_and_push("nothing").await.unwrap_err();
        assert!(matches!(err, GitError::NoChanges));
    }

    #[tokio::test]
    async fn commits_and_pushes_with_identity() {
        let (_temp, bare) = create_remote();
        let identity = CommitIdentity {
            name: "metal-robot".to_string(),
            email: "info@metal-stack.io".to_string(),
        };
        let mut copy = WorkingCopy::clone_and_checkout(&remote(&bare), "develop", identity)
            .await
            .unwrap();

        copy.write_file("release.yaml", "metalctl:\n  tag: v0.8.1\n").unwrap();
        copy.commit_and_push("Bump metalctl to version v0.8.1")
            .await
            .unwrap();

        assert_eq!(
            git(&bare, &["log", "-1", "--format=%s|%an|%ae", "develop"]),
            "Bump metalctl to version v0.8.1|metal-robot|info@metal-stack.io"
        );
        assert_eq!(
            git(&bare, &["show", "develop:release.yaml"]),
            "metalctl:\n  tag: v0.8.1"
        );
        assert_eq!(git(&bare, &["log", "-1", "--format=%s", "master"]), "Initial commit");
    }

    #[tokio::test]
    async fn new_branch_is_pushed() {
        let (_temp, bare) = create_remote();
        let mut copy = WorkingCopy::clone_and_checkout(
            &remote(&bare),
            "auto-generate/v0.15.1",
            CommitIdentity::default(),
        )
        .await
        .unwrap();

        copy.write_file("version.py", "VERSION = 'v0.15.1'").unwrap();
        copy.commit_and_push("Bump metal-api to version v0.15.1")
            .await
            .unwrap();

        assert_eq!(
            git(&bare, &["show", "auto-generate/v0.15.1:version.py"]),
            "VERSION = 'v0.15.1'"
        );
    }

    #[tokio::test]
    async fn reads_file_at_tag() {
        let (_temp, bare) = create_remote();
        let content = WorkingCopy::read_file_at_ref(&remote(&bare), "v0.8.0", "release.yaml")
            .await
            .unwrap();
        assert_eq!(content, "metalctl:\n  tag: v0.8.0\n");

        let err = WorkingCopy::read_file_at_ref(&remote(&bare), "v0.8.0", "missing.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_ref_is_reported() {
        let (_temp, bare) = create_remote();
        let err = WorkingCopy::clone_at_ref(&remote(&bare), "v9.9.9")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::RefNotFound { .. }));
    }

    #[tokio::test]
    async fn tags_branch_tip() {
        let (_temp, bare) = create_remote();
        WorkingCopy::create_tag(&remote(&bare), "develop", "v0.9.0")
            .await
            .unwrap();

        assert_eq!(
            git(&bare, &["rev-parse", "v0.9.0^{commit}"]),
            git(&bare, &["rev-parse", "develop"])
        );
    }

    #[tokio::test]
    async fn pushes_branch_to_other_remote() {
        let (_source_temp, source) = create_remote();
        let (_target_temp, target) = create_remote();

        let seed = TempDir::new().unwrap();
        git(seed.path(), &["clone", source.to_str().unwrap(), "."]);
        git(seed.path(), &["checkout", "-b", "feature"]);
        std::fs::write(seed.path().join("fork.txt"), "from fork").unwrap();
        git(seed.path(), &["add", "."]);
        git(seed.path(), &["commit", "-m", "Fork change"]);
        git(seed.path(), &["push", "origin", "feature"]);

        WorkingCopy::push_across_remotes(&remote(&source), "feature", &remote(&target), "fork-build/7")
            .await
            .unwrap();

        assert_eq!(git(&target, &["show", "fork-build/7:fork.txt"]), "from fork");
    }
}
