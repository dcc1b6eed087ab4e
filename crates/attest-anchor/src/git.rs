//! Git subprocess adapter for the anchor repository.
//!
//! Every call shells out to the `git` binary in the anchor directory on a
//! short-lived current-thread runtime and is bounded by `tokio::time::timeout`.
//! The child is spawned with `kill_on_drop`, so an expired deadline kills it.
//! Credential prompts are disabled: a push that needs interactive auth fails
//! instead of waiting out the deadline.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use attest_contracts::{AttestError, AttestResult};
use attest_core::AnchorRepository;

/// Captured result of one finished `git` invocation.
pub(crate) struct GitOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// `AnchorRepository` backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    work_tree: PathBuf,
    author_name: Option<String>,
    author_email: Option<String>,
    timeout: Duration,
}

impl GitCli {
    pub fn new(work_tree: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            work_tree: work_tree.into(),
            author_name: None,
            author_email: None,
            timeout,
        }
    }

    /// Commit as this identity without touching the repository's config.
    pub fn with_author(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.author_name = name;
        self.author_email = email;
        self
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// Run `git <args>` and return its output regardless of exit status.
    pub(crate) fn run(&self, args: &[&str]) -> AttestResult<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.work_tree);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        if let Some(name) = &self.author_name {
            cmd.arg("-c").arg(format!("user.name={name}"));
        }
        if let Some(email) = &self.author_email {
            cmd.arg("-c").arg(format!("user.email={email}"));
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(work_tree = %self.work_tree.display(), args = ?args, "running git");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AttestError::Git {
                reason: format!("failed to start git runtime: {e}"),
            })?;

        let output = runtime
            .block_on(async { tokio::time::timeout(self.timeout, cmd.output()).await })
            .map_err(|_| {
                warn!(args = ?args, timeout_secs = self.timeout.as_secs(), "git timed out, killed");
                AttestError::Timeout {
                    operation: format!("git {}", args.join(" ")),
                    timeout_secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| AttestError::Git {
                reason: format!("failed to run git {}: {}", args.join(" "), e),
            })?;

        Ok(GitOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run `git <args>` and fail unless it exits successfully.
    pub(crate) fn run_ok(&self, args: &[&str]) -> AttestResult<String> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(AttestError::Git {
                reason: format!(
                    "git {} exited with {}: {}",
                    args.join(" "),
                    output.status,
                    output.stderr.trim()
                ),
            })
        }
    }
}

fn path_arg(file: &Path) -> AttestResult<&str> {
    file.to_str().ok_or_else(|| AttestError::Git {
        reason: format!("path '{}' is not valid UTF-8", file.display()),
    })
}

impl AnchorRepository for GitCli {
    fn current_commit(&self) -> AttestResult<Option<String>> {
        let output = self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if output.status.success() {
            Ok(Some(output.stdout.trim().to_string()))
        } else {
            // An unborn branch: the repository has no commits yet.
            debug!(work_tree = %self.work_tree.display(), "no HEAD commit");
            Ok(None)
        }
    }

    fn commit_file(&self, file: &Path, message: &str) -> AttestResult<String> {
        let file = path_arg(file)?;
        self.run_ok(&["add", "--", file])?;
        self.run_ok(&["commit", "-m", message, "--", file])?;
        let commit = self.run_ok(&["rev-parse", "HEAD"])?.trim().to_string();
        info!(file, commit = %commit, "anchor file committed");
        Ok(commit)
    }

    fn contains_commit(&self, commit: &str) -> AttestResult<bool> {
        let object = format!("{commit}^{{commit}}");
        Ok(self.run(&["cat-file", "-e", &object])?.status.success())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> AttestResult<bool> {
        let output = self.run(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        // 0 = ancestor, 1 = not an ancestor, anything else is an error.
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(AttestError::Git {
                reason: format!(
                    "git merge-base --is-ancestor {} {} failed: {}",
                    ancestor,
                    descendant,
                    output.stderr.trim()
                ),
            }),
        }
    }

    fn introducing_commit(&self, file: &Path) -> AttestResult<Option<String>> {
        let file = path_arg(file)?;
        if self.current_commit()?.is_none() {
            return Ok(None);
        }
        let stdout = self.run_ok(&[
            "log",
            "--diff-filter=A",
            "--format=%H",
            "--reverse",
            "--",
            file,
        ])?;
        Ok(stdout.lines().next().map(|l| l.trim().to_string()))
    }

    fn push(&self, remote: &str, branch: &str) -> AttestResult<()> {
        self.run_ok(&["push", remote, branch])?;
        info!(remote, branch, "anchor repository pushed");
        Ok(())
    }
}
