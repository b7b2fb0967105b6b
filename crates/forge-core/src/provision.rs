//! Upstream source tree provisioning.

use std::path::PathBuf;
use std::sync::Arc;

use forge_host::CommandRunner;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DirtyTreePolicy, RepoSpec};
use crate::error::ProvisionError;
use crate::git;

/// What provisioning did to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub dir: PathBuf,
    /// `false` when an existing tree was reused.
    pub cloned: bool,
    pub pinned_ref: String,
    /// HEAD after checkout, when it could be read.
    pub head: Option<String>,
    /// Modified tracked files found in a pre-existing tree.
    pub local_changes: Vec<String>,
}

/// Clones the upstream tree if absent and pins it to a ref.
pub struct SourceTreeProvisioner {
    runner: Arc<dyn CommandRunner>,
    dirty_tree: DirtyTreePolicy,
}

impl SourceTreeProvisioner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            dirty_tree: DirtyTreePolicy::default(),
        }
    }

    pub fn with_dirty_tree_policy(mut self, policy: DirtyTreePolicy) -> Self {
        self.dirty_tree = policy;
        self
    }

    /// Ensure `spec.dir` holds the upstream tree checked out at `spec.pinned_ref`.
    ///
    /// An existing directory is never re-cloned or inspected beyond the
    /// optional dirty check; the checkout runs either way.
    pub fn provision(&self, spec: &RepoSpec) -> Result<ProvisionOutcome, ProvisionError> {
        info!("Setting up Godot repository...");
        let runner = self.runner.as_ref();

        let mut local_changes = Vec::new();
        let cloned = if spec.dir.exists() {
            if !spec.dir.is_dir() {
                return Err(ProvisionError::NotADirectory {
                    path: spec.dir.clone(),
                });
            }
            info!(dir = ?spec.dir, "Upstream tree present, skipping clone");
            local_changes = self.check_dirty(spec)?;
            false
        } else {
            info!(url = %spec.url, dir = ?spec.dir, "Cloning upstream tree");
            git::clone(runner, &spec.url, &spec.dir)
                .map_err(|source| ProvisionError::Git {
                    action: "clone",
                    source,
                })?;
            true
        };

        info!(pinned_ref = %spec.pinned_ref, "Checking out pinned ref");
        git::checkout(runner, &spec.dir, &spec.pinned_ref).map_err(|source| {
            ProvisionError::Git {
                action: "checkout",
                source,
            }
        })?;

        let head = match git::capture_head_sha(runner, &spec.dir) {
            Ok(sha) => Some(sha),
            Err(e) => {
                warn!(error = %e, "Could not read upstream HEAD");
                None
            }
        };

        Ok(ProvisionOutcome {
            dir: spec.dir.clone(),
            cloned,
            pinned_ref: spec.pinned_ref.clone(),
            head,
            local_changes,
        })
    }

    fn check_dirty(&self, spec: &RepoSpec) -> Result<Vec<String>, ProvisionError> {
        if self.dirty_tree == DirtyTreePolicy::Ignore {
            return Ok(Vec::new());
        }

        let changes = match git::tracked_changes(self.runner.as_ref(), &spec.dir) {
            Ok(changes) => changes,
            Err(source) if self.dirty_tree == DirtyTreePolicy::Refuse => {
                return Err(ProvisionError::Git {
                    action: "status",
                    source,
                });
            }
            Err(e) => {
                warn!(dir = ?spec.dir, error = %e, "Could not inspect upstream tree for local changes");
                return Ok(Vec::new());
            }
        };

        if changes.is_empty() {
            return Ok(changes);
        }

        match self.dirty_tree {
            DirtyTreePolicy::Refuse => Err(ProvisionError::DirtyTree {
                path: spec.dir.clone(),
                changes,
            }),
            _ => {
                warn!(
                    dir = ?spec.dir,
                    files = ?changes,
                    "Upstream tree has local modifications to tracked files"
                );
                Ok(changes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_host::fakes::{Reply, ScriptedRunner};

    fn spec(dir: PathBuf) -> RepoSpec {
        RepoSpec {
            url: "https://github.com/godotengine/godot.git".to_string(),
            pinned_ref: "3.x".to_string(),
            dir,
        }
    }

    fn git_ok() -> ScriptedRunner {
        ScriptedRunner::new()
            .on_with("git", &["clone"], Reply::ok(""), |spec| {
                std::fs::create_dir_all(&spec.args[2]).unwrap();
            })
            .on("git", &["checkout"], Reply::ok(""))
            .on("git", &["rev-parse", "HEAD"], Reply::ok("0123abcd\n"))
            .on("git", &["status"], Reply::ok(""))
    }

    #[test]
    fn test_clones_when_absent() {
        let ws = tempfile::tempdir().unwrap();
        let runner = Arc::new(git_ok());
        let provisioner = SourceTreeProvisioner::new(runner.clone());

        let outcome = provisioner.provision(&spec(ws.path().join("godot"))).unwrap();
        assert!(outcome.cloned);
        assert_eq!(outcome.head.as_deref(), Some("0123abcd"));
        assert_eq!(runner.count("git", &["clone"]), 1);
        assert_eq!(runner.count("git", &["checkout", "3.x"]), 1);
        // no dirty check for a fresh clone
        assert_eq!(runner.count("git", &["status"]), 0);
    }

    #[test]
    fn test_existing_tree_is_not_recloned_but_checked_out() {
        let ws = tempfile::tempdir().unwrap();
        let dir = ws.path().join("godot");
        std::fs::create_dir(&dir).unwrap();
        let runner = Arc::new(git_ok());

        let outcome = SourceTreeProvisioner::new(runner.clone())
            .provision(&spec(dir.clone()))
            .unwrap();
        assert!(!outcome.cloned);
        assert_eq!(runner.count("git", &["clone"]), 0);

        let checkout = runner
            .calls()
            .into_iter()
            .find(|c| c.matches("git", &["checkout"]))
            .unwrap();
        assert_eq!(checkout.cwd, Some(dir));
    }

    #[test]
    fn test_clone_failure_is_fatal_without_retry() {
        let ws = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().on("git", &["clone"], Reply::fail(128, "could not resolve host")),
        );

        let err = SourceTreeProvisioner::new(runner.clone())
            .provision(&spec(ws.path().join("godot")))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Git { action: "clone", .. }));
        assert_eq!(runner.count("git", &["clone"]), 1);
        assert_eq!(runner.count("git", &["checkout"]), 0);
    }

    #[test]
    fn test_checkout_failure_is_fatal() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("git", &["status"], Reply::ok(""))
                .on("git", &["checkout"], Reply::fail(1, "pathspec '3.x' did not match")),
        );

        let err = SourceTreeProvisioner::new(runner)
            .provision(&spec(ws.path().join("godot")))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Git { action: "checkout", .. }));
        assert!(err.to_string().contains("did not match"));
    }

    #[test]
    fn test_file_in_place_of_tree() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("godot"), "").unwrap();
        let runner = Arc::new(git_ok());

        let err = SourceTreeProvisioner::new(runner.clone())
            .provision(&spec(ws.path().join("godot")))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotADirectory { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_dirty_tree_refused() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("git", &["status"], Reply::ok(" M core/object.cpp\n"))
                .on("git", &["checkout"], Reply::ok("")),
        );

        let err = SourceTreeProvisioner::new(runner.clone())
            .with_dirty_tree_policy(DirtyTreePolicy::Refuse)
            .provision(&spec(ws.path().join("godot")))
            .unwrap_err();
        match err {
            ProvisionError::DirtyTree { changes, .. } => {
                assert_eq!(changes, vec!["core/object.cpp"])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.count("git", &["checkout"]), 0);
    }

    #[test]
    fn test_dirty_tree_warned_by_default() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("git", &["status"], Reply::ok(" M core/object.cpp\n"))
                .on("git", &["checkout"], Reply::ok("")),
        );

        let outcome = SourceTreeProvisioner::new(runner)
            .provision(&spec(ws.path().join("godot")))
            .unwrap();
        assert_eq!(outcome.local_changes, vec!["core/object.cpp"]);
        assert_eq!(outcome.head, None);
    }

    #[test]
    fn test_status_failure_only_warns_by_default() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("git", &["status"], Reply::fail(128, "fatal: not a git repository"))
                .on("git", &["checkout"], Reply::ok("")),
        );

        let outcome = SourceTreeProvisioner::new(runner.clone())
            .provision(&spec(ws.path().join("godot")))
            .unwrap();
        assert!(outcome.local_changes.is_empty());
        assert_eq!(runner.count("git", &["checkout", "3.x"]), 1);
    }

    #[test]
    fn test_status_failure_is_fatal_when_refusing() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("git", &["status"], Reply::fail(128, "fatal: not a git repository"))
                .on("git", &["checkout"], Reply::ok("")),
        );

        let err = SourceTreeProvisioner::new(runner.clone())
            .with_dirty_tree_policy(DirtyTreePolicy::Refuse)
            .provision(&spec(ws.path().join("godot")))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Git { action: "status", .. }));
        assert_eq!(runner.count("git", &["checkout"]), 0);
    }

    #[test]
    fn test_ignore_policy_skips_status() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir(ws.path().join("godot")).unwrap();
        let runner = Arc::new(git_ok());

        SourceTreeProvisioner::new(runner.clone())
            .with_dirty_tree_policy(DirtyTreePolicy::Ignore)
            .provision(&spec(ws.path().join("godot")))
            .unwrap();
        assert_eq!(runner.count("git", &["status"]), 0);
    }
}
