use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::evaluator::{evaluate, Decision, EvaluationContext};
use crate::policy::schema::PolicyFile;

/// An immutable, atomically-published view of every policy file that
/// parsed and validated successfully. Replaced by whole-object
/// substitution; a snapshot already handed to a caller is never
/// mutated.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    files: BTreeMap<PathBuf, PolicyFile>,
}

impl PolicySnapshot {
    pub fn stats(&self) -> Stats {
        Stats {
            policy_files: self.files.len(),
            total_agents: self.files.values().map(PolicyFile::total_agents).sum(),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &PolicyFile)> {
        self.files.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Multi-file resolution: consults files in path-sorted order,
    /// returns the first decision that is `allow` or `require_approval`.
    /// If none qualify, returns the last file's decision so the caller
    /// gets a concrete deny reason.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Decision {
        if self.files.is_empty() {
            return Decision {
                allow: false,
                reason: "no policies loaded".to_string(),
                version: 0,
                require_approval: false,
                approval_context: None,
            };
        }

        let mut last: Option<Decision> = None;
        for file in self.files.values() {
            let decision = evaluate(file, ctx);
            if decision.allow || decision.require_approval {
                return decision;
            }
            last = Some(decision);
        }
        last.expect("non-empty snapshot always produces a decision")
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Stats {
    pub policy_files: usize,
    pub total_agents: usize,
}

/// Owns the current snapshot and the directory it's loaded from.
/// Cloning a `PolicyStore` handle shares the same underlying snapshot
/// slot (it's an `Arc<RwLock<_>>`): a reader clones the
/// `Arc<PolicySnapshot>` out of the lock and holds that for the life of
/// one evaluation, never re-taking the lock mid-evaluation.
#[derive(Clone)]
pub struct PolicyStore {
    dir: PathBuf,
    snapshot: Arc<RwLock<Arc<PolicySnapshot>>>,
}

impl PolicyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PolicyStore {
            dir: dir.into(),
            snapshot: Arc::new(RwLock::new(Arc::new(PolicySnapshot::default()))),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A reference to the snapshot current at the moment of the call.
    /// Hold onto the returned `Arc` for the life of one evaluation;
    /// a concurrent reload will not mutate it out from under you.
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.snapshot.read().expect("snapshot lock poisoned").clone()
    }

    /// Enumerates `*.yaml`/`*.yml` in the configured directory
    /// (non-recursive), parses and validates each, and publishes a new
    /// snapshot if at least one file succeeded. A directory where every
    /// file fails retains the previous snapshot.
    pub fn load(&self) -> Stats {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = %self.dir.display(), error = %err, "policy directory unreadable");
                return self.current().stats();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut loaded = BTreeMap::new();
        let mut any_file_present = false;
        for path in paths {
            any_file_present = true;
            match fs::read_to_string(&path) {
                Ok(contents) => match PolicyFile::parse_and_validate(&contents) {
                    Ok(file) => {
                        loaded.insert(path, file);
                    }
                    Err(err) => {
                        tracing::error!(file = %path.display(), error = %err, "policy file failed validation");
                    }
                },
                Err(err) => {
                    tracing::error!(file = %path.display(), error = %err, "failed to read policy file");
                }
            }
        }

        if loaded.is_empty() {
            if any_file_present {
                tracing::warn!(dir = %self.dir.display(), "every policy file failed to load, retaining previous snapshot");
            }
            return self.current().stats();
        }

        let snapshot = Arc::new(PolicySnapshot { files: loaded });
        let stats = snapshot.stats();
        *self.snapshot.write().expect("snapshot lock poisoned") = snapshot;
        tracing::info!(policy_files = stats.policy_files, total_agents = stats.total_agents, "policy snapshot published");
        stats
    }

    pub fn stats(&self) -> Stats {
        self.current().stats()
    }
}
