//! Destination conflict resolution.
//!
//! The resolver decides what happens when a proposed destination is taken,
//! either by a file already on disk or by an earlier result of the same run.
//! It keeps its own allocation table for the run, so two candidates headed for
//! the same name never end up with the same final path under `sequential`.

use crate::plan::{Disposition, Plan, SkipReason};
use crate::prompt::{Prompt, PromptError};
use crate::rules::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Policy for taken destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Overwrite,
    #[default]
    Sequential,
    Ask,
    Skip,
}

/// Answer to a per-item conflict question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    Rename,
    Skip,
}

type ExistenceCheck = Box<dyn Fn(&Path) -> bool>;

pub struct ConflictResolver {
    policy: DuplicatePolicy,
    allocated: HashSet<PathBuf>,
    exists: ExistenceCheck,
}

impl ConflictResolver {
    /// Resolver that checks the real filesystem for existing files.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self::with_existence_check(policy, |path: &Path| path.exists())
    }

    /// Resolver with a custom notion of "already on disk".
    pub fn with_existence_check(
        policy: DuplicatePolicy,
        exists: impl Fn(&Path) -> bool + 'static,
    ) -> Self {
        Self {
            policy,
            allocated: HashSet::new(),
            exists: Box::new(exists),
        }
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.allocated.contains(path) || (self.exists)(path)
    }

    /// Resolves one result against everything allocated so far.
    ///
    /// Under `sequential` the result's destination is rewritten to the first
    /// free `stem_N.ext`.
    pub fn resolve(&mut self, result: &mut MatchResult, source: &Path) -> Disposition {
        let Some(destination) = result.destination.clone() else {
            return Disposition::Ready;
        };
        if destination == source {
            return Disposition::Skipped(SkipReason::InPlace);
        }
        if !self.is_taken(&destination) {
            self.allocated.insert(destination);
            return Disposition::Ready;
        }

        match self.policy {
            DuplicatePolicy::Overwrite => {
                self.allocated.insert(destination);
                Disposition::Overwrite
            }
            DuplicatePolicy::Sequential => self.rename(result, destination),
            DuplicatePolicy::Skip => Disposition::Skipped(SkipReason::Duplicate),
            DuplicatePolicy::Ask => Disposition::Pending,
        }
    }

    fn rename(&mut self, result: &mut MatchResult, original: PathBuf) -> Disposition {
        let free = self.next_free(&original);
        tracing::debug!("{} is taken, using {}", original.display(), free.display());
        self.allocated.insert(free.clone());
        result.destination = Some(free);
        Disposition::Renamed { original }
    }

    fn next_free(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        (1u64..)
            .map(|n| path.with_file_name(format!("{stem}_{n}{extension}")))
            .find(|candidate| !self.is_taken(candidate))
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Asks `prompt` about every pending item in `plan`.
    ///
    /// An item the prompt leaves unanswered becomes
    /// `Skipped(Unresolved)`, distinct from a skip chosen by policy or user.
    pub fn settle(&mut self, plan: &mut Plan, prompt: &dyn Prompt) -> Result<usize, PromptError> {
        let (candidates, items) = plan.parts_mut();
        let mut settled = 0;

        for item in items.iter_mut().filter(|i| i.disposition == Disposition::Pending) {
            let (Some(candidate), Some(destination)) = (
                candidates.get(item.result.candidate),
                item.result.destination.clone(),
            ) else {
                item.disposition = Disposition::Skipped(SkipReason::Unresolved);
                continue;
            };

            item.disposition = match prompt.choose_conflict(candidate.path(), &destination)? {
                Some(ConflictChoice::Overwrite) => {
                    self.allocated.insert(destination);
                    Disposition::Overwrite
                }
                Some(ConflictChoice::Rename) => self.rename(&mut item.result, destination),
                Some(ConflictChoice::Skip) => Disposition::Skipped(SkipReason::UserChoice),
                None => Disposition::Skipped(SkipReason::Unresolved),
            };
            settled += 1;
        }

        Ok(settled)
    }
}
