//! Plans and previews.
//!
//! A [`Plan`] holds every decision of a run before anything touches the disk:
//! the resolved match results, plus the candidates that were excluded or
//! matched nothing. [`Plan::preview`] turns it into grouped, truncated lists
//! for display. Building a preview is pure; it never reads the filesystem.

use crate::candidate::{Candidate, Probe};
use crate::conflict::ConflictResolver;
use crate::rules::{Evaluation, MatchResult, RuleEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a plan item will not be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The destination exists and the policy is `skip`.
    Duplicate,
    /// The user chose to skip when asked.
    UserChoice,
    /// The policy is `ask` and no answer was given.
    Unresolved,
    /// The destination is the source itself.
    InPlace,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Duplicate => "destination exists",
            SkipReason::UserChoice => "skipped by user",
            SkipReason::Unresolved => "conflict unresolved",
            SkipReason::InPlace => "already in place",
        };
        f.write_str(text)
    }
}

/// How a plan item relates to its destination after conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Free destination.
    Ready,
    /// Existing destination will be replaced.
    Overwrite,
    /// Destination was taken; the result now points at a numbered name.
    Renamed { original: PathBuf },
    Skipped(SkipReason),
    /// Waiting for a per-item decision.
    Pending,
}

impl Disposition {
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Disposition::Ready | Disposition::Overwrite | Disposition::Renamed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
    pub result: MatchResult,
    pub disposition: Disposition,
}

/// A candidate that produced no plan item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unplanned {
    pub candidate: usize,
    pub reason: String,
}

/// Every decision of one run, in candidate order.
#[derive(Debug, Clone)]
pub struct Plan {
    candidates: Vec<Candidate>,
    items: Vec<PlanItem>,
    unmatched: Vec<Unplanned>,
    excluded: Vec<Unplanned>,
}

impl Plan {
    /// Evaluates every candidate and resolves destination conflicts.
    ///
    /// Candidates are processed strictly in order, so the resolver's
    /// allocation table sees earlier results before later ones.
    pub fn build(
        engine: &RuleEngine,
        candidates: Vec<Candidate>,
        probe: &dyn Probe,
        resolver: &mut ConflictResolver,
    ) -> Self {
        let mut builder = PlanBuilder::default();

        for (index, candidate) in candidates.iter().enumerate() {
            match engine.evaluate(index, candidate, probe) {
                Evaluation::Excluded(reason) => {
                    tracing::debug!("excluded {}: {}", candidate.path().display(), reason);
                    builder.exclude(index, reason);
                }
                Evaluation::Unmatched(reason) => {
                    tracing::debug!("unmatched {}: {}", candidate.path().display(), reason);
                    builder.unmatched(index, reason);
                }
                Evaluation::Matched(results) => {
                    for mut result in results {
                        let disposition = resolver.resolve(&mut result, candidate.path());
                        builder.push(PlanItem { result, disposition });
                    }
                }
            }
        }

        builder.build(candidates)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    /// Source path of a plan item.
    pub fn source(&self, item: &PlanItem) -> Option<&Path> {
        self.candidate(item.result.candidate).map(Candidate::path)
    }

    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub(crate) fn parts_mut(&mut self) -> (&[Candidate], &mut [PlanItem]) {
        (&self.candidates, &mut self.items)
    }

    pub fn unmatched(&self) -> &[Unplanned] {
        &self.unmatched
    }

    pub fn excluded(&self) -> &[Unplanned] {
        &self.excluded
    }

    /// Number of items that will touch the filesystem.
    pub fn actionable(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.disposition.is_actionable())
            .count()
    }

    pub fn pending(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.disposition == Disposition::Pending)
            .count()
    }

    /// Groups items for display and truncates each group per `config`.
    ///
    /// Deletions form one group that is never truncated. Other groups are keyed
    /// by destination folder, in the order they first appear.
    pub fn preview(&self, config: &PreviewConfig) -> Preview {
        let mut order: Vec<GroupKey> = Vec::new();
        let mut members: HashMap<GroupKey, Vec<usize>> = HashMap::new();

        for (index, item) in self.items.iter().enumerate() {
            let key = match &item.result.destination {
                Some(dest) => GroupKey::Folder(dest.parent().map(Path::to_path_buf).unwrap_or_default()),
                None => GroupKey::Delete,
            };
            members
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(index);
        }

        let groups = order
            .into_iter()
            .map(|key| {
                let indices = members.remove(&key).unwrap_or_default();
                let entries = if key == GroupKey::Delete {
                    truncate(&indices, PreviewMode::All, config.count)
                } else {
                    truncate(&indices, config.mode, config.count)
                };
                PreviewGroup {
                    key,
                    total: indices.len(),
                    entries,
                }
            })
            .collect();

        Preview {
            groups,
            total: self.items.len(),
            unmatched: self.unmatched.len(),
            excluded: self.excluded.len(),
        }
    }
}

/// Accumulates plan items in candidate order.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    items: Vec<PlanItem>,
    unmatched: Vec<Unplanned>,
    excluded: Vec<Unplanned>,
}

impl PlanBuilder {
    pub fn exclude(&mut self, candidate: usize, reason: impl Into<String>) {
        self.excluded.push(Unplanned {
            candidate,
            reason: reason.into(),
        });
    }

    pub fn unmatched(&mut self, candidate: usize, reason: impl Into<String>) {
        self.unmatched.push(Unplanned {
            candidate,
            reason: reason.into(),
        });
    }

    pub fn push(&mut self, item: PlanItem) {
        self.items.push(item);
    }

    pub fn build(self, candidates: Vec<Candidate>) -> Plan {
        Plan {
            candidates,
            items: self.items,
            unmatched: self.unmatched,
            excluded: self.excluded,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    #[default]
    Head,
    Tail,
    Both,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    pub mode: PreviewMode,
    pub count: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            mode: PreviewMode::Head,
            count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Folder(PathBuf),
    Delete,
}

/// One line of a preview group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewEntry {
    /// Index into [`Plan::items`].
    Item(usize),
    /// This many items were left out here.
    Gap(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewGroup {
    pub key: GroupKey,
    /// Number of items in the group, regardless of truncation.
    pub total: usize,
    pub entries: Vec<PreviewEntry>,
}

impl PreviewGroup {
    /// Number of items actually listed.
    pub fn shown(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PreviewEntry::Item(_)))
            .count()
    }

    pub fn hidden(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e {
                PreviewEntry::Gap(n) => *n,
                PreviewEntry::Item(_) => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub groups: Vec<PreviewGroup>,
    pub total: usize,
    pub unmatched: usize,
    pub excluded: usize,
}

fn truncate(indices: &[usize], mode: PreviewMode, count: usize) -> Vec<PreviewEntry> {
    let total = indices.len();
    let count = count.max(1);
    let items = |range: &[usize]| range.iter().map(|&i| PreviewEntry::Item(i)).collect::<Vec<_>>();

    match mode {
        PreviewMode::Head if total > count => {
            let mut entries = items(&indices[..count]);
            entries.push(PreviewEntry::Gap(total - count));
            entries
        }
        PreviewMode::Tail if total > count => {
            let mut entries = vec![PreviewEntry::Gap(total - count)];
            entries.extend(items(&indices[total - count..]));
            entries
        }
        PreviewMode::Both if total > count * 2 => {
            let mut entries = items(&indices[..count]);
            entries.push(PreviewEntry::Gap(total - count * 2));
            entries.extend(items(&indices[total - count..]));
            entries
        }
        _ => items(indices),
    }
}
