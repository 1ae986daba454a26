//! Plan execution.
//!
//! Items run one at a time in plan order. Each item succeeds, fails or is
//! skipped on its own; a failure never stops the batch. Before touching a
//! source the executor checks that it still matches the scan snapshot.

use crate::candidate::Candidate;
use crate::plan::{Disposition, Plan, PlanItem, SkipReason};
use crate::rules::Action;
use filetime::FileTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Why a source no longer matches its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    Vanished,
    Changed,
}

/// Coarse classification of a filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsErrorKind {
    Permission,
    Space,
    NotFound,
    Other,
}

impl FsErrorKind {
    pub fn classify(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                FsErrorKind::Permission
            }
            io::ErrorKind::StorageFull
            | io::ErrorKind::QuotaExceeded
            | io::ErrorKind::FileTooLarge => FsErrorKind::Space,
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            _ => FsErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Stale(StaleReason),
    Filesystem(FsErrorKind),
}

/// Errors from applying a single plan item.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Source vanished since the scan: {}", path.display())]
    Vanished { path: PathBuf },

    #[error("Source changed since the scan: {} ({detail})", path.display())]
    Changed { path: PathBuf, detail: String },

    #[error("Cannot read {}: {source}", path.display())]
    StatFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    #[error("No destination to {action} {} to", path.display())]
    MissingDestination { path: PathBuf, action: Action },

    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to {action} {} to {}: {source}", from.display(), to.display())]
    TransferFailed {
        from: PathBuf,
        to: PathBuf,
        action: Action,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete {}: {source}", path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutionError::Vanished { .. } => FailureKind::Stale(StaleReason::Vanished),
            ExecutionError::Changed { .. } => FailureKind::Stale(StaleReason::Changed),
            ExecutionError::DestinationExists { .. } | ExecutionError::MissingDestination { .. } => {
                FailureKind::Filesystem(FsErrorKind::Other)
            }
            ExecutionError::StatFailed { source, .. }
            | ExecutionError::DirectoryCreationFailed { source, .. }
            | ExecutionError::TransferFailed { source, .. }
            | ExecutionError::DeleteFailed { source, .. } => {
                FailureKind::Filesystem(FsErrorKind::classify(source))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    Failed(FailureKind),
    Skipped(SkipReason),
}

/// Result of one plan item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub candidate: usize,
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub action: Action,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Where a scanned candidate ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Moved,
    Copied,
    Deleted,
    Skipped,
    Failed,
    Unmatched,
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    pub path: PathBuf,
    pub state: TerminalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything a run did, one terminal state per scanned candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub dry_run: bool,
    pub scanned: usize,
    pub outcomes: Vec<ItemOutcome>,
    pub candidates: Vec<CandidateReport>,
}

impl ExecutionSummary {
    fn new(plan: &Plan, outcomes: Vec<ItemOutcome>, dry_run: bool) -> Self {
        let mut states: Vec<Option<(TerminalState, Option<String>)>> =
            vec![None; plan.candidates().len()];

        for unplanned in plan.unmatched() {
            if let Some(slot) = states.get_mut(unplanned.candidate) {
                *slot = Some((TerminalState::Unmatched, Some(unplanned.reason.clone())));
            }
        }
        for unplanned in plan.excluded() {
            if let Some(slot) = states.get_mut(unplanned.candidate) {
                *slot = Some((TerminalState::Excluded, Some(unplanned.reason.clone())));
            }
        }
        for outcome in &outcomes {
            if let Some(slot) = states.get_mut(outcome.candidate) {
                let current = slot.take().map(|(state, _)| state);
                *slot = Some((merge(current, outcome), outcome.message.clone()));
            }
        }

        let candidates = plan
            .candidates()
            .iter()
            .zip(states)
            .map(|(candidate, state)| {
                let (state, reason) =
                    state.unwrap_or((TerminalState::Unmatched, Some("not planned".to_string())));
                CandidateReport {
                    path: candidate.path().to_path_buf(),
                    state,
                    reason,
                }
            })
            .collect();

        Self {
            dry_run,
            scanned: plan.candidates().len(),
            outcomes,
            candidates,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count_status(|s| matches!(s, ItemStatus::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count_status(|s| matches!(s, ItemStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count_status(|s| matches!(s, ItemStatus::Skipped(_)))
    }

    fn count_status(&self, predicate: impl Fn(&ItemStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    /// Skipped candidates whose `ask` conflict never got an answer, as
    /// opposed to ones skipped by policy or by the user.
    pub fn unresolved(&self) -> usize {
        let unanswered: HashSet<usize> = self
            .outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Skipped(SkipReason::Unresolved))
            .map(|o| o.candidate)
            .collect();
        self.candidates
            .iter()
            .enumerate()
            .filter(|(index, report)| {
                report.state == TerminalState::Skipped && unanswered.contains(index)
            })
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed(_)))
    }

    /// Number of candidates per terminal state.
    pub fn by_state(&self) -> BTreeMap<TerminalState, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.candidates {
            *counts.entry(report.state).or_insert(0) += 1;
        }
        counts
    }

    pub fn state_of(&self, path: &Path) -> Option<TerminalState> {
        self.candidates
            .iter()
            .find(|c| c.path == path)
            .map(|c| c.state)
    }

    /// Every scanned candidate has exactly one terminal state.
    pub fn accounts_for_all(&self) -> bool {
        self.candidates.len() == self.scanned && self.by_state().values().sum::<usize>() == self.scanned
    }

    pub fn write_report(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Folds one more outcome into a candidate's state. Any failure wins, then
/// the strongest successful action.
fn merge(current: Option<TerminalState>, outcome: &ItemOutcome) -> TerminalState {
    let next = match outcome.status {
        ItemStatus::Failed(_) => TerminalState::Failed,
        ItemStatus::Skipped(_) => TerminalState::Skipped,
        ItemStatus::Succeeded => match outcome.action {
            Action::Move => TerminalState::Moved,
            Action::Copy => TerminalState::Copied,
            Action::Delete => TerminalState::Deleted,
        },
    };
    let rank = |state: TerminalState| match state {
        TerminalState::Failed => 4,
        TerminalState::Deleted | TerminalState::Moved => 3,
        TerminalState::Copied => 2,
        _ => 1,
    };
    match current {
        Some(current) if rank(current) >= rank(next) => current,
        _ => next,
    }
}

/// Applies plans to the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    dry_run: bool,
    log_success: bool,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            log_success: true,
        }
    }

    pub fn with_log_success(mut self, log_success: bool) -> Self {
        self.log_success = log_success;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs every item of `plan`, calling `observer` after each one.
    ///
    /// In dry-run mode items are re-validated but nothing is changed.
    pub fn execute(
        &self,
        plan: &Plan,
        mut observer: impl FnMut(&PlanItem, &ItemOutcome),
    ) -> ExecutionSummary {
        let mut outcomes = Vec::with_capacity(plan.items().len());

        for item in plan.items() {
            let outcome = self.run_item(plan, item);
            observer(item, &outcome);
            outcomes.push(outcome);
        }

        let summary = ExecutionSummary::new(plan, outcomes, self.dry_run);
        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            dry_run = self.dry_run,
            "execution finished"
        );
        summary
    }

    fn run_item(&self, plan: &Plan, item: &PlanItem) -> ItemOutcome {
        let result = &item.result;
        let mut outcome = ItemOutcome {
            candidate: result.candidate,
            source: plan.source(item).map(Path::to_path_buf).unwrap_or_default(),
            destination: result.destination.clone(),
            action: result.action,
            status: ItemStatus::Succeeded,
            message: None,
        };

        let skip = match &item.disposition {
            Disposition::Skipped(reason) => Some(*reason),
            Disposition::Pending => Some(SkipReason::Unresolved),
            _ => None,
        };
        if let Some(reason) = skip {
            tracing::info!("skipped {}: {}", outcome.source.display(), reason);
            outcome.status = ItemStatus::Skipped(reason);
            return outcome;
        }

        let Some(candidate) = plan.candidate(result.candidate) else {
            outcome.status = ItemStatus::Failed(FailureKind::Filesystem(FsErrorKind::Other));
            outcome.message = Some("unknown candidate".to_string());
            return outcome;
        };

        match self.apply(candidate, item) {
            Ok(()) => {
                if self.log_success {
                    match &result.destination {
                        Some(dest) => tracing::info!(
                            "[{}] {} -> {} ({})",
                            result.action,
                            outcome.source.display(),
                            dest.display(),
                            result.reason
                        ),
                        None => tracing::info!(
                            "[{}] {} ({})",
                            result.action,
                            outcome.source.display(),
                            result.reason
                        ),
                    }
                }
            }
            Err(e) => {
                tracing::error!("{}", e);
                outcome.status = ItemStatus::Failed(e.kind());
                outcome.message = Some(e.to_string());
            }
        }
        outcome
    }

    fn apply(&self, candidate: &Candidate, item: &PlanItem) -> Result<(), ExecutionError> {
        let source = candidate.path();
        revalidate(candidate)?;

        match item.result.action {
            Action::Delete => {
                if self.dry_run {
                    return Ok(());
                }
                fs::remove_file(source).map_err(|e| ExecutionError::DeleteFailed {
                    path: source.to_path_buf(),
                    source: e,
                })
            }
            action => {
                let destination = item.result.destination.as_deref().ok_or_else(|| {
                    ExecutionError::MissingDestination {
                        path: source.to_path_buf(),
                        action,
                    }
                })?;
                let overwrite = item.disposition == Disposition::Overwrite;
                if !overwrite && destination.exists() {
                    return Err(ExecutionError::DestinationExists {
                        path: destination.to_path_buf(),
                    });
                }
                if self.dry_run {
                    return Ok(());
                }
                self.transfer(action, source, destination, overwrite)
            }
        }
    }

    fn transfer(
        &self,
        action: Action,
        source: &Path,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), ExecutionError> {
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ExecutionError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let result = match action {
            Action::Copy => copy_preserving_mtime(source, destination),
            _ => move_file(source, destination, overwrite),
        };
        result.map_err(|e| ExecutionError::TransferFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            action,
            source: e,
        })
    }
}

/// Checks the source against the scan snapshot.
fn revalidate(candidate: &Candidate) -> Result<(), ExecutionError> {
    let path = candidate.path();
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ExecutionError::Vanished {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(ExecutionError::StatFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    if metadata.len() != candidate.size() {
        return Err(ExecutionError::Changed {
            path: path.to_path_buf(),
            detail: format!("size {} -> {}", candidate.size(), metadata.len()),
        });
    }
    // Best effort: some filesystems do not report modification times.
    if let Ok(modified) = metadata.modified()
        && modified != candidate.modified()
    {
        return Err(ExecutionError::Changed {
            path: path.to_path_buf(),
            detail: "modification time differs".to_string(),
        });
    }
    Ok(())
}

fn copy_preserving_mtime(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    fs::copy(source, destination)?;
    filetime::set_file_mtime(destination, FileTime::from_last_modification_time(&metadata))
}

fn move_file(source: &Path, destination: &Path, overwrite: bool) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::warn!(error = %e, "rename crosses devices, falling back to copy+remove");
            copy_preserving_mtime(source, destination)?;
            fs::remove_file(source)
        }
        Err(_) if overwrite && destination.is_file() => {
            fs::remove_file(destination)?;
            fs::rename(source, destination)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanBuilder;
    use crate::rules::MatchResult;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> Candidate {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        Candidate::from_path(&path).unwrap()
    }

    fn item(candidate: usize, action: Action, destination: Option<PathBuf>) -> PlanItem {
        PlanItem {
            result: MatchResult {
                candidate,
                rule: Some(0),
                destination,
                action,
                reason: "test".to_string(),
            },
            disposition: Disposition::Ready,
        }
    }

    #[test]
    fn test_move_copy_delete() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let candidates = vec![
            write(dir, "a.txt", "a"),
            write(dir, "b.txt", "b"),
            write(dir, "c.txt", "c"),
        ];

        let mut builder = PlanBuilder::default();
        builder.push(item(0, Action::Move, Some(dir.join("out/a.txt"))));
        builder.push(item(1, Action::Copy, Some(dir.join("copies/deep/b.txt"))));
        builder.push(item(2, Action::Delete, None));
        let plan = builder.build(candidates);

        let summary = Executor::new(false).execute(&plan, |_, _| {});

        assert_eq!(summary.succeeded(), 3);
        assert!(!dir.join("a.txt").exists());
        assert!(dir.join("out/a.txt").exists());
        assert!(dir.join("b.txt").exists());
        assert_eq!(fs::read_to_string(dir.join("copies/deep/b.txt")).unwrap(), "b");
        assert!(!dir.join("c.txt").exists());
        assert_eq!(summary.state_of(&dir.join("a.txt")), Some(TerminalState::Moved));
        assert_eq!(summary.state_of(&dir.join("b.txt")), Some(TerminalState::Copied));
        assert_eq!(summary.state_of(&dir.join("c.txt")), Some(TerminalState::Deleted));
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let path = dir.join("old.txt");
        fs::write(&path, "old").unwrap();
        let past = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&path, past).unwrap();
        let candidate = Candidate::from_path(&path).unwrap();

        let mut builder = PlanBuilder::default();
        builder.push(item(0, Action::Copy, Some(dir.join("copy/old.txt"))));
        let summary = Executor::new(false).execute(&builder.build(vec![candidate]), |_, _| {});

        assert_eq!(summary.succeeded(), 1);
        let copied = fs::metadata(dir.join("copy/old.txt")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), past);
    }

    #[test]
    fn test_stale_candidates_are_reported() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let vanished = write(dir, "gone.txt", "x");
        let changed = write(dir, "grown.txt", "x");
        fs::remove_file(dir.join("gone.txt")).unwrap();
        fs::write(dir.join("grown.txt"), "much longer now").unwrap();

        let mut builder = PlanBuilder::default();
        builder.push(item(0, Action::Move, Some(dir.join("out/gone.txt"))));
        builder.push(item(1, Action::Move, Some(dir.join("out/grown.txt"))));
        let summary = Executor::new(false).execute(&builder.build(vec![vanished, changed]), |_, _| {});

        assert_eq!(
            summary.outcomes[0].status,
            ItemStatus::Failed(FailureKind::Stale(StaleReason::Vanished))
        );
        assert_eq!(
            summary.outcomes[1].status,
            ItemStatus::Failed(FailureKind::Stale(StaleReason::Changed))
        );
        assert!(dir.join("grown.txt").exists());
        assert!(!dir.join("out/grown.txt").exists());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let candidates: Vec<_> = (1..=5)
            .map(|i| write(dir, &format!("f{i}.txt"), "data"))
            .collect();
        // A regular file where item 3 needs a directory.
        fs::write(dir.join("blocked"), "not a dir").unwrap();

        let mut builder = PlanBuilder::default();
        for i in 0..5 {
            let target = if i == 2 {
                dir.join("blocked/f3.txt")
            } else {
                dir.join(format!("out/f{}.txt", i + 1))
            };
            builder.push(item(i, Action::Move, Some(target)));
        }
        let plan = builder.build(candidates);

        let mut seen = 0;
        let summary = Executor::new(false).execute(&plan, |_, _| seen += 1);

        assert_eq!(seen, 5);
        assert_eq!(summary.succeeded(), 4);
        assert_eq!(summary.failed(), 1);
        assert!(matches!(summary.outcomes[2].status, ItemStatus::Failed(FailureKind::Filesystem(_))));
        for i in [1, 2, 4, 5] {
            assert!(dir.join(format!("out/f{i}.txt")).exists());
        }
        assert!(dir.join("f3.txt").exists());
        assert!(summary.accounts_for_all());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let candidates = vec![write(dir, "a.txt", "a"), write(dir, "b.txt", "b")];

        let mut builder = PlanBuilder::default();
        builder.push(item(0, Action::Move, Some(dir.join("out/a.txt"))));
        builder.push(item(1, Action::Delete, None));
        let summary = Executor::new(true).execute(&builder.build(candidates), |_, _| {});

        assert!(summary.dry_run);
        assert_eq!(summary.succeeded(), 2);
        assert!(dir.join("a.txt").exists());
        assert!(dir.join("b.txt").exists());
        assert!(!dir.join("out").exists());
    }

    #[test]
    fn test_existing_destination_needs_overwrite() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::create_dir(dir.join("out")).unwrap();
        fs::write(dir.join("out/a.txt"), "old").unwrap();
        let candidates = vec![write(dir, "a.txt", "new"), write(dir, "b.txt", "b")];

        let mut builder = PlanBuilder::default();
        let mut overwrite = item(0, Action::Move, Some(dir.join("out/a.txt")));
        overwrite.disposition = Disposition::Overwrite;
        builder.push(overwrite);
        builder.push(item(1, Action::Move, Some(dir.join("out/a.txt"))));
        let summary = Executor::new(false).execute(&builder.build(candidates), |_, _| {});

        assert_eq!(summary.outcomes[0].status, ItemStatus::Succeeded);
        assert_eq!(fs::read_to_string(dir.join("out/a.txt")).unwrap(), "new");
        assert_eq!(
            summary.outcomes[1].status,
            ItemStatus::Failed(FailureKind::Filesystem(FsErrorKind::Other))
        );
        assert!(dir.join("b.txt").exists());
    }

    #[test]
    fn test_skipped_and_pending_items() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let candidates = vec![write(dir, "a.txt", "a"), write(dir, "b.txt", "b")];

        let mut builder = PlanBuilder::default();
        let mut skipped = item(0, Action::Move, Some(dir.join("out/a.txt")));
        skipped.disposition = Disposition::Skipped(SkipReason::Duplicate);
        let mut pending = item(1, Action::Move, Some(dir.join("out/b.txt")));
        pending.disposition = Disposition::Pending;
        builder.push(skipped);
        builder.push(pending);
        let summary = Executor::new(false).execute(&builder.build(candidates), |_, _| {});

        assert_eq!(summary.outcomes[0].status, ItemStatus::Skipped(SkipReason::Duplicate));
        assert_eq!(summary.outcomes[1].status, ItemStatus::Skipped(SkipReason::Unresolved));
        assert_eq!(summary.by_state().get(&TerminalState::Skipped), Some(&2));
        assert_eq!(summary.unresolved(), 1);
        assert!(dir.join("a.txt").exists());
        assert!(dir.join("b.txt").exists());
    }

    #[test]
    fn test_summary_accounts_for_unplanned_candidates() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let candidates = vec![
            write(dir, "a.txt", "a"),
            write(dir, "b.txt", "b"),
            write(dir, "c.txt", "c"),
        ];

        let mut builder = PlanBuilder::default();
        builder.push(item(0, Action::Copy, Some(dir.join("out/a.txt"))));
        builder.unmatched(1, "no rule matched");
        builder.exclude(2, "hidden file");
        let summary = Executor::new(false).execute(&builder.build(candidates), |_, _| {});

        let states = summary.by_state();
        assert_eq!(states.get(&TerminalState::Copied), Some(&1));
        assert_eq!(states.get(&TerminalState::Unmatched), Some(&1));
        assert_eq!(states.get(&TerminalState::Excluded), Some(&1));
        assert!(summary.accounts_for_all());
        assert!(dir.join("b.txt").exists());

        let report = dir.join("report.json");
        summary.write_report(&report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(json["scanned"], 3);
        assert_eq!(json["candidates"][1]["state"], "unmatched");
    }

    #[test]
    fn test_classify_io_errors() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let full = io::Error::from(io::ErrorKind::StorageFull);
        let missing = io::Error::from(io::ErrorKind::NotFound);
        let other = io::Error::other("boom");
        assert_eq!(FsErrorKind::classify(&denied), FsErrorKind::Permission);
        assert_eq!(FsErrorKind::classify(&full), FsErrorKind::Space);
        assert_eq!(FsErrorKind::classify(&missing), FsErrorKind::NotFound);
        assert_eq!(FsErrorKind::classify(&other), FsErrorKind::Other);
    }
}
