//! Output formatting and styling module.
//!
//! All console output goes through [`OutputFormatter`], which keeps the
//! colouring consistent. The `describe_*` helpers build the plain text and are
//! what the tests look at.

use crate::config::{Preset, RejectedRule};
use crate::executor::{ExecutionSummary, TerminalState};
use crate::plan::{Disposition, GroupKey, Plan, PlanItem, Preview, PreviewEntry};
use crate::rules::Action;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

pub struct OutputFormatter;

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// One preview line for `item`, without colour.
pub fn describe_item(plan: &Plan, item: &PlanItem) -> String {
    let source = plan
        .source(item)
        .map(name_of)
        .unwrap_or_else(|| "?".to_string());

    let Some(destination) = &item.result.destination else {
        return format!("{source}  ({})", item.result.reason);
    };

    let mut line = match item.result.action {
        Action::Copy => format!("{source} ⇒ {}", name_of(destination)),
        _ => format!("{source} → {}", name_of(destination)),
    };
    match &item.disposition {
        Disposition::Ready => {}
        Disposition::Overwrite => line.push_str("  (overwrite)"),
        Disposition::Renamed { original } => {
            line.push_str(&format!("  ({} exists)", name_of(original)))
        }
        Disposition::Skipped(reason) => line.push_str(&format!("  (skip: {reason})")),
        Disposition::Pending => line.push_str("  (ask)"),
    }
    line
}

pub fn describe_state(state: TerminalState) -> &'static str {
    match state {
        TerminalState::Moved => "Moved",
        TerminalState::Copied => "Copied",
        TerminalState::Deleted => "Deleted",
        TerminalState::Skipped => "Skipped",
        TerminalState::Failed => "Failed",
        TerminalState::Unmatched => "Unmatched",
        TerminalState::Excluded => "Excluded",
    }
}

/// Label and count per summary line, in state order.
///
/// Skipped candidates are split so that unanswered `ask` conflicts show up as
/// their own "Unresolved" row instead of hiding among policy skips.
pub fn summary_rows(summary: &ExecutionSummary) -> Vec<(&'static str, usize)> {
    let unresolved = summary.unresolved();
    let mut rows = Vec::new();
    for (state, count) in summary.by_state() {
        if state == TerminalState::Skipped {
            let skipped = count.saturating_sub(unresolved);
            if skipped > 0 {
                rows.push((describe_state(state), skipped));
            }
            if unresolved > 0 {
                rows.push(("Unresolved", unresolved));
            }
        } else {
            rows.push((describe_state(state), count));
        }
    }
    rows
}

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use lootsort::output::OutputFormatter;
    /// OutputFormatter::success("Run complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Progress bar for plan execution.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Lists discovered presets.
    pub fn preset_list(presets: &[Preset]) {
        if presets.is_empty() {
            Self::warning("No presets found.");
            return;
        }
        Self::header("PRESETS");
        for preset in presets {
            let icon = preset.meta.icon.as_deref().unwrap_or("•");
            let stem = preset.stem().unwrap_or_default();
            println!(
                "{} {} [{}] {}",
                icon,
                preset.meta.name.bold(),
                preset.meta.mode.to_string().cyan(),
                stem.dimmed()
            );
            if !preset.meta.description.is_empty() {
                println!("    {}", preset.meta.description);
            }
        }
    }

    pub fn rejected_rules(rejected: &[RejectedRule]) {
        if rejected.is_empty() {
            return;
        }
        Self::warning(&format!("{} rule(s) rejected:", rejected.len()));
        for rule in rejected {
            Self::error(&format!("  #{} {}: {}", rule.index + 1, rule.label, rule.error));
        }
    }

    /// Prints the grouped preview of `plan`.
    pub fn preview(plan: &Plan, preview: &Preview) {
        Self::header("PREVIEW");

        if preview.groups.is_empty() {
            Self::info("Nothing to do.");
        }

        for group in &preview.groups {
            let title = match &group.key {
                GroupKey::Folder(folder) => format!("📁 {}", folder.display()).bold(),
                GroupKey::Delete => "🗑  delete".red().bold(),
            };
            println!("{} ({} {})", title, group.total, plural(group.total));

            for entry in &group.entries {
                match entry {
                    PreviewEntry::Item(index) => {
                        if let Some(item) = plan.items().get(*index) {
                            let line = describe_item(plan, item);
                            match item.disposition {
                                Disposition::Skipped(_) => println!("   {}", line.dimmed()),
                                Disposition::Pending | Disposition::Overwrite => {
                                    println!("   {}", line.yellow())
                                }
                                _ => println!("   {}", line),
                            }
                        }
                    }
                    PreviewEntry::Gap(hidden) => {
                        println!("   {}", format!("… {hidden} more").dimmed())
                    }
                }
            }
        }

        println!(
            "\n{} planned, {} unmatched, {} excluded",
            preview.total.to_string().bold(),
            preview.unmatched,
            preview.excluded
        );
        if plan.pending() > 0 {
            Self::warning(&format!("{} conflict(s) need a decision", plan.pending()));
        }
    }

    /// Prints per-state counts and every failure.
    pub fn summary_table(summary: &ExecutionSummary) {
        Self::header(if summary.dry_run { "SUMMARY (dry run)" } else { "SUMMARY" });

        let rows = summary_rows(summary);
        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "State".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in &rows {
            let count_text = match *label {
                "Failed" => count.to_string().red(),
                "Unresolved" => count.to_string().yellow(),
                "Skipped" | "Unmatched" | "Excluded" => count.to_string().normal(),
                _ => count.to_string().green(),
            };
            println!(
                "{:<width$} | {} {}",
                label,
                count_text,
                plural(*count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Scanned".bold(),
            summary.scanned.to_string().bold(),
            plural(summary.scanned),
            width = width
        );

        let failures: Vec<_> = summary.failures().collect();
        if !failures.is_empty() {
            Self::header("FAILURES");
            for outcome in failures {
                Self::error(&format!(
                    "{}: {}",
                    outcome.source.display(),
                    outcome.message.as_deref().unwrap_or("failed")
                ));
            }
        }
    }
}
