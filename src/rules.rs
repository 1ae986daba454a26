//! Rules and the rule engine.
//!
//! Three rule sets exist, one per mode:
//!
//! - [`RuleSet::Ordered`]: sort mode, first enabled rule whose criteria all hold wins.
//! - [`RuleSet::Clean`]: deletion markers, then sorting rules, then an in-place rename.
//! - [`RuleSet::Tokens`]: token routes, first-match or all-matches.
//!
//! Exclusions run before any of them and always win.

use crate::candidate::{Candidate, Probe};
use crate::cleanup::Sanitizer;
use crate::filter::{FilterCriterion, NamePattern};
use crate::metadata::{TokenScan, normalize_token};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// What happens to a matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Copy,
    Move,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Empty destination")]
    Empty,

    #[error("Unknown placeholder '{{{name}}}' in destination '{template}'")]
    UnknownPlaceholder { template: String, name: String },

    #[error("Unclosed placeholder in destination '{template}'")]
    Unclosed { template: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Year,
    Month,
    Day,
    Ext,
}

/// A destination directory with optional date and extension placeholders.
///
/// Supported placeholders are `{year}`, `{month}`, `{day}` (from the file's
/// modification time, local) and `{ext}` (lowercased extension, `noext` if
/// there is none). Relative templates resolve against the base directory given
/// at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    segments: Vec<Segment>,
    base: Option<PathBuf>,
}

impl DestinationTemplate {
    /// Parses `raw`, resolving relative results against `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lootsort::rules::DestinationTemplate;
    /// use std::path::Path;
    ///
    /// assert!(DestinationTemplate::parse("Sorted/{ext}", Some(Path::new("/data"))).is_ok());
    /// assert!(DestinationTemplate::parse("Sorted/{owner}", None).is_err());
    /// ```
    pub fn parse(raw: &str, base: Option<&Path>) -> Result<Self, TemplateError> {
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| TemplateError::Unclosed {
                template: raw.to_string(),
            })?;
            let segment = match &after[..close] {
                "year" => Segment::Year,
                "month" => Segment::Month,
                "day" => Segment::Day,
                "ext" => Segment::Ext,
                other => {
                    return Err(TemplateError::UnknownPlaceholder {
                        template: raw.to_string(),
                        name: other.to_string(),
                    });
                }
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            base: base.map(Path::to_path_buf),
        })
    }

    /// Renders the destination directory for `candidate`.
    pub fn render(&self, candidate: &Candidate) -> PathBuf {
        let modified: DateTime<Local> = candidate.modified().into();
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Year => rendered.push_str(&modified.format("%Y").to_string()),
                Segment::Month => rendered.push_str(&modified.format("%m").to_string()),
                Segment::Day => rendered.push_str(&modified.format("%d").to_string()),
                Segment::Ext => rendered.push_str(
                    &candidate
                        .path()
                        .extension()
                        .map(|e| e.to_string_lossy().to_lowercase())
                        .unwrap_or_else(|| "noext".to_string()),
                ),
            }
        }

        let path = PathBuf::from(rendered);
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

/// One ordered rule: criteria, destination and action.
#[derive(Debug, Clone)]
pub struct Rule {
    description: String,
    criteria: Vec<FilterCriterion>,
    destination: Option<DestinationTemplate>,
    action: Action,
    enabled: bool,
    rename: Vec<(String, String)>,
}

impl Rule {
    /// A copy or move rule into `destination`.
    pub fn transfer(action: Action, destination: DestinationTemplate) -> Self {
        Self {
            description: String::new(),
            criteria: Vec::new(),
            destination: Some(destination),
            action,
            enabled: true,
            rename: Vec::new(),
        }
    }

    /// A rule that deletes what it matches.
    pub fn delete() -> Self {
        Self {
            description: String::new(),
            criteria: Vec::new(),
            destination: None,
            action: Action::Delete,
            enabled: true,
            rename: Vec::new(),
        }
    }

    pub fn with_criterion(mut self, criterion: FilterCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds a substring replacement applied to the destination file name.
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rename.push((from.into(), to.into()));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// All criteria hold. A rule without criteria matches everything.
    pub fn matches(&self, candidate: &Candidate, probe: &dyn Probe) -> bool {
        self.criteria.iter().all(|c| c.matches(candidate, probe))
    }

    fn renamed(&self, file_name: &str) -> String {
        self.rename
            .iter()
            .fold(file_name.to_string(), |name, (from, to)| name.replace(from, to))
    }

    fn result(&self, rule: usize, candidate_index: usize, candidate: &Candidate, file_name: &str) -> MatchResult {
        let destination = match self.action {
            Action::Delete => None,
            Action::Copy | Action::Move => self
                .destination
                .as_ref()
                .map(|t| t.render(candidate).join(self.renamed(file_name))),
        };
        let reason = if self.description.is_empty() {
            format!("rule #{}", rule + 1)
        } else {
            self.description.clone()
        };
        MatchResult {
            candidate: candidate_index,
            rule: Some(rule),
            destination,
            action: self.action,
            reason,
        }
    }
}

/// Candidates removed before any rule is evaluated.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    exact_names: HashSet<String>,
    patterns: Vec<NamePattern>,
    regexes: Vec<Regex>,
    hidden: bool,
}

impl Exclusions {
    pub fn new(
        exact_names: impl IntoIterator<Item = String>,
        patterns: Vec<NamePattern>,
        regexes: Vec<Regex>,
        hidden: bool,
    ) -> Self {
        Self {
            exact_names: exact_names.into_iter().collect(),
            patterns,
            regexes,
            hidden,
        }
    }

    /// Returns why `path` is excluded, or `None` if it is not.
    ///
    /// Checked in order: hidden files, exact names, name patterns, regexes.
    pub fn reason(&self, path: &Path) -> Option<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.hidden && file_name.starts_with('.') {
            return Some("hidden file".to_string());
        }
        if self.exact_names.contains(file_name.as_ref()) {
            return Some(format!("excluded name '{file_name}'"));
        }
        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(path)) {
            return Some(format!("excluded by pattern '{}'", pattern.as_str()));
        }
        self.regexes
            .iter()
            .find(|re| re.is_match(&file_name))
            .map(|re| format!("excluded by regex '{}'", re.as_str()))
    }
}

/// Token routing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    FirstMatch,
    AllMatches,
}

/// Maps a normalized token to a destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRoute {
    token: String,
    folder: PathBuf,
    enabled: bool,
}

impl TokenRoute {
    pub fn new(token: &str, folder: impl Into<PathBuf>) -> Self {
        Self {
            token: normalize_token(token),
            folder: folder.into(),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// Folders for images the routes cannot place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFallback {
    pub unreadable: Option<PathBuf>,
    pub untagged: Option<PathBuf>,
    pub unmapped: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TokenRouting {
    routes: Vec<TokenRoute>,
    strategy: Strategy,
    action: Action,
    fallback: TokenFallback,
}

impl TokenRouting {
    pub fn new(routes: Vec<TokenRoute>, strategy: Strategy, action: Action) -> Self {
        Self {
            routes,
            strategy,
            action,
            fallback: TokenFallback::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: TokenFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn routes(&self) -> &[TokenRoute] {
        &self.routes
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn evaluate(&self, index: usize, candidate: &Candidate, probe: &dyn Probe) -> Evaluation {
        let file_name = candidate.file_name();
        let tokens = match candidate.tokens(probe) {
            TokenScan::Unreadable => {
                return self.fall_back(
                    index,
                    &file_name,
                    self.fallback.unreadable.as_deref(),
                    "unreadable metadata",
                );
            }
            TokenScan::Tokens(tokens) if tokens.is_empty() => {
                return self.fall_back(
                    index,
                    &file_name,
                    self.fallback.untagged.as_deref(),
                    "no tokens in metadata",
                );
            }
            TokenScan::Tokens(tokens) => tokens,
        };

        let hits = self.hits(tokens);
        if hits.is_empty() {
            return self.fall_back(
                index,
                &file_name,
                self.fallback.unmapped.as_deref(),
                "no mapped token",
            );
        }

        let last = hits.len() - 1;
        let results = hits
            .into_iter()
            .enumerate()
            .map(|(position, (route_index, route))| {
                // A move to several folders copies to all but the last.
                let action = match (self.action, self.strategy) {
                    (Action::Move, Strategy::AllMatches) if position < last => Action::Copy,
                    (action, _) => action,
                };
                MatchResult {
                    candidate: index,
                    rule: Some(route_index),
                    destination: Some(route.folder.join(&file_name)),
                    action,
                    reason: format!("token '{}'", route.token),
                }
            })
            .collect();
        Evaluation::Matched(results)
    }

    /// Routes whose token is present, in declared route order.
    fn hits<'a>(&'a self, tokens: &BTreeSet<String>) -> Vec<(usize, &'a TokenRoute)> {
        let present = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.enabled && tokens.contains(&route.token));

        match self.strategy {
            Strategy::FirstMatch => present.take(1).collect(),
            Strategy::AllMatches => {
                let mut folders = HashSet::new();
                present
                    .filter(|(_, route)| folders.insert(route.folder.clone()))
                    .collect()
            }
        }
    }

    fn fall_back(&self, index: usize, file_name: &str, folder: Option<&Path>, reason: &str) -> Evaluation {
        match folder {
            Some(folder) => Evaluation::Matched(vec![MatchResult {
                candidate: index,
                rule: None,
                destination: Some(folder.join(file_name)),
                action: self.action,
                reason: reason.to_string(),
            }]),
            None => Evaluation::Unmatched(reason.to_string()),
        }
    }
}

/// Clean-mode pipeline: deletion markers, sanitized names, sorting rules.
#[derive(Debug, Clone, Default)]
pub struct CleanRules {
    markers: Vec<String>,
    sanitizer: Option<Sanitizer>,
    rules: Vec<Rule>,
}

impl CleanRules {
    pub fn new(markers: Vec<String>, sanitizer: Option<Sanitizer>, rules: Vec<Rule>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            sanitizer,
            rules,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn evaluate(&self, index: usize, candidate: &Candidate, probe: &dyn Probe) -> Evaluation {
        let file_name = candidate.file_name();
        let lowered = file_name.to_lowercase();

        if let Some(marker) = self.markers.iter().find(|m| lowered.contains(m.as_str())) {
            return Evaluation::Matched(vec![MatchResult {
                candidate: index,
                rule: None,
                destination: None,
                action: Action::Delete,
                reason: format!("contains '{marker}'"),
            }]);
        }

        let cleaned = self
            .sanitizer
            .as_ref()
            .map_or_else(|| file_name.clone(), |s| s.clean(&file_name));

        if let Some((position, rule)) = first_enabled_match(&self.rules, candidate, probe) {
            return Evaluation::Matched(vec![rule.result(position, index, candidate, &cleaned)]);
        }

        if cleaned != file_name
            && let Some(parent) = candidate.path().parent()
        {
            return Evaluation::Matched(vec![MatchResult {
                candidate: index,
                rule: None,
                destination: Some(parent.join(&cleaned)),
                action: Action::Move,
                reason: "sanitized name".to_string(),
            }]);
        }

        Evaluation::Unmatched("no rule matched".to_string())
    }
}

fn first_enabled_match<'a>(
    rules: &'a [Rule],
    candidate: &Candidate,
    probe: &dyn Probe,
) -> Option<(usize, &'a Rule)> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.enabled)
        .find(|(_, rule)| rule.matches(candidate, probe))
}

/// The mode-specific rule set.
#[derive(Debug, Clone)]
pub enum RuleSet {
    Ordered(Vec<Rule>),
    Clean(CleanRules),
    Tokens(TokenRouting),
}

/// One proposed transfer for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the candidate in the scan.
    pub candidate: usize,
    /// Index of the rule or route that produced this result; `None` for
    /// deletion markers, in-place renames and fallbacks.
    pub rule: Option<usize>,
    /// Full destination file path; `None` for deletions.
    pub destination: Option<PathBuf>,
    pub action: Action,
    pub reason: String,
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Excluded(String),
    Unmatched(String),
    Matched(Vec<MatchResult>),
}

/// Evaluates candidates against exclusions and a rule set.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    exclusions: Exclusions,
    rules: RuleSet,
}

impl RuleEngine {
    pub fn new(exclusions: Exclusions, rules: RuleSet) -> Self {
        Self { exclusions, rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluates the candidate at `index`.
    ///
    /// Sort and clean modes yield at most one result; token mode may yield
    /// several, one per destination folder.
    pub fn evaluate(&self, index: usize, candidate: &Candidate, probe: &dyn Probe) -> Evaluation {
        if let Some(reason) = self.exclusions.reason(candidate.path()) {
            return Evaluation::Excluded(reason);
        }

        match &self.rules {
            RuleSet::Ordered(rules) => match first_enabled_match(rules, candidate, probe) {
                Some((position, rule)) => Evaluation::Matched(vec![rule.result(
                    position,
                    index,
                    candidate,
                    &candidate.file_name(),
                )]),
                None => Evaluation::Unmatched("no rule matched".to_string()),
            },
            RuleSet::Clean(clean) => clean.evaluate(index, candidate, probe),
            RuleSet::Tokens(routing) => routing.evaluate(index, candidate, probe),
        }
    }
}
