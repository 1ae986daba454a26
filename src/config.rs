//! Preset loading and compilation.
//!
//! A preset is a YAML or TOML file (chosen by extension) describing one job:
//! which directories to scan, which rules apply and how the run behaves.
//!
//! # Preset Format
//!
//! ```yaml
//! meta:
//!   name: Downloads
//!   mode: sort
//! settings:
//!   target_directories: /home/me/Downloads
//!   duplicate_handling: sequential
//!   preview: { mode: both, count: 5 }
//! exclusions:
//!   exact_names: [desktop.ini]
//!   patterns: ["*.part"]
//! move_rules:
//!   - pattern: "*.mp4"
//!     dest: Videos/Large
//!     filters:
//!       size: { min: 10MB }
//! ```
//!
//! Compilation separates two kinds of problems. A broken rule (bad glob, bad
//! size, unknown destination placeholder) only rejects that rule; the others
//! keep their order. Anything structural (missing sections, invalid regexes,
//! no usable rule at all) fails the whole preset.

use crate::cleanup::Sanitizer;
use crate::conflict::DuplicatePolicy;
use crate::filter::{
    AspectClass, AspectFilter, AspectThresholds, DateRange, FilterCriterion, FilterError,
    NamePattern, ResolutionRange, SizeRange, parse_date, parse_size,
};
use crate::metadata::{DEFAULT_FIELDS, DEFAULT_KINDS, MetadataExtractor};
use crate::plan::PreviewConfig;
use crate::rules::{
    Action, CleanRules, DestinationTemplate, Exclusions, Rule, RuleEngine, RuleSet, Strategy,
    TemplateError, TokenFallback, TokenRoute, TokenRouting,
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that make a preset unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Preset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unsupported preset format: {} (expected .yaml, .yml or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("{mode} mode needs a '{section}' section")]
    MissingSection { mode: Mode, section: &'static str },

    #[error("No target directories configured")]
    MissingTargets,

    #[error("Invalid regex in {context} '{pattern}': {source}")]
    InvalidRegex {
        context: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid exclusion pattern: {0}")]
    InvalidExclusion(#[from] FilterError),

    #[error("Preview count must be at least 1")]
    InvalidPreviewCount,

    #[error("Token mode can only copy or move, not {0}")]
    InvalidTokenAction(Action),

    #[error("Invalid mapping file {}: {reason}", path.display())]
    Mapping { path: PathBuf, reason: String },

    #[error("No usable rules ({rejected} rejected)")]
    NoUsableRules { rejected: usize },
}

/// Problems local to one rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("rule has no pattern")]
    MissingPattern,

    #[error("{action} rule has no destination")]
    MissingDestination { action: Action },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// A rule dropped during compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRule {
    /// Position in the preset, starting at 0.
    pub index: usize,
    pub label: String,
    pub error: RuleError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[serde(alias = "Sort")]
    Sort,
    #[serde(alias = "Clean")]
    Clean,
    #[serde(alias = "PNG_Prompt_Sort", alias = "png_prompt_sort", alias = "Token")]
    Token,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Sort => "sort",
            Mode::Clean => "clean",
            Mode::Token => "token",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub mode: Mode,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub log_success: bool,
    pub log_directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_success: true,
            log_directory: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "target_directory", deserialize_with = "one_or_many")]
    pub target_directories: Vec<PathBuf>,
    pub recursive: bool,
    pub confirm_before_execute: bool,
    pub dry_run_default: bool,
    pub duplicate_handling: DuplicatePolicy,
    pub preview: PreviewConfig,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_directories: Vec::new(),
            recursive: false,
            confirm_before_execute: true,
            dry_run_default: true,
            duplicate_handling: DuplicatePolicy::Sequential,
            preview: PreviewConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExclusionConfig {
    pub exact_names: Vec<String>,
    pub patterns: Vec<String>,
    pub regex: Vec<String>,
    /// Exclude dot-files.
    pub hidden: bool,
}

impl ExclusionConfig {
    fn compile(&self) -> Result<Exclusions, ConfigError> {
        let patterns = self
            .patterns
            .iter()
            .map(|p| NamePattern::new(p, false))
            .collect::<Result<Vec<_>, _>>()?;
        let regexes = self
            .regex
            .iter()
            .map(|p| compile_regex("exclusions", p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Exclusions::new(
            self.exact_names.iter().cloned(),
            patterns,
            regexes,
            self.hidden,
        ))
    }
}

fn compile_regex(context: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
        context,
        pattern: pattern.to_string(),
        source,
    })
}

/// A size bound, either a byte count or a unit string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    fn bytes(&self) -> Result<u64, FilterError> {
        match self {
            SizeValue::Bytes(n) => Ok(*n),
            SizeValue::Text(s) => parse_size(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeBounds {
    pub min: Option<SizeValue>,
    pub max: Option<SizeValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateBounds {
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionBounds {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AspectConfig {
    Class(AspectClass),
    Detailed {
        class: AspectClass,
        vertical_min: Option<f64>,
        horizontal_min: Option<f64>,
        square_tolerance: Option<f64>,
    },
}

impl AspectConfig {
    fn compile(&self) -> Result<AspectFilter, FilterError> {
        let defaults = AspectThresholds::default();
        let filter = match *self {
            AspectConfig::Class(class) => AspectFilter {
                class,
                thresholds: defaults,
            },
            AspectConfig::Detailed {
                class,
                vertical_min,
                horizontal_min,
                square_tolerance,
            } => AspectFilter {
                class,
                thresholds: AspectThresholds {
                    vertical_min: vertical_min.unwrap_or(defaults.vertical_min),
                    horizontal_min: horizontal_min.unwrap_or(defaults.horizontal_min),
                    square_tolerance: square_tolerance.unwrap_or(defaults.square_tolerance),
                },
            },
        };
        filter.thresholds.validate()?;
        Ok(filter)
    }
}

/// The `filters:` block of a rule. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub size: Option<SizeBounds>,
    pub date: Option<DateBounds>,
    pub resolution: Option<ResolutionBounds>,
    pub aspect_ratio: Option<AspectConfig>,
}

impl FilterConfig {
    fn compile(&self) -> Result<Vec<FilterCriterion>, FilterError> {
        let mut criteria = Vec::new();

        if let Some(size) = &self.size {
            criteria.push(FilterCriterion::Size(SizeRange {
                min: size.min.as_ref().map(SizeValue::bytes).transpose()?,
                max: size.max.as_ref().map(SizeValue::bytes).transpose()?,
            }));
        }
        if let Some(date) = &self.date {
            criteria.push(FilterCriterion::Modified(DateRange {
                after: date.after.as_deref().map(parse_date).transpose()?,
                before: date.before.as_deref().map(parse_date).transpose()?,
            }));
        }
        if let Some(res) = &self.resolution {
            criteria.push(FilterCriterion::Resolution(ResolutionRange {
                min_width: res.min_width,
                max_width: res.max_width,
                min_height: res.min_height,
                max_height: res.max_height,
            }));
        }
        if let Some(aspect) = &self.aspect_ratio {
            criteria.push(FilterCriterion::Aspect(aspect.compile()?));
        }
        Ok(criteria)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameConfig {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

/// One entry of `move_rules` or `sorting_rules`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default, alias = "search")]
    pub pattern: Option<String>,
    #[serde(default, alias = "destination")]
    pub dest: Option<String>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub rename: Vec<RenameConfig>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub source_directory: Option<PathBuf>,
}

fn enabled_by_default() -> bool {
    true
}

impl RuleConfig {
    fn label(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.pattern.clone())
            .unwrap_or_else(|| "(unnamed)".to_string())
    }

    /// Builds the rule, resolving relative paths against `base`.
    pub fn compile(&self, base: Option<&Path>) -> Result<Rule, RuleError> {
        let pattern = self
            .pattern
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(RuleError::MissingPattern)?;

        let action = self.action.unwrap_or(Action::Move);
        let mut rule = match action {
            Action::Delete => Rule::delete(),
            Action::Copy | Action::Move => {
                let dest = self
                    .dest
                    .as_deref()
                    .ok_or(RuleError::MissingDestination { action })?;
                Rule::transfer(action, DestinationTemplate::parse(dest, base)?)
            }
        };

        rule = rule.with_criterion(FilterCriterion::Name(NamePattern::new(
            pattern,
            self.case_sensitive,
        )?));
        if let Some(dir) = &self.source_directory {
            let dir = match base {
                Some(base) if dir.is_relative() => base.join(dir),
                _ => dir.clone(),
            };
            rule = rule.with_criterion(FilterCriterion::Within(dir));
        }
        for criterion in self.filters.compile()? {
            rule = rule.with_criterion(criterion);
        }
        for rename in &self.rename {
            rule = rule.with_rename(&rename.from, &rename.to);
        }

        Ok(rule
            .with_description(self.label())
            .with_enabled(self.enabled))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeletionConfig {
    pub enabled: bool,
    pub strings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub custom_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub token: String,
    pub folder: PathBuf,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    pub unreadable: Option<PathBuf>,
    pub untagged: Option<PathBuf>,
    pub unmapped: Option<PathBuf>,
}

fn default_kinds() -> Vec<String> {
    DEFAULT_KINDS.iter().map(|k| k.to_string()).collect()
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "webp"].iter().map(|e| e.to_string()).collect()
}

/// The `tokens:` section of a token-mode preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub source_directories: Vec<PathBuf>,
    pub output_directory: PathBuf,
    #[serde(default)]
    pub strategy: Strategy,
    /// Defaults to move for first-match and copy for all-matches.
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,
    /// Custom token regex; capture group 1 is the identifier.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    #[serde(default = "default_extensions")]
    pub target_extensions: Vec<String>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

impl TokenConfig {
    fn extractor(&self) -> Result<MetadataExtractor, ConfigError> {
        match &self.pattern {
            Some(pattern) => MetadataExtractor::with_pattern(pattern, self.fields.clone())
                .map_err(|source| ConfigError::InvalidRegex {
                    context: "token pattern",
                    pattern: pattern.clone(),
                    source,
                }),
            None => MetadataExtractor::for_kinds(&self.kinds, self.fields.clone()).map_err(
                |source| ConfigError::InvalidRegex {
                    context: "token kinds",
                    pattern: self.kinds.join("|"),
                    source,
                },
            ),
        }
    }

    /// Inline routes followed by the mapping file's entries, in order.
    fn routes(&self, preset_dir: &Path) -> Result<Vec<TokenRoute>, ConfigError> {
        let output = &self.output_directory;
        let mut routes: Vec<TokenRoute> = self
            .routes
            .iter()
            .map(|r| TokenRoute::new(&r.token, output.join(&r.folder)).with_enabled(r.enabled))
            .collect();

        if let Some(file) = &self.mapping_file {
            let path = if file.is_relative() {
                preset_dir.join(file)
            } else {
                file.clone()
            };
            for (token, folder) in load_mapping(&path)? {
                routes.push(TokenRoute::new(&token, output.join(folder)));
            }
        }
        Ok(routes)
    }

    fn fallback(&self) -> TokenFallback {
        let output = &self.output_directory;
        TokenFallback {
            unreadable: self.fallback.unreadable.as_ref().map(|f| output.join(f)),
            untagged: self.fallback.untagged.as_ref().map(|f| output.join(f)),
            unmapped: self.fallback.unmapped.as_ref().map(|f| output.join(f)),
        }
    }
}

/// Reads an ordered `mappings:` table of token to folder.
pub fn load_mapping(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    let invalid = |reason: &str| ConfigError::Mapping {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mapping = value
        .get("mappings")
        .and_then(serde_yaml_ng::Value::as_mapping)
        .ok_or_else(|| invalid("expected a 'mappings' table"))?;

    mapping
        .iter()
        .map(|(key, folder)| {
            let key = match key {
                serde_yaml_ng::Value::String(s) => s.clone(),
                serde_yaml_ng::Value::Number(n) => n.to_string(),
                _ => return Err(invalid("mapping keys must be strings")),
            };
            let folder = folder
                .as_str()
                .ok_or_else(|| invalid(&format!("folder for '{key}' must be a string")))?;
            Ok((key, folder.to_string()))
        })
        .collect()
}

/// A parsed preset file.
#[derive(Debug, Clone, Deserialize)]
pub struct Preset {
    pub meta: Meta,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub exclusions: ExclusionConfig,
    #[serde(default)]
    pub move_rules: Vec<RuleConfig>,
    #[serde(default)]
    pub deletion: Option<DeletionConfig>,
    #[serde(default)]
    pub cleanup: Option<CleanupConfig>,
    #[serde(default)]
    pub sorting_rules: Vec<RuleConfig>,
    #[serde(default)]
    pub tokens: Option<TokenConfig>,
    /// File the preset was loaded from.
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

/// A compiled, ready-to-run preset.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub mode: Mode,
    pub roots: Vec<PathBuf>,
    pub recursive: bool,
    pub extensions: Vec<String>,
    pub engine: RuleEngine,
    pub extractor: MetadataExtractor,
    pub policy: DuplicatePolicy,
    pub preview: PreviewConfig,
    pub confirm: bool,
    pub dry_run: bool,
    pub logging: LoggingSettings,
    pub rejected: Vec<RejectedRule>,
}

impl Preset {
    /// Loads a preset, picking the parser from the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist, and a parse
    /// error naming the file if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let mut preset: Preset = match extension.as_str() {
            "yaml" | "yml" => {
                serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            "toml" => toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        preset.location = Some(path.to_path_buf());
        Ok(preset)
    }

    /// Loads every preset in `dir`, sorted by file name.
    ///
    /// Mapping files are skipped, and so are presets that fail to parse (with
    /// a warning).
    pub fn discover(dir: &Path) -> Result<Vec<Preset>, ConfigError> {
        let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_preset_file(path))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .filter_map(|path| match Preset::load(&path) {
                Ok(preset) => Some(preset),
                Err(e) => {
                    tracing::warn!("skipping preset {}: {}", path.display(), e);
                    None
                }
            })
            .collect())
    }

    /// Compiles the preset into a [`Job`].
    pub fn compile(&self) -> Result<Job, ConfigError> {
        let settings = &self.settings;
        if settings.preview.count == 0 {
            return Err(ConfigError::InvalidPreviewCount);
        }

        let exclusions = self.exclusions.compile()?;
        let mut rejected = Vec::new();

        let (roots, extensions, rules, extractor) = match self.meta.mode {
            Mode::Sort => {
                let roots = self.target_roots()?;
                let rules = compile_rules(&self.move_rules, roots.first(), &mut rejected);
                if rules.is_empty() {
                    return Err(ConfigError::NoUsableRules {
                        rejected: rejected.len(),
                    });
                }
                (roots, Vec::new(), RuleSet::Ordered(rules), MetadataExtractor::default())
            }
            Mode::Clean => {
                let roots = self.target_roots()?;
                let markers = match &self.deletion {
                    Some(deletion) if deletion.enabled => deletion.strings.clone(),
                    _ => Vec::new(),
                };
                let sanitizer = match &self.cleanup {
                    Some(cleanup) if cleanup.enabled => Some(
                        Sanitizer::new(&cleanup.custom_patterns).map_err(|source| {
                            ConfigError::InvalidRegex {
                                context: "cleanup",
                                pattern: cleanup.custom_patterns.join(", "),
                                source,
                            }
                        })?,
                    ),
                    _ => None,
                };
                let rules = compile_rules(&self.sorting_rules, roots.first(), &mut rejected);
                if markers.is_empty() && sanitizer.is_none() && rules.is_empty() {
                    return Err(ConfigError::NoUsableRules {
                        rejected: rejected.len(),
                    });
                }
                let clean = CleanRules::new(markers, sanitizer, rules);
                (roots, Vec::new(), RuleSet::Clean(clean), MetadataExtractor::default())
            }
            Mode::Token => {
                let tokens = self.tokens.as_ref().ok_or(ConfigError::MissingSection {
                    mode: Mode::Token,
                    section: "tokens",
                })?;
                if tokens.source_directories.is_empty() {
                    return Err(ConfigError::MissingTargets);
                }
                let action = tokens.action.unwrap_or(match tokens.strategy {
                    Strategy::FirstMatch => Action::Move,
                    Strategy::AllMatches => Action::Copy,
                });
                if action == Action::Delete {
                    return Err(ConfigError::InvalidTokenAction(action));
                }

                let routes = tokens.routes(self.preset_dir())?;
                let fallback = tokens.fallback();
                let has_fallback = fallback != TokenFallback::default();
                if !routes.iter().any(|r| r.is_enabled()) && !has_fallback {
                    return Err(ConfigError::NoUsableRules { rejected: 0 });
                }

                let routing = TokenRouting::new(routes, tokens.strategy, action).with_fallback(fallback);
                (
                    tokens.source_directories.clone(),
                    tokens.target_extensions.clone(),
                    RuleSet::Tokens(routing),
                    tokens.extractor()?,
                )
            }
        };

        Ok(Job {
            name: self.meta.name.clone(),
            mode: self.meta.mode,
            roots,
            recursive: settings.recursive,
            extensions,
            engine: RuleEngine::new(exclusions, rules),
            extractor,
            policy: settings.duplicate_handling,
            preview: settings.preview,
            confirm: settings.confirm_before_execute,
            dry_run: settings.dry_run_default,
            logging: settings.logging.clone(),
            rejected,
        })
    }

    fn target_roots(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if self.settings.target_directories.is_empty() {
            return Err(ConfigError::MissingTargets);
        }
        Ok(self.settings.target_directories.clone())
    }

    fn preset_dir(&self) -> &Path {
        self.location
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(Path::new("."))
    }

    /// File stem of the preset, if it was loaded from disk.
    pub fn stem(&self) -> Option<String> {
        self.location
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
    }
}

fn compile_rules(
    configs: &[RuleConfig],
    base: Option<&PathBuf>,
    rejected: &mut Vec<RejectedRule>,
) -> Vec<Rule> {
    let mut rules = Vec::new();
    for (index, config) in configs.iter().enumerate() {
        match config.compile(base.map(PathBuf::as_path)) {
            Ok(rule) => {
                tracing::debug!("compiled rule #{}: {}", index + 1, rule.description());
                rules.push(rule);
            }
            Err(error) => {
                tracing::warn!("rejected rule #{} ({}): {}", index + 1, config.label(), error);
                rejected.push(RejectedRule {
                    index,
                    label: config.label(),
                    error,
                });
            }
        }
    }
    rules
}

fn is_preset_file(path: &Path) -> bool {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !matches!(extension.as_str(), "yaml" | "yml" | "toml") {
        return false;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !(stem.starts_with("lora_map") || stem.ends_with("_map"))
}
