//! Filter predicate library.
//!
//! Every criterion is a pure test over a [`Candidate`]. Criteria inside a rule
//! are combined with AND; there is no OR, separate rules cover that.
//!
//! A criterion that cannot be evaluated (a resolution test on a text file, an
//! aspect test on a corrupt image) evaluates to `false` and never errors.
//!
//! # Size units
//!
//! Size strings are parsed with `byte-unit`. The suffixes `KB`, `MB`, `GB` and
//! `TB` are decimal (1000-based). The binary spellings `KiB`, `MiB`, `GiB` stay
//! 1024-based, and a bare number is a byte count.
//!
//! # Aspect classes
//!
//! Classification checks the bands in a fixed order: vertical, then horizontal,
//! then square. The first band that holds wins, so overlapping custom
//! thresholds still produce one reproducible class per image.

use crate::candidate::{Candidate, Dimensions, Probe};
use byte_unit::Byte;
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while building criteria from configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid size '{value}': {reason}")]
    InvalidSize { value: String, reason: String },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Empty name pattern")]
    EmptyPattern,

    #[error("Invalid {name} threshold {value}: must be a non-negative number")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Parses a human size string such as `"10MB"`, `"1.5 GB"` or `"2048"` into bytes.
///
/// # Examples
///
/// ```
/// use lootsort::filter::parse_size;
///
/// assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("512").unwrap(), 512);
/// ```
pub fn parse_size(value: &str) -> Result<u64, FilterError> {
    let trimmed = value.trim();
    Byte::parse_str(trimmed, true)
        .map(|b| b.as_u64())
        .map_err(|e| FilterError::InvalidSize {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
        value: value.to_string(),
    })
}

/// A single composable test.
#[derive(Debug, Clone)]
pub enum FilterCriterion {
    /// Glob or substring match on the file name (or path, see [`NamePattern`]).
    Name(NamePattern),
    /// Only files located under this directory.
    Within(PathBuf),
    /// Byte size bounds.
    Size(SizeRange),
    /// Modification date bounds.
    Modified(DateRange),
    /// Image width/height bounds.
    Resolution(ResolutionRange),
    /// Image orientation class.
    Aspect(AspectFilter),
}

impl FilterCriterion {
    pub fn matches(&self, candidate: &Candidate, probe: &dyn Probe) -> bool {
        match self {
            FilterCriterion::Name(pattern) => pattern.is_match(candidate.path()),
            FilterCriterion::Within(dir) => candidate.path().starts_with(dir),
            FilterCriterion::Size(range) => range.contains(candidate.size()),
            FilterCriterion::Modified(range) => range.contains(candidate.modified().into()),
            FilterCriterion::Resolution(range) => candidate
                .dimensions(probe)
                .is_some_and(|dims| range.contains(dims)),
            FilterCriterion::Aspect(filter) => candidate
                .dimensions(probe)
                .is_some_and(|dims| filter.matches(dims)),
        }
    }
}

#[derive(Debug, Clone)]
enum NameMatch {
    Glob(Pattern),
    Substring(String),
}

/// File name pattern.
///
/// Patterns containing `*`, `?` or `[` are globs; anything else is a plain
/// substring. Matching is case-insensitive unless asked otherwise and looks at
/// the file name only. A pattern that contains a path separator is matched
/// against the path instead, anchored at the right: `sub/*.png` matches
/// `/any/where/sub/a.png`.
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    matcher: NameMatch,
    case_sensitive: bool,
    path_scoped: bool,
}

impl NamePattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self, FilterError> {
        if pattern.is_empty() {
            return Err(FilterError::EmptyPattern);
        }

        let is_glob = pattern.contains(['*', '?', '[']);
        let path_scoped = pattern.contains('/') || pattern.contains(std::path::MAIN_SEPARATOR);

        let matcher = if is_glob {
            let compiled = Pattern::new(pattern).map_err(|e| FilterError::InvalidGlob {
                pattern: pattern.to_string(),
                reason: e.msg.to_string(),
            })?;
            NameMatch::Glob(compiled)
        } else if case_sensitive {
            NameMatch::Substring(pattern.to_string())
        } else {
            NameMatch::Substring(pattern.to_lowercase())
        };

        Ok(Self {
            raw: pattern.to_string(),
            matcher,
            case_sensitive,
            path_scoped,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        }
    }

    pub fn is_match(&self, path: &Path) -> bool {
        if self.path_scoped {
            return self.matches_path(path);
        }

        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        match &self.matcher {
            NameMatch::Glob(pattern) => pattern.matches_with(&name, self.options()),
            NameMatch::Substring(needle) => self.contains(&name, needle),
        }
    }

    fn contains(&self, haystack: &str, needle: &str) -> bool {
        if self.case_sensitive {
            haystack.contains(needle)
        } else {
            haystack.to_lowercase().contains(needle)
        }
    }

    fn matches_path(&self, path: &Path) -> bool {
        match &self.matcher {
            NameMatch::Substring(needle) => {
                let normalized = path.to_string_lossy().replace('\\', "/");
                self.contains(&normalized, &needle.replace('\\', "/"))
            }
            NameMatch::Glob(pattern) => {
                if pattern.matches_path_with(path, self.options()) {
                    return true;
                }
                // Right-anchored: try every trailing run of components.
                let components: Vec<_> = path.components().collect();
                (1..components.len()).any(|start| {
                    let suffix: PathBuf = components[start..].iter().collect();
                    pattern.matches_path_with(&suffix, self.options())
                })
            }
        }
    }
}

/// Inclusive byte-size bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn contains(&self, size: u64) -> bool {
        self.min.is_none_or(|min| size >= min) && self.max.is_none_or(|max| size <= max)
    }
}

/// Modification-date bounds in local time: `after` inclusive, `before` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, modified: DateTime<Local>) -> bool {
        let local = modified.naive_local();
        self.after
            .is_none_or(|after| local >= after.and_time(NaiveTime::MIN))
            && self
                .before
                .is_none_or(|before| local < before.and_time(NaiveTime::MIN))
    }
}

/// Inclusive pixel bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionRange {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
}

impl ResolutionRange {
    pub fn contains(&self, dims: Dimensions) -> bool {
        self.min_width.is_none_or(|v| dims.width >= v)
            && self.max_width.is_none_or(|v| dims.width <= v)
            && self.min_height.is_none_or(|v| dims.height >= v)
            && self.max_height.is_none_or(|v| dims.height <= v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClass {
    Vertical,
    Horizontal,
    Square,
}

/// Band thresholds for [`classify_aspect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectThresholds {
    /// `height / width` at or above this is vertical.
    pub vertical_min: f64,
    /// `width / height` at or above this is horizontal.
    pub horizontal_min: f64,
    /// `|width / height - 1|` at or below this is square.
    pub square_tolerance: f64,
}

impl Default for AspectThresholds {
    fn default() -> Self {
        Self {
            vertical_min: 1.2,
            horizontal_min: 1.25,
            square_tolerance: 0.05,
        }
    }
}

impl AspectThresholds {
    pub fn validate(&self) -> Result<(), FilterError> {
        let checks = [
            ("vertical_min", self.vertical_min),
            ("horizontal_min", self.horizontal_min),
            ("square_tolerance", self.square_tolerance),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(FilterError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Classifies an image by orientation, or `None` if it falls in no band.
///
/// # Examples
///
/// ```
/// use lootsort::candidate::Dimensions;
/// use lootsort::filter::{classify_aspect, AspectClass, AspectThresholds};
///
/// let th = AspectThresholds::default();
/// assert_eq!(classify_aspect(Dimensions::new(800, 1200), &th), Some(AspectClass::Vertical));
/// assert_eq!(classify_aspect(Dimensions::new(1920, 1080), &th), Some(AspectClass::Horizontal));
/// assert_eq!(classify_aspect(Dimensions::new(1000, 1000), &th), Some(AspectClass::Square));
/// assert_eq!(classify_aspect(Dimensions::new(1000, 1100), &th), None);
/// ```
pub fn classify_aspect(dims: Dimensions, thresholds: &AspectThresholds) -> Option<AspectClass> {
    if dims.width == 0 || dims.height == 0 {
        return None;
    }
    let width = f64::from(dims.width);
    let height = f64::from(dims.height);

    if height / width >= thresholds.vertical_min {
        Some(AspectClass::Vertical)
    } else if width / height >= thresholds.horizontal_min {
        Some(AspectClass::Horizontal)
    } else if (width / height - 1.0).abs() <= thresholds.square_tolerance {
        Some(AspectClass::Square)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFilter {
    pub class: AspectClass,
    pub thresholds: AspectThresholds,
}

impl AspectFilter {
    pub fn matches(&self, dims: Dimensions) -> bool {
        classify_aspect(dims, &self.thresholds) == Some(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TokenScan;
    use chrono::TimeZone;
    use std::time::SystemTime;

    struct NoProbe;

    impl Probe for NoProbe {
        fn dimensions(&self, _path: &Path) -> Option<Dimensions> {
            None
        }
        fn tokens(&self, _path: &Path) -> TokenScan {
            TokenScan::Unreadable
        }
    }

    fn candidate(path: &str, size: u64) -> Candidate {
        Candidate::new(path, size, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn test_parse_size_decimal_units() {
        assert_eq!(parse_size("1KB").unwrap(), 1_000);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
        assert_eq!(parse_size("1.5GB").unwrap(), 1_500_000_000);
        assert_eq!(parse_size(" 2 mb ").unwrap(), 2_000_000);
    }

    #[test]
    fn test_parse_size_binary_and_bare() {
        assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
        assert_eq!(parse_size("4096").unwrap(), 4096);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("ten megabytes").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_size_filter_scenario() {
        // video.mp4 at 12 MB against "size > 10MB"
        let range = SizeRange {
            min: Some(parse_size("10MB").unwrap()),
            max: None,
        };
        let video = candidate("/downloads/video.mp4", 12_000_000);
        assert!(FilterCriterion::Size(range).matches(&video, &NoProbe));

        let small = candidate("/downloads/clip.mp4", 9_000_000);
        assert!(!FilterCriterion::Size(range).matches(&small, &NoProbe));
    }

    #[test]
    fn test_size_bounds_inclusive() {
        let range = SizeRange {
            min: Some(100),
            max: Some(200),
        };
        assert!(range.contains(100));
        assert!(range.contains(200));
        assert!(!range.contains(99));
        assert!(!range.contains(201));
    }

    #[test]
    fn test_glob_case_insensitive_on_file_name() {
        let pattern = NamePattern::new("*.MP4", false).unwrap();
        assert!(pattern.is_match(Path::new("/a/b/movie.mp4")));
        assert!(pattern.is_match(Path::new("/a/b/MOVIE.Mp4")));
        assert!(!pattern.is_match(Path::new("/a/b/movie.mkv")));
    }

    #[test]
    fn test_glob_ignores_directories_without_separator() {
        let pattern = NamePattern::new("photos*", false).unwrap();
        assert!(!pattern.is_match(Path::new("/photos/img.png")));
        assert!(pattern.is_match(Path::new("/misc/photos_2024.zip")));
    }

    #[test]
    fn test_glob_case_sensitive() {
        let pattern = NamePattern::new("*.PNG", true).unwrap();
        assert!(pattern.is_match(Path::new("a.PNG")));
        assert!(!pattern.is_match(Path::new("a.png")));
    }

    #[test]
    fn test_substring_pattern() {
        let pattern = NamePattern::new("Invoice", false).unwrap();
        assert!(pattern.is_match(Path::new("/docs/2024_invoice_final.pdf")));
        assert!(!pattern.is_match(Path::new("/invoice/receipt.pdf")));
    }

    #[test]
    fn test_pattern_with_separator_matches_path_suffix() {
        let pattern = NamePattern::new("screens/*.png", false).unwrap();
        assert!(pattern.is_match(Path::new("/home/user/screens/shot.png")));
        assert!(!pattern.is_match(Path::new("/home/user/other/shot.png")));

        let substring = NamePattern::new("archive/old", false).unwrap();
        assert!(substring.is_match(Path::new("/data/Archive/Old/file.txt")));
    }

    #[test]
    fn test_invalid_glob() {
        assert!(matches!(
            NamePattern::new("[unclosed", false),
            Err(FilterError::InvalidGlob { .. })
        ));
        assert_eq!(NamePattern::new("", false).unwrap_err(), FilterError::EmptyPattern);
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange {
            after: Some(parse_date("2024-01-01").unwrap()),
            before: Some(parse_date("2024-02-01").unwrap()),
        };
        let inside = Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let at_start = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let at_end = Local.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let before = Local.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();

        assert!(range.contains(inside));
        assert!(range.contains(at_start));
        assert!(!range.contains(at_end));
        assert!(!range.contains(before));
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date("01/02/2024").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn test_resolution_on_non_image_is_false() {
        let criterion = FilterCriterion::Resolution(ResolutionRange {
            min_width: Some(1),
            ..Default::default()
        });
        let text = candidate("/notes.txt", 10);
        assert!(!criterion.matches(&text, &NoProbe));
    }

    #[test]
    fn test_resolution_range() {
        let criterion = FilterCriterion::Resolution(ResolutionRange {
            min_width: Some(1920),
            min_height: Some(1080),
            ..Default::default()
        });
        let big = candidate("/a.png", 1).with_dimensions(Some(Dimensions::new(3840, 2160)));
        let small = candidate("/b.png", 1).with_dimensions(Some(Dimensions::new(1280, 720)));
        assert!(criterion.matches(&big, &NoProbe));
        assert!(!criterion.matches(&small, &NoProbe));
    }

    #[test]
    fn test_aspect_classification_order() {
        // Overlapping bands: everything near square is also "vertical" here.
        let overlapping = AspectThresholds {
            vertical_min: 0.9,
            horizontal_min: 1.25,
            square_tolerance: 0.2,
        };
        assert_eq!(
            classify_aspect(Dimensions::new(1000, 1000), &overlapping),
            Some(AspectClass::Vertical)
        );
    }

    #[test]
    fn test_aspect_default_bands() {
        let th = AspectThresholds::default();
        assert_eq!(classify_aspect(Dimensions::new(100, 120), &th), Some(AspectClass::Vertical));
        assert_eq!(classify_aspect(Dimensions::new(125, 100), &th), Some(AspectClass::Horizontal));
        assert_eq!(classify_aspect(Dimensions::new(104, 100), &th), Some(AspectClass::Square));
        assert_eq!(classify_aspect(Dimensions::new(110, 100), &th), None);
        assert_eq!(classify_aspect(Dimensions::new(0, 100), &th), None);
    }

    #[test]
    fn test_aspect_filter_on_candidate() {
        let filter = FilterCriterion::Aspect(AspectFilter {
            class: AspectClass::Vertical,
            thresholds: AspectThresholds::default(),
        });
        let portrait = candidate("/p.png", 1).with_dimensions(Some(Dimensions::new(832, 1216)));
        let landscape = candidate("/l.png", 1).with_dimensions(Some(Dimensions::new(1216, 832)));
        let broken = candidate("/x.png", 1).with_dimensions(None);
        assert!(filter.matches(&portrait, &NoProbe));
        assert!(!filter.matches(&landscape, &NoProbe));
        assert!(!filter.matches(&broken, &NoProbe));
    }

    #[test]
    fn test_threshold_validation() {
        let bad = AspectThresholds {
            vertical_min: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(AspectThresholds::default().validate().is_ok());

        let exact_square = AspectThresholds {
            square_tolerance: 0.0,
            ..Default::default()
        };
        assert!(exact_square.validate().is_ok());

        let negative = AspectThresholds {
            horizontal_min: -1.0,
            ..Default::default()
        };
        let err = negative.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid horizontal_min threshold -1: must be a non-negative number"
        );
    }

    #[test]
    fn test_within_directory() {
        let criterion = FilterCriterion::Within(PathBuf::from("/data/inbox"));
        assert!(criterion.matches(&candidate("/data/inbox/a.txt", 1), &NoProbe));
        assert!(criterion.matches(&candidate("/data/inbox/sub/a.txt", 1), &NoProbe));
        assert!(!criterion.matches(&candidate("/data/other/a.txt", 1), &NoProbe));
    }
}
