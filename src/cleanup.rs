//! Clean-mode file name sanitizer.

use regex::Regex;
use std::sync::LazyLock;

/// Name used when sanitizing strips every character from the stem.
pub const FALLBACK_STEM: &str = "cleaned_file";

static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        "\u{1F600}-\u{1F64F}",
        "\u{1F300}-\u{1F5FF}",
        "\u{1F680}-\u{1F6FF}",
        "\u{1F1E0}-\u{1F1FF}",
        "\u{2702}-\u{27B0}",
        "\u{1F200}-\u{1F251}",
        "]+",
    ))
    .expect("emoji character class is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Strips emoji and user-supplied patterns from file names.
///
/// The extension is kept as-is; only the stem is rewritten.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    custom: Vec<Regex>,
}

impl Sanitizer {
    /// Compiles the custom removal patterns.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let custom = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { custom })
    }

    /// Returns the sanitized form of `file_name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lootsort::cleanup::Sanitizer;
    ///
    /// let sanitizer = Sanitizer::new(&[r"\[free\]".to_string()]).unwrap();
    /// assert_eq!(sanitizer.clean("🔥 Cool   Track [free].mp3"), "Cool Track.mp3");
    /// assert_eq!(sanitizer.clean("🎉🎉.wav"), "cleaned_file.wav");
    /// ```
    pub fn clean(&self, file_name: &str) -> String {
        let (stem, extension) = split_extension(file_name);

        let mut stem = EMOJI.replace_all(stem, "").into_owned();
        for pattern in &self.custom {
            stem = pattern.replace_all(&stem, "").into_owned();
        }
        let collapsed = WHITESPACE.replace_all(&stem, " ");
        let trimmed = collapsed.trim();
        let stem = if trimmed.is_empty() {
            FALLBACK_STEM
        } else {
            trimmed
        };

        match extension {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        }
    }
}

fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}
