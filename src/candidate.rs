//! Scanned file snapshots.
//!
//! A [`Candidate`] captures what the scan saw: path, size and modification time.
//! Image dimensions and metadata tokens are expensive, so they are computed on
//! first use through a [`Probe`] and cached next to the snapshot. Each cache
//! cell is either empty (not computed yet) or holds the computed answer, which
//! may itself be "absent" for files that are not images.

use crate::metadata::{MetadataExtractor, TokenScan};
use std::cell::OnceCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Source of derived data for candidates.
///
/// The matching code only ever talks to this trait, so rule evaluation can be
/// tested without touching the filesystem.
pub trait Probe {
    /// Reads image dimensions, or `None` if the file is not a readable image.
    fn dimensions(&self, path: &Path) -> Option<Dimensions>;

    /// Scans embedded image metadata for reference tokens.
    fn tokens(&self, path: &Path) -> TokenScan;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsProbe {
    extractor: MetadataExtractor,
}

impl FsProbe {
    pub fn new(extractor: MetadataExtractor) -> Self {
        Self { extractor }
    }
}

impl Probe for FsProbe {
    fn dimensions(&self, path: &Path) -> Option<Dimensions> {
        match image::image_dimensions(path) {
            Ok((width, height)) if width > 0 && height > 0 => Some(Dimensions::new(width, height)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("no dimensions for {}: {}", path.display(), e);
                None
            }
        }
    }

    fn tokens(&self, path: &Path) -> TokenScan {
        self.extractor.scan(path)
    }
}

/// One filesystem entry under consideration.
#[derive(Debug, Clone)]
pub struct Candidate {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
    dimensions: OnceCell<Option<Dimensions>>,
    tokens: OnceCell<TokenScan>,
}

impl Candidate {
    /// Creates a snapshot from already-known stat data.
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            dimensions: OnceCell::new(),
            tokens: OnceCell::new(),
        }
    }

    /// Stats `path` and snapshots the result.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path, metadata.len(), metadata.modified()?))
    }

    /// Pre-fills the dimension cache.
    pub fn with_dimensions(self, dimensions: Option<Dimensions>) -> Self {
        let _ = self.dimensions.set(dimensions);
        self
    }

    /// Pre-fills the token cache.
    pub fn with_tokens(self, tokens: TokenScan) -> Self {
        let _ = self.tokens.set(tokens);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The final path component, lossily converted to UTF-8.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Image dimensions, computed through `probe` at most once.
    pub fn dimensions(&self, probe: &dyn Probe) -> Option<Dimensions> {
        *self.dimensions.get_or_init(|| probe.dimensions(&self.path))
    }

    /// Metadata tokens, computed through `probe` at most once.
    pub fn tokens(&self, probe: &dyn Probe) -> &TokenScan {
        self.tokens.get_or_init(|| probe.tokens(&self.path))
    }
}
