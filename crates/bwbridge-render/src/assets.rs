//! Asset sources: where the compositor gets palettes, megatiles and
//! player-colour tables from.
//!
//! Assets are addressed by canonical lowercase paths such as
//! `tileset/jungle.wpe`. [`DirectoryAssets`] resolves them against a directory
//! tree case-insensitively, so data copied from case-preserving file systems
//! (`TileSet/Jungle.WPE`) still loads. [`MemoryAssets`] serves tests and
//! embedded data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::tileset::{megatile_path, palette_path, TILESET_NAMES};
use crate::RenderError;

/// Canonical path of the optional player-colour table.
pub const PLAYER_COLORS_PATH: &str = "game/tunit.dat";

/// A provider of asset bytes by canonical path.
pub trait AssetSource {
    /// The bytes of `canonical`, or `None` if the asset does not exist.
    fn resolve(&self, canonical: &str) -> Option<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// AssetReport
// ---------------------------------------------------------------------------

/// Result of checking an asset source for the files the compositor uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// `true` when at least one complete tileset (palette + megatiles) exists.
    pub is_valid: bool,
    pub error: Option<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
}

/// Check which known assets `source` provides.
pub fn validate(source: &dyn AssetSource) -> AssetReport {
    let mut report = AssetReport::default();
    let mut complete_tilesets = 0;
    for index in 0..TILESET_NAMES.len() {
        let mut complete = true;
        for path in [palette_path(index), megatile_path(index)] {
            if source.resolve(&path).is_some() {
                report.found.push(path);
            } else {
                complete = false;
                report.missing.push(path);
            }
        }
        if complete {
            complete_tilesets += 1;
        }
    }
    if source.resolve(PLAYER_COLORS_PATH).is_some() {
        report.found.push(PLAYER_COLORS_PATH.to_owned());
    } else {
        report.missing.push(PLAYER_COLORS_PATH.to_owned());
    }

    report.is_valid = complete_tilesets > 0;
    if !report.is_valid {
        report.error = Some("no complete tileset (palette and megatiles) found".to_owned());
    }
    report
}

// ---------------------------------------------------------------------------
// DirectoryAssets
// ---------------------------------------------------------------------------

/// Assets stored as loose files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    /// Use `root` as the asset directory.
    ///
    /// # Errors
    ///
    /// [`RenderError::Io`] if `root` is not a readable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let root = root.into();
        std::fs::read_dir(&root).map_err(|source| RenderError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The on-disk path of `canonical`, matching each component without
    /// regard to ASCII case.
    pub fn resolved_path(&self, canonical: &str) -> Option<PathBuf> {
        let mut current = self.root.clone();
        for component in canonical.split('/').filter(|c| !c.is_empty()) {
            let exact = current.join(component);
            if exact.exists() {
                current = exact;
                continue;
            }
            let entries = std::fs::read_dir(&current).ok()?;
            let found = entries
                .filter_map(Result::ok)
                .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(component))?;
            current = found.path();
        }
        current.is_file().then_some(current)
    }
}

impl AssetSource for DirectoryAssets {
    fn resolve(&self, canonical: &str) -> Option<Vec<u8>> {
        let path = self.resolved_path(canonical)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read asset");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryAssets
// ---------------------------------------------------------------------------

/// Assets held in memory, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canonical: &str, bytes: Vec<u8>) {
        self.files.insert(canonical.to_ascii_lowercase(), bytes);
    }

    pub fn with(mut self, canonical: &str, bytes: Vec<u8>) -> Self {
        self.insert(canonical, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn resolve(&self, canonical: &str) -> Option<Vec<u8>> {
        self.files.get(&canonical.to_ascii_lowercase()).cloned()
    }
}
