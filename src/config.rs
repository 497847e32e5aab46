//! Songbook configuration module.
//!
//! Handles loading, validating, and merging `songbook.toml`. Configuration is
//! layered: stock defaults are overridden by an optional `songbook.toml` in
//! the library base directory.
//!
//! ## Config File Location
//!
//! ```text
//! songs/
//! ├── songbook.toml            # Overrides stock defaults
//! ├── a/
//! │   └── Auf-der-Mauer/
//! │       ├── info.yml
//! │       ├── projector.mscx
//! │       └── piano.mscx
//! └── s/
//!     └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [files]
//! metadata = "info.yml"
//! projector = ["projector.mscx"]
//! piano = ["piano.mscx", "lead.mscx"]   # First existing file wins
//! intermediate_dir = "NB"
//! hash_store = "filehashes.json"
//! document = "songs.tex"
//!
//! [naming]
//! slides = "Projector.svg"     # → Projector_no001.svg, Projector_no002.svg, …
//! piano = "Piano.eps"          # → Piano_no001.eps, …
//!
//! [converters]
//! score_to_pdf = "mscore"
//! pdf_to_images = "pdf2svg"
//! score_to_images = "mscore-to-vector.sh"
//!
//! [document]
//! layout = "page-turn"         # page-turn | alphabetical | sequential
//!
//! [processing]
//! max_processes = 1            # Songs built in parallel (omit for sequential)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Name of the configuration file in the library base directory.
pub const CONFIG_FILENAME: &str = "songbook.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Songbook configuration loaded from `songbook.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SongbookConfig {
    /// File names looked up inside song folders and the base directory.
    pub files: FilesConfig,
    /// Canonical base names of generated multi-part artifacts.
    pub naming: NamingConfig,
    /// External converter programs.
    pub converters: ConvertersConfig,
    /// Assembled document settings.
    pub document: DocumentConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SongbookConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.projector.is_empty() {
            return Err(ConfigError::Validation(
                "files.projector must list at least one file name".into(),
            ));
        }
        if self.files.piano.is_empty() {
            return Err(ConfigError::Validation(
                "files.piano must list at least one file name".into(),
            ));
        }
        for (key, value) in [
            ("files.metadata", &self.files.metadata),
            ("files.intermediate_dir", &self.files.intermediate_dir),
            ("files.hash_store", &self.files.hash_store),
            ("files.document", &self.files.document),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a plain file name, got {value:?}"
                )));
            }
        }
        for (key, value) in [
            ("naming.slides", &self.naming.slides),
            ("naming.piano", &self.naming.piano),
        ] {
            if crate::naming::artifact_suffix(value).is_err() {
                return Err(ConfigError::Validation(format!(
                    "{key} needs a file extension, got {value:?}"
                )));
            }
        }
        // Both categories share the intermediate folder and are told apart
        // by their file extension alone.
        let slides_suffix = crate::naming::artifact_suffix(&self.naming.slides);
        let piano_suffix = crate::naming::artifact_suffix(&self.naming.piano);
        if let (Ok(slides), Ok(piano)) = (slides_suffix, piano_suffix)
            && slides.eq_ignore_ascii_case(&piano)
        {
            return Err(ConfigError::Validation(format!(
                "naming.slides and naming.piano need different extensions, both use {slides:?}"
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Path of the hash store for a library rooted at `base`.
    pub fn hash_store_path(&self, base: &Path) -> PathBuf {
        base.join(&self.files.hash_store)
    }

    /// Path of the assembled document for a library rooted at `base`.
    pub fn document_path(&self, base: &Path) -> PathBuf {
        base.join(&self.files.document)
    }
}

/// File names the pipeline reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Metadata file marking a song folder.
    pub metadata: String,
    /// Candidate projector scores, tried in order.
    pub projector: Vec<String>,
    /// Candidate piano scores, tried in order.
    pub piano: Vec<String>,
    /// Per-song folder holding generated artifacts.
    pub intermediate_dir: String,
    /// Hash store file in the base directory.
    pub hash_store: String,
    /// Assembled document file in the base directory.
    pub document: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            metadata: "info.yml".into(),
            projector: vec!["projector.mscx".into()],
            piano: vec!["piano.mscx".into(), "lead.mscx".into()],
            intermediate_dir: "NB".into(),
            hash_store: "filehashes.json".into(),
            document: "songs.tex".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub slides: String,
    pub piano: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            slides: "Projector.svg".into(),
            piano: "Piano.eps".into(),
        }
    }
}

/// External programs invoked by the command converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertersConfig {
    /// Notation editor exporting a score to PDF (`<prog> --export-to <pdf> <score>`).
    pub score_to_pdf: String,
    /// PDF splitter writing one vector image per page (`<prog> <pdf> <pattern> all`).
    pub pdf_to_images: String,
    /// Helper exporting a score to one vector image per page (`<prog> -e <score>`).
    pub score_to_images: String,
}

impl Default for ConvertersConfig {
    fn default() -> Self {
        Self {
            score_to_pdf: "mscore".into(),
            pdf_to_images: "pdf2svg".into(),
            score_to_images: "mscore-to-vector.sh".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    pub layout: DocumentLayout,
}

/// How songs are arranged in the assembled document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentLayout {
    /// Page groups from the layout planner; no song is split by a page turn.
    #[default]
    PageTurn,
    /// One chapter per `abc` bucket.
    Alphabetical,
    /// Library order, no optimization.
    Sequential,
}

impl DocumentLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentLayout::PageTurn => "page-turn",
            DocumentLayout::Alphabetical => "alphabetical",
            DocumentLayout::Sequential => "sequential",
        }
    }
}

impl fmt::Display for DocumentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page-turn" => Ok(DocumentLayout::PageTurn),
            "alphabetical" => Ok(DocumentLayout::Alphabetical),
            "sequential" => Ok(DocumentLayout::Sequential),
            other => Err(ConfigError::Validation(format!(
                "unknown document layout {other:?} (expected page-turn, alphabetical or sequential)"
            ))),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of songs built in parallel.
    /// When absent, songs are built one after another.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → 1 (sequential)
/// - `Some(n)` → `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.unwrap_or(1).min(cores).max(1)
}

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SongbookConfig::default())?)
}

/// Deep-merge `overlay` onto `base`. Tables merge key by key; everything
/// else in the overlay replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `songbook.toml` from `base` without deserializing it into a config.
pub fn load_raw_config(base: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = base.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SongbookConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SongbookConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration for a library rooted at `base`.
pub fn load_config(base: &Path) -> Result<SongbookConfig, ConfigError> {
    let defaults = stock_defaults_value()?;
    let overlay = load_raw_config(base)?;
    resolve_config(defaults, overlay)
}

/// A fully documented `songbook.toml` with every stock default.
pub fn stock_config_toml() -> &'static str {
    r##"# Songbook Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as songbook.toml in the library base directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# File names
# ---------------------------------------------------------------------------
[files]
# Metadata file; every folder containing one is a song.
metadata = "info.yml"
# Projector score candidates, first existing file wins.
projector = ["projector.mscx"]
# Piano score candidates, first existing file wins.
piano = ["piano.mscx", "lead.mscx"]
# Folder inside each song receiving generated artifacts.
intermediate_dir = "NB"
# Content hash store in the base directory.
hash_store = "filehashes.json"
# Assembled document in the base directory.
document = "songs.tex"

# ---------------------------------------------------------------------------
# Artifact naming
# ---------------------------------------------------------------------------
[naming]
# Pages are numbered <stem>_no001.<ext>, <stem>_no002.<ext>, ...
# Both share the intermediate folder, so their extensions must differ.
slides = "Projector.svg"
piano = "Piano.eps"

# ---------------------------------------------------------------------------
# External converters
# ---------------------------------------------------------------------------
[converters]
# Invoked as: mscore --export-to <pdf> <score>
score_to_pdf = "mscore"
# Invoked as: pdf2svg <pdf> <dir>/%02d.svg all
pdf_to_images = "pdf2svg"
# Invoked as: mscore-to-vector.sh -e <score>
score_to_images = "mscore-to-vector.sh"

# ---------------------------------------------------------------------------
# Assembled document
# ---------------------------------------------------------------------------
[document]
# page-turn: songs never split across a page turn
# alphabetical: one chapter per initial letter
# sequential: library order
layout = "page-turn"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Songs built in parallel. Omit to build one song at a time.
# max_processes = 4
"##
}
