//! Incremental artifact generation.
//!
//! Stage 2 of the build pipeline. Takes the [`Library`] from the scan stage
//! and brings every song's generated artifacts up to date.
//!
//! ## Categories
//!
//! Each song has two independent artifact categories:
//!
//! | Category | Source | Steps | Output |
//! |---|---|---|---|
//! | **slides** | `projector.mscx` | score → PDF → one SVG per page, PDF deleted | `NB/Projector_noNNN.svg` |
//! | **piano** | `piano.mscx` / `lead.mscx` | scratch copy → one EPS per page | `NB/Piano_noNNN.eps` |
//!
//! ## Rebuild Rule
//!
//! A category is rebuilt when
//!
//! ```text
//! force || source modified || no artifacts
//! ```
//!
//! The hash check is made even when `force` or missing artifacts already
//! decide the outcome, so the hash store always holds the digest of the
//! source that produced the current artifacts. A rebuild first deletes the
//! category's existing artifacts; an interrupted build is repaired by the
//! next one.
//!
//! ## Failures
//!
//! A converter failure only fails that song's category and is reported in
//! the [`SongReport`]. The rest of the library is still built.
//!
//! ## Parallel Processing
//!
//! Songs are built with [rayon](https://docs.rs/rayon) on the global pool,
//! which the CLI sizes from `processing.max_processes` (sequential by
//! default). The hash store serializes its own writes.

use crate::config::SongbookConfig;
use crate::convert::{self, Converter, ConverterError};
use crate::hash_store::{ContentHashStore, HashStoreError};
use crate::naming::{self, NamingError};
use crate::scan::{Library, ScanError};
use crate::song::{Song, SongError};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

/// File name of the PDF rendered from the projector score.
const PROJECTOR_PDF: &str = "projector.pdf";

/// Leftovers of older layouts removed by `clean`, relative to the song folder.
const LEGACY_ARTIFACTS: &[&str] = &["projector.pdf", "slides", "piano"];

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Hash store error: {0}")]
    HashStore(#[from] HashStoreError),
    #[error("Converter error: {0}")]
    Converter(#[from] ConverterError),
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
    #[error("Song error: {0}")]
    Song(#[from] SongError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Invalid mode {0:?} (expected all, slides or piano)")]
    InvalidMode(String),
    #[error("No song with ID or folder {0:?}")]
    UnknownSong(String),
    #[error("Converter produced no PDF for {0}")]
    PdfNotProduced(PathBuf),
}

/// Which artifact categories a build touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    #[default]
    All,
    Slides,
    Piano,
}

impl BuildMode {
    pub fn includes_slides(self) -> bool {
        matches!(self, BuildMode::All | BuildMode::Slides)
    }

    pub fn includes_piano(self) -> bool {
        matches!(self, BuildMode::All | BuildMode::Piano)
    }
}

impl FromStr for BuildMode {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(BuildMode::All),
            "slides" => Ok(BuildMode::Slides),
            "piano" => Ok(BuildMode::Piano),
            other => Err(ProcessError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildMode::All => "all",
            BuildMode::Slides => "slides",
            BuildMode::Piano => "piano",
        })
    }
}

/// What happened to one artifact category of one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// The build mode excluded this category.
    NotRequested,
    UpToDate,
    /// Rebuilt; holds the number of pages produced.
    Generated(usize),
    /// The song has no source file for this category.
    NoSource,
    Failed(String),
}

impl CategoryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CategoryOutcome::Failed(_))
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, CategoryOutcome::Generated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongReport {
    pub song_id: String,
    pub title: String,
    pub slides: CategoryOutcome,
    pub piano: CategoryOutcome,
}

impl SongReport {
    pub fn has_failure(&self) -> bool {
        self.slides.is_failure() || self.piano.is_failure()
    }

    pub fn has_generated(&self) -> bool {
        self.slides.is_generated() || self.piano.is_generated()
    }
}

/// Per-song outcomes of a library build, in library order.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub songs: Vec<SongReport>,
}

impl BuildReport {
    pub fn failures(&self) -> impl Iterator<Item = &SongReport> {
        self.songs.iter().filter(|s| s.has_failure())
    }

    pub fn generated_count(&self) -> usize {
        self.songs.iter().filter(|s| s.has_generated()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

/// Progress events streamed while a library is built.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Started { song_count: usize },
    SongBuilt { index: usize, report: SongReport },
}

/// Sources already converted during this invocation.
///
/// Created per run and handed to the builder; a source that shows up twice
/// (say, a song updated by ID and by folder in one call) converts once.
/// Only successful conversions are recorded; a failed one is tried again.
#[derive(Debug, Default)]
pub struct ConversionCache {
    converted: Mutex<HashSet<PathBuf>>,
}

impl ConversionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` was already converted successfully in this run.
    fn contains(&self, source: &Path) -> bool {
        self.converted
            .lock()
            .map(|converted| converted.contains(&Self::key(source)))
            .unwrap_or(false)
    }

    /// Record a successful conversion of `source`.
    fn record(&self, source: &Path) {
        if let Ok(mut converted) = self.converted.lock() {
            converted.insert(Self::key(source));
        }
    }

    fn key(source: &Path) -> PathBuf {
        std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf())
    }

    pub fn len(&self) -> usize {
        self.converted.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Paths removed by a clean.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
}

/// Brings song artifacts up to date through a [`Converter`].
pub struct ArtifactBuilder<'a, C: Converter> {
    converter: &'a C,
    store: &'a ContentHashStore,
    config: &'a SongbookConfig,
    cache: &'a ConversionCache,
}

impl<'a, C: Converter> ArtifactBuilder<'a, C> {
    pub fn new(
        converter: &'a C,
        store: &'a ContentHashStore,
        config: &'a SongbookConfig,
        cache: &'a ConversionCache,
    ) -> Self {
        Self {
            converter,
            store,
            config,
            cache,
        }
    }

    /// Build the requested categories of one song.
    pub fn build_song(&self, song: &mut Song, mode: BuildMode, force: bool) -> SongReport {
        let slides = if mode.includes_slides() {
            match song.projector_source.clone() {
                Some(source) => {
                    let missing = song.slide_files.is_empty();
                    self.build_category(song, &source, force, missing, Self::generate_slides)
                }
                None => CategoryOutcome::NoSource,
            }
        } else {
            CategoryOutcome::NotRequested
        };

        let piano = if mode.includes_piano() {
            match song.piano_source.clone() {
                Some(source) => {
                    let missing = song.piano_files.is_empty();
                    self.build_category(song, &source, force, missing, Self::generate_piano)
                }
                None => CategoryOutcome::NoSource,
            }
        } else {
            CategoryOutcome::NotRequested
        };

        SongReport {
            song_id: song.song_id.clone(),
            title: song.title().to_string(),
            slides,
            piano,
        }
    }

    fn build_category(
        &self,
        song: &mut Song,
        source: &Path,
        force: bool,
        missing: bool,
        generate: fn(&Self, &mut Song, &Path) -> Result<usize, ProcessError>,
    ) -> CategoryOutcome {
        let modified = match self.store.is_modified(source) {
            Ok(modified) => modified,
            Err(e) => return CategoryOutcome::Failed(e.to_string()),
        };
        if !(force || modified || missing) {
            debug!(song = %song.song_id, source = %source.display(), "up to date");
            return CategoryOutcome::UpToDate;
        }
        if self.cache.contains(source) {
            debug!(source = %source.display(), "already converted in this run");
            return CategoryOutcome::UpToDate;
        }

        debug!(song = %song.song_id, source = %source.display(), force, modified, missing, "rebuilding");
        match generate(self, song, source) {
            Ok(pages) => {
                self.cache.record(source);
                info!(song = %song.song_id, source = %source.display(), pages, "generated");
                CategoryOutcome::Generated(pages)
            }
            Err(e) => {
                warn!(song = %song.song_id, source = %source.display(), error = %e, "conversion failed");
                CategoryOutcome::Failed(e.to_string())
            }
        }
    }

    fn generate_slides(&self, song: &mut Song, source: &Path) -> Result<usize, ProcessError> {
        let base = &self.config.naming.slides;
        let dir = song.intermediate_dir.clone();
        fs::create_dir_all(&dir)?;
        naming::delete_files(&dir, &naming::artifact_suffix(base)?)?;
        song.slide_files.clear();

        let pdf_path = dir.join(PROJECTOR_PDF);
        let pdf = convert::render_to_pdf(self.converter, source, &pdf_path)?
            .ok_or_else(|| ProcessError::PdfNotProduced(source.to_path_buf()))?;
        let pages = convert::render_pdf_to_page_images(self.converter, &pdf, &dir, base);
        if let Err(e) = fs::remove_file(&pdf) {
            warn!(pdf = %pdf.display(), error = %e, "could not remove intermediate PDF");
        }

        song.slide_files = pages?;
        Ok(song.slide_files.len())
    }

    fn generate_piano(&self, song: &mut Song, source: &Path) -> Result<usize, ProcessError> {
        let base = &self.config.naming.piano;
        let dir = song.intermediate_dir.clone();
        fs::create_dir_all(&dir)?;
        naming::delete_files(&dir, &naming::artifact_suffix(base)?)?;
        song.piano_files.clear();

        song.piano_files = convert::render_score_to_page_images(self.converter, source, &dir, base)?;
        Ok(song.piano_files.len())
    }

    /// Build every song of the library. Progress goes to `events` if given.
    pub fn build_library(
        &self,
        library: &mut Library,
        mode: BuildMode,
        force: bool,
        events: Option<&Sender<BuildEvent>>,
    ) -> BuildReport {
        if let Some(tx) = events {
            tx.send(BuildEvent::Started {
                song_count: library.len(),
            })
            .ok();
        }

        let songs = library
            .songs_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(i, song)| {
                let report = self.build_song(song, mode, force);
                if let Some(tx) = events {
                    tx.send(BuildEvent::SongBuilt {
                        index: i + 1,
                        report: report.clone(),
                    })
                    .ok();
                }
                report
            })
            .collect();

        BuildReport { songs }
    }

    /// Rebuild one song, forced, by song ID or by folder path.
    ///
    /// A folder outside the library is loaded directly; one inside it also
    /// refreshes the library's copy of the song.
    pub fn update_song(
        &self,
        library: &mut Library,
        target: &str,
        mode: BuildMode,
    ) -> Result<SongReport, ProcessError> {
        if let Some(song) = library.get_mut(target) {
            return Ok(self.build_song(song, mode, true));
        }

        let path = Path::new(target);
        if !path.exists() {
            return Err(ProcessError::UnknownSong(target.to_string()));
        }
        let mut song = Song::load(path, self.config)?;
        let report = self.build_song(&mut song, mode, true);
        if let Some(existing) = library.get_mut(&song.song_id)
            && existing.folder == song.folder
        {
            *existing = song;
        }
        Ok(report)
    }
}

/// Remove one song's generated artifacts and reset its artifact lists.
pub fn clean_song(song: &mut Song) -> Result<Vec<PathBuf>, ProcessError> {
    let mut removed = Vec::new();
    let mut targets = vec![song.intermediate_dir.clone()];
    targets.extend(LEGACY_ARTIFACTS.iter().map(|name| song.folder.join(name)));

    for target in targets {
        if remove_path(&target)? {
            removed.push(target);
        }
    }
    song.slide_files.clear();
    song.piano_files.clear();
    debug!(song = %song.song_id, removed = removed.len(), "cleaned");
    Ok(removed)
}

/// Clean every song, delete the assembled document and purge the hash store.
pub fn clean_library(
    library: &mut Library,
    store: &ContentHashStore,
    config: &SongbookConfig,
) -> Result<CleanReport, ProcessError> {
    let mut report = CleanReport::default();
    for song in library.songs_mut() {
        report.removed.extend(clean_song(song)?);
    }

    let document = config.document_path(library.base_path());
    if remove_path(&document)? {
        report.removed.push(document);
    }
    if store.path().exists() {
        report.removed.push(store.path().to_path_buf());
    }
    store.purge()?;
    info!(removed = report.removed.len(), "library cleaned");
    Ok(report)
}

/// Remove a file or directory tree. Returns whether anything was there.
fn remove_path(path: &Path) -> io::Result<bool> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
