//! One song folder and its generated artifacts.
//!
//! A song lives at `<base>/<abc>/<song_id>/`:
//!
//! ```text
//! s/                              # abc bucket (initial letter)
//! └── Swing-low/                  # song_id, unique in a library
//!     ├── info.yml                # metadata, marks the folder as a song
//!     ├── projector.mscx          # projector source (slides)
//!     ├── piano.mscx              # piano source (or lead.mscx)
//!     └── NB/                     # intermediate artifacts
//!         ├── Projector_no001.svg
//!         ├── Piano_no001.eps
//!         └── Piano_no002.eps
//! ```
//!
//! Identity is derived from the path alone by [`identity_from_folder`], so it
//! can be tested without touching the filesystem. Sources are resolved by
//! trying the configured candidate names in order. Existing artifacts are
//! discovered when the song is loaded.

use crate::config::SongbookConfig;
use crate::metadata::{MetadataError, SongMetadata};
use crate::naming::{self, NamingError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SongError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
    #[error("Song folder not found: {0}")]
    FolderNotFound(PathBuf),
    #[error("Cannot derive abc bucket and song ID from {0}")]
    InvalidFolder(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Song {
    /// Absolute path of the song folder.
    pub folder: PathBuf,
    /// Name of the parent directory, usually the initial letter.
    pub abc: String,
    /// Name of the song folder.
    pub song_id: String,
    pub metadata: SongMetadata,
    pub projector_source: Option<PathBuf>,
    pub piano_source: Option<PathBuf>,
    /// Folder holding generated artifacts.
    pub intermediate_dir: PathBuf,
    /// Canonical slide file names, in page order.
    pub slide_files: Vec<String>,
    /// Canonical piano page file names, in page order.
    pub piano_files: Vec<String>,
}

/// Resolve the song folder for `path`: the path itself when it is a
/// directory, otherwise its parent (a file inside the song folder).
pub fn song_folder(path: &Path) -> PathBuf {
    if path.is_file() {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        path.to_path_buf()
    }
}

/// Derive `(abc, song_id)` from a song folder path.
///
/// ```text
/// /library/s/Swing-low → ("s", "Swing-low")
/// ```
pub fn identity_from_folder(folder: &Path) -> Result<(String, String), SongError> {
    let song_id = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..");
    let abc = folder
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned());
    match (abc, song_id) {
        (Some(abc), Some(song_id)) => Ok((abc, song_id)),
        _ => Err(SongError::InvalidFolder(folder.to_path_buf())),
    }
}

/// First candidate file name that exists in `folder`.
pub fn detect_source(folder: &Path, candidates: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| folder.join(name))
        .find(|path| path.is_file())
}

impl Song {
    /// Load the song at `path` (its folder or any file inside it).
    pub fn load(path: &Path, config: &SongbookConfig) -> Result<Self, SongError> {
        let folder = song_folder(path);
        if !folder.is_dir() {
            return Err(SongError::FolderNotFound(folder));
        }
        let folder = std::path::absolute(&folder)?;
        let (abc, song_id) = identity_from_folder(&folder)?;
        let metadata = SongMetadata::read(&folder.join(&config.files.metadata))?;

        let mut song = Song {
            projector_source: detect_source(&folder, &config.files.projector),
            piano_source: detect_source(&folder, &config.files.piano),
            intermediate_dir: folder.join(&config.files.intermediate_dir),
            folder,
            abc,
            song_id,
            metadata,
            slide_files: Vec::new(),
            piano_files: Vec::new(),
        };
        song.refresh_artifacts(config)?;
        Ok(song)
    }

    /// Re-read the artifact lists from the intermediate folder.
    ///
    /// A category whose files are not a complete canonical set counts as
    /// unbuilt.
    pub fn refresh_artifacts(&mut self, config: &SongbookConfig) -> Result<(), SongError> {
        self.slide_files =
            naming::list_multipart_files(&self.intermediate_dir, &config.naming.slides)?;
        self.piano_files =
            naming::list_multipart_files(&self.intermediate_dir, &config.naming.piano)?;
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn piano_page_count(&self) -> usize {
        self.piano_files.len()
    }

    /// Reference to an artifact relative to the library base path:
    /// `<abc>/<song_id>/<intermediate-dir>/<file>`.
    pub fn artifact_reference(&self, file: &str) -> String {
        let dir = self
            .intermediate_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}/{}/{}", self.abc, self.song_id, dir, file)
    }
}
