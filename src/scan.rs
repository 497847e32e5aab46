//! Song discovery.
//!
//! Stage 1 of the build pipeline. Walks the library base directory, turns
//! every folder holding a metadata file into a [`Song`] and collects them
//! into a [`Library`] that the later stages consume.
//!
//! ## Directory Structure
//!
//! ```text
//! songs/                           # Library base path
//! ├── songbook.toml                # Configuration (optional)
//! ├── filehashes.json              # Hash store (generated)
//! ├── songs.tex                    # Assembled document (generated)
//! ├── a/
//! │   └── Auf-der-Mauer/
//! │       ├── info.yml
//! │       ├── projector.mscx
//! │       └── piano.mscx
//! └── s/
//!     ├── Stille-Nacht/
//!     └── Swing-low/
//! ```
//!
//! Songs are found at any depth. Hidden directories and intermediate
//! artifact folders are not descended into. Library order is the walk order,
//! sorted by file name at every level.
//!
//! ## Validation
//!
//! - Song IDs (folder names) must be unique across the library.
//! - Every `info.yml` must be valid (see [`crate::metadata`]).
//! - A restriction list may only name songs that exist.

use crate::config::SongbookConfig;
use crate::song::{Song, SongError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Song error: {0}")]
    Song(#[from] SongError),
    #[error("Library base path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Duplicate song ID {song_id}: {first} and {second}")]
    DuplicateSongId {
        song_id: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Unknown song ID: {0}")]
    UnknownSongId(String),
}

/// Ordered collection of songs, indexed by song ID.
#[derive(Debug, Clone)]
pub struct Library {
    base_path: PathBuf,
    songs: Vec<Song>,
    index: HashMap<String, usize>,
}

/// Discover every song below `base`.
pub fn scan(base: &Path, config: &SongbookConfig) -> Result<Library, ScanError> {
    if !base.is_dir() {
        return Err(ScanError::NotADirectory(base.to_path_buf()));
    }
    let base_path = std::path::absolute(base)?;

    let mut library = Library::new(base_path.clone());
    let walker = WalkDir::new(&base_path)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e, config));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == config.files.metadata.as_str() {
            let song = Song::load(entry.path(), config)?;
            library.insert(song)?;
        }
    }
    Ok(library)
}

fn is_skipped_dir(entry: &DirEntry, config: &SongbookConfig) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == config.files.intermediate_dir
}

/// Split a restriction list into song IDs. Any whitespace separates IDs.
pub fn parse_song_id_list(content: &str) -> Vec<String> {
    content.split_whitespace().map(String::from).collect()
}

impl Library {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            songs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a song, rejecting duplicate IDs.
    pub fn insert(&mut self, song: Song) -> Result<(), ScanError> {
        if let Some(&existing) = self.index.get(&song.song_id) {
            return Err(ScanError::DuplicateSongId {
                song_id: song.song_id,
                first: self.songs[existing].folder.clone(),
                second: song.folder,
            });
        }
        self.index.insert(song.song_id.clone(), self.songs.len());
        self.songs.push(song);
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn songs_mut(&mut self) -> &mut [Song] {
        &mut self.songs
    }

    pub fn get(&self, song_id: &str) -> Option<&Song> {
        self.index.get(song_id).map(|&i| &self.songs[i])
    }

    pub fn get_mut(&mut self, song_id: &str) -> Option<&mut Song> {
        self.index.get(song_id).map(|&i| &mut self.songs[i])
    }

    pub fn song_ids(&self) -> Vec<&str> {
        self.songs.iter().map(|s| s.song_id.as_str()).collect()
    }

    /// Keep only the listed songs, in list order. Repeated IDs are kept once.
    pub fn restrict_to_ids(&mut self, ids: &[String]) -> Result<(), ScanError> {
        let mut picked = Vec::with_capacity(ids.len());
        for id in ids {
            let index = *self
                .index
                .get(id)
                .ok_or_else(|| ScanError::UnknownSongId(id.clone()))?;
            if !picked.contains(&index) {
                picked.push(index);
            }
        }

        let mut slots: Vec<Option<Song>> = std::mem::take(&mut self.songs)
            .into_iter()
            .map(Some)
            .collect();
        self.index.clear();
        for index in picked {
            if let Some(song) = slots[index].take() {
                self.insert(song)?;
            }
        }
        Ok(())
    }

    /// Keep only the songs named in the restriction list file at `path`.
    pub fn restrict_to(&mut self, path: &Path) -> Result<(), ScanError> {
        let content = fs::read_to_string(path)?;
        self.restrict_to_ids(&parse_song_id_list(&content))
    }
}
