//! Shared test utilities for the songbook test suite.
//!
//! Provides fixture setup, lookup helpers and in-memory songs that work with
//! scan-phase data structures (`Library`, `Song`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let library = scan_fixtures(tmp.path());
//!
//! let song = find_song(&library, "Swing-low");
//! assert_eq!(song.abc, "s");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::SongbookConfig;
use crate::convert::backend::tests::MockConverter;
use crate::hash_store::ContentHashStore;
use crate::metadata::SongMetadata;
use crate::naming::multipart_file_name;
use crate::process::{ArtifactBuilder, BuildMode, ConversionCache};
use crate::scan::{Library, scan};
use crate::song::Song;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/songs/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/songs");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Fixture library with every song's artifacts built by the mock converter.
pub fn built_fixture_library() -> TempDir {
    let tmp = setup_fixtures();
    let config = SongbookConfig::default();
    let mut library = scan(tmp.path(), &config).unwrap();
    let store = ContentHashStore::open(config.hash_store_path(tmp.path())).unwrap();
    let converter = MockConverter::new();
    let cache = ConversionCache::new();
    let report = ArtifactBuilder::new(&converter, &store, &config, &cache).build_library(
        &mut library,
        BuildMode::All,
        false,
        None,
    );
    assert_eq!(report.failure_count(), 0, "fixture build failed: {report:?}");
    tmp
}

/// Scan a fixture copy with the default config.
pub fn scan_fixtures(base: &Path) -> Library {
    scan(base, &SongbookConfig::default()).unwrap()
}

/// Create `<base>/<abc>/<song_id>/info.yml` and return the song folder.
pub fn write_song(base: &Path, abc: &str, song_id: &str, info_yml: &str) -> PathBuf {
    let folder = base.join(abc).join(song_id);
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("info.yml"), info_yml).unwrap();
    folder
}

// =========================================================================
// In-memory songs
// =========================================================================

/// A song that exists only in memory, with `pages` built piano pages.
pub fn fake_song(abc: &str, song_id: &str, title: &str, pages: usize) -> Song {
    let folder = PathBuf::from("/library").join(abc).join(song_id);
    Song {
        abc: abc.to_string(),
        song_id: song_id.to_string(),
        metadata: SongMetadata {
            title: title.to_string(),
            ..SongMetadata::default()
        },
        projector_source: None,
        piano_source: Some(folder.join("piano.mscx")),
        intermediate_dir: folder.join("NB"),
        slide_files: Vec::new(),
        piano_files: (1..=pages)
            .map(|n| multipart_file_name("Piano.eps", n).unwrap())
            .collect(),
        folder,
    }
}

// =========================================================================
// Library lookups, panicking with a clear message on miss
// =========================================================================

/// Find a song by ID. Panics if not found.
pub fn find_song<'a>(library: &'a Library, song_id: &str) -> &'a Song {
    library.get(song_id).unwrap_or_else(|| {
        panic!(
            "song '{song_id}' not found. Available: {:?}",
            library.song_ids()
        )
    })
}
