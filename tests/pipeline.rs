//! End-to-end pipeline test through the public API.
//!
//! Copies `fixtures/songs/` into a temp directory, builds it with a scripted
//! converter, changes one score, rebuilds, assembles the songbook and cleans.
//! The scripted converter writes one placeholder file per page; a score
//! declares its page count with a `pages=N` line.
//!
//! Run with: cargo test --test pipeline

use songbook_intermediates::config::{DocumentLayout, SongbookConfig};
use songbook_intermediates::convert::{Converter, ConverterError};
use songbook_intermediates::generate;
use songbook_intermediates::hash_store::ContentHashStore;
use songbook_intermediates::process::{
    ArtifactBuilder, BuildMode, BuildReport, CategoryOutcome, ConversionCache, clean_library,
};
use songbook_intermediates::scan::{Library, scan};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedConverter {
    calls: AtomicUsize,
}

impl ScriptedConverter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn declared_pages(path: &Path) -> Result<usize, ConverterError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .find_map(|line| line.trim().strip_prefix("pages="))
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(1))
}

impl Converter for ScriptedConverter {
    fn score_to_pdf(&self, score: &Path, pdf: &Path) -> Result<(), ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::copy(score, pdf)?;
        Ok(())
    }

    fn pdf_to_images(&self, pdf: &Path, output_dir: &Path) -> Result<(), ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for page in 1..=declared_pages(pdf)? {
            fs::write(output_dir.join(format!("{page:02}.svg")), "<svg/>")?;
        }
        Ok(())
    }

    fn score_to_images(&self, score: &Path) -> Result<(), ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dir = score.parent().unwrap_or(Path::new("."));
        let stem = score
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for page in 1..=declared_pages(score)? {
            fs::write(dir.join(format!("{stem}_{page}.eps")), "%!PS")?;
        }
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) {
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_dir_recursive(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn setup_library() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/songs");
    copy_dir_recursive(&fixtures, tmp.path());
    tmp
}

fn run_build(
    base: &Path,
    config: &SongbookConfig,
    store: &ContentHashStore,
    converter: &ScriptedConverter,
) -> (Library, BuildReport) {
    let mut library = scan(base, config).unwrap();
    let cache = ConversionCache::new();
    let report = ArtifactBuilder::new(converter, store, config, &cache).build_library(
        &mut library,
        BuildMode::All,
        false,
        None,
    );
    (library, report)
}

fn outcome<'a>(report: &'a BuildReport, song_id: &str) -> (&'a CategoryOutcome, &'a CategoryOutcome) {
    let song = report
        .songs
        .iter()
        .find(|s| s.song_id == song_id)
        .unwrap_or_else(|| panic!("no report for {song_id}"));
    (&song.slides, &song.piano)
}

#[test]
fn build_rebuild_assemble_clean() {
    let tmp = setup_library();
    let base = tmp.path();
    let config = SongbookConfig::default();
    let store = ContentHashStore::open(config.hash_store_path(base)).unwrap();
    let converter = ScriptedConverter::default();

    // First build: every artifact is missing, so every source converts.
    let (_, first) = run_build(base, &config, &store, &converter);
    assert_eq!(first.failure_count(), 0, "{first:?}");
    assert_eq!(
        outcome(&first, "Auf-der-Mauer"),
        (&CategoryOutcome::Generated(2), &CategoryOutcome::Generated(3))
    );
    assert_eq!(
        outcome(&first, "Wanderlied"),
        (&CategoryOutcome::NoSource, &CategoryOutcome::NoSource)
    );
    assert!(base.join("a/Auf-der-Mauer/NB/Piano_no003.eps").exists());
    assert!(base.join("a/Auf-der-Mauer/NB/Projector_no002.svg").exists());
    assert!(!base.join("a/Auf-der-Mauer/NB/projector.pdf").exists());
    assert!(store.path().exists());

    // Second build: nothing changed, nothing converts.
    let calls_after_first = converter.calls();
    let (_, second) = run_build(base, &config, &store, &converter);
    assert_eq!(second.generated_count(), 0);
    assert_eq!(converter.calls(), calls_after_first);

    // Editing one score rebuilds exactly that category.
    let piano = base.join("s/Swing-low/piano.mscx");
    fs::write(
        &piano,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<museScore version=\"3.02\">\npages=3\n</museScore>\n",
    )
    .unwrap();
    let (library, third) = run_build(base, &config, &store, &converter);
    assert_eq!(third.generated_count(), 1);
    assert_eq!(
        outcome(&third, "Swing-low"),
        (&CategoryOutcome::UpToDate, &CategoryOutcome::Generated(3))
    );
    assert!(base.join("s/Swing-low/NB/Piano_no003.eps").exists());

    // Assemble the songbook from the freshly built library.
    let document = config.document_path(base);
    generate::write_document(&library, DocumentLayout::PageTurn, &document).unwrap();
    let content = fs::read_to_string(&document).unwrap();
    assert!(content.contains("% Layout: page-turn"));
    assert!(content.contains("s/Swing-low/NB/Piano_no003.eps"));
    assert!(content.contains("z/Zum-Tanze-da-geht-ein-Maedel/NB/Piano_no004.eps"));
    assert!(!content.contains("Wanderlied"));

    // Clean removes artifacts, the document and the hash store.
    let mut library = library;
    let cleaned = clean_library(&mut library, &store, &config).unwrap();
    assert!(!cleaned.removed.is_empty());
    assert!(!base.join("a/Auf-der-Mauer/NB").exists());
    assert!(!document.exists());
    assert!(!store.path().exists());
    assert!(library.songs().iter().all(|s| s.piano_files.is_empty()));
}

#[test]
fn forced_build_converts_everything_again() {
    let tmp = setup_library();
    let base = tmp.path();
    let config = SongbookConfig::default();
    let store = ContentHashStore::open(config.hash_store_path(base)).unwrap();
    let converter = ScriptedConverter::default();
    run_build(base, &config, &store, &converter);

    let mut library = scan(base, &config).unwrap();
    let cache = ConversionCache::new();
    let report = ArtifactBuilder::new(&converter, &store, &config, &cache).build_library(
        &mut library,
        BuildMode::Piano,
        true,
        None,
    );

    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.generated_count(), 4);
    for song in &report.songs {
        assert_eq!(song.slides, CategoryOutcome::NotRequested);
    }
}
