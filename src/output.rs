//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every song is its semantic identity (positional index, title and song
//! ID), with filesystem paths shown as secondary context via indented
//! `Source:` lines.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Songs
//! 001 Auf der Mauer, auf der Lauer (Auf-der-Mauer)
//!     Source: a/Auf-der-Mauer/
//!     Projector: projector.mscx (2 slides)
//!     Piano: piano.mscx (3 pages)
//! 002 Wanderlied (Wanderlied)
//!     Source: w/Wanderlied/
//! ```
//!
//! ## Build
//!
//! ```text
//! Building 5 songs (all)
//! 001 Auf der Mauer, auf der Lauer (Auf-der-Mauer)
//!     Slides: generated 2 files
//!     Piano: up to date
//! Built 5 songs: 1 regenerated, 0 failed
//! ```
//!
//! ## Layout
//!
//! ```text
//! Group 1 (2 pages)
//!     2 Swing low, sweet chariot
//! Group 2 (4 pages)
//!     3 Auf der Mauer, auf der Lauer
//!     1 (empty page)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::layout::{PageGroup, PianoPages, Slot};
use crate::process::{BuildEvent, BuildMode, BuildReport, CategoryOutcome, CleanReport, SongReport};
use crate::scan::Library;
use crate::song::Song;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a song header: positional index, title and song ID.
///
/// ```text
/// 003 Swing low, sweet chariot (Swing-low)
/// ```
fn entity_header(index: usize, title: &str, song_id: &str) -> String {
    format!("{} {} ({})", format_index(index), title, song_id)
}

/// Show `path` relative to `base` when it lives below it.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

// ============================================================================
// Stage 1: Scan output
// ============================================================================

/// Format scan output showing every discovered song and its sources.
pub fn format_scan_output(library: &Library) -> Vec<String> {
    let mut lines = vec!["Songs".to_string()];
    for (i, song) in library.songs().iter().enumerate() {
        lines.extend(format_song_entry(i + 1, song, library.base_path()));
    }
    lines.push(format!(
        "Found {}",
        plural(library.len(), "song", "songs")
    ));
    lines
}

fn format_song_entry(index: usize, song: &Song, base: &Path) -> Vec<String> {
    let mut lines = vec![entity_header(index, song.title(), &song.song_id)];
    lines.push(format!(
        "{}Source: {}/",
        indent(1),
        display_path(&song.folder, base)
    ));
    if let Some(source) = &song.projector_source {
        lines.push(format!(
            "{}Projector: {} ({})",
            indent(1),
            file_name(source),
            plural(song.slide_files.len(), "slide", "slides")
        ));
    }
    if let Some(source) = &song.piano_source {
        lines.push(format!(
            "{}Piano: {} ({})",
            indent(1),
            file_name(source),
            plural(song.piano_files.len(), "page", "pages")
        ));
    }
    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(library: &Library) {
    for line in format_scan_output(library) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Build output
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent, mode: BuildMode) -> Vec<String> {
    match event {
        BuildEvent::Started { song_count } => {
            vec![format!(
                "Building {} ({})",
                plural(*song_count, "song", "songs"),
                mode
            )]
        }
        BuildEvent::SongBuilt { index, report } => format_song_report(*index, report),
    }
}

/// Format one song's build outcome: header plus one line per requested category.
pub fn format_song_report(index: usize, report: &SongReport) -> Vec<String> {
    let mut lines = vec![entity_header(index, &report.title, &report.song_id)];
    for (label, outcome) in [("Slides", &report.slides), ("Piano", &report.piano)] {
        lines.extend(format_outcome(label, outcome));
    }
    lines
}

fn format_outcome(label: &str, outcome: &CategoryOutcome) -> Vec<String> {
    match outcome {
        CategoryOutcome::NotRequested => Vec::new(),
        CategoryOutcome::UpToDate => vec![format!("{}{}: up to date", indent(1), label)],
        CategoryOutcome::Generated(count) => vec![format!(
            "{}{}: generated {}",
            indent(1),
            label,
            plural(*count, "file", "files")
        )],
        CategoryOutcome::NoSource => vec![format!("{}{}: no source", indent(1), label)],
        CategoryOutcome::Failed(message) => {
            let mut lines = vec![format!("{}{}: FAILED", indent(1), label)];
            lines.extend(
                message
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| format!("{}{}", indent(2), l)),
            );
            lines
        }
    }
}

/// Format the closing summary of a library build.
pub fn format_build_summary(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Built {}: {} regenerated, {} failed",
        plural(report.songs.len(), "song", "songs"),
        report.generated_count(),
        report.failure_count()
    )];
    for failed in report.failures() {
        lines.push(format!("{}{}", indent(1), failed.song_id));
    }
    lines
}

/// Print build summary to stdout.
pub fn print_build_summary(report: &BuildReport) {
    for line in format_build_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 3: Layout and assemble output
// ============================================================================

/// Format a page-turn plan, one block per group.
///
/// Songs show their page count before the title; placeholders show as
/// empty pages.
pub fn format_layout_plan<T: PianoPages>(groups: &[PageGroup<'_, T>]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        lines.push(format!(
            "Group {} ({})",
            i + 1,
            plural(group.pages(), "page", "pages")
        ));
        for slot in &group.slots {
            match slot {
                Slot::Song(song) => lines.push(format!(
                    "{}{} {}",
                    indent(1),
                    song.piano_page_count(),
                    song.title()
                )),
                Slot::Placeholder => lines.push(format!("{}1 (empty page)", indent(1))),
            }
        }
    }
    lines
}

/// Print a page-turn plan to stdout.
pub fn print_layout_plan<T: PianoPages>(groups: &[PageGroup<'_, T>]) {
    for line in format_layout_plan(groups) {
        println!("{}", line);
    }
}

/// Format the result of writing the songbook document.
pub fn format_assemble_output(document: &Path, song_count: usize, layout: &str) -> Vec<String> {
    vec![format!(
        "Wrote {} ({}, {} layout)",
        document.display(),
        plural(song_count, "song", "songs"),
        layout
    )]
}

// ============================================================================
// Maintenance output
// ============================================================================

/// Format the paths removed by a clean, relative to the library base.
pub fn format_clean_output(report: &CleanReport, base: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Removed {}",
        plural(report.removed.len(), "path", "paths")
    )];
    lines.extend(
        report
            .removed
            .iter()
            .map(|p| format!("{}{}", indent(1), display_path(p, base))),
    );
    lines
}

/// Print clean output to stdout.
pub fn print_clean_output(report: &CleanReport, base: &Path) {
    for line in format_clean_output(report, base) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
