//! Piano songbook document assembly.
//!
//! Stage 3 of the build pipeline. Turns the library's piano score pages into
//! the markup of one document, which a TeX renderer typesets into the
//! printed songbook. Rendering itself happens elsewhere.
//!
//! ## Markup
//!
//! The document uses a handful of macros the renderer's template defines:
//!
//! ```text
//! \tmpchapter{S}                          chapter per initial letter
//!
//! \tmpmetadata                            one song
//! {Swing low (1909)} % title
//! {} % subtitle
//! {Wallace Willis} % composer
//! {} % lyricist
//! \tmpimage{s/Swing-low/NB/Piano_no001.eps}
//! \tmpcolumnbreak
//! \tmpimage{s/Swing-low/NB/Piano_no002.eps}
//! \tmpcolumnbreak
//! \tmpplaceholder                         blank page
//! ```
//!
//! Every `&` in metadata is escaped as `\&`. Image paths are relative to the
//! library base path.
//!
//! ## Layouts
//!
//! | Layout | Order |
//! |---|---|
//! | `page-turn` | page groups from [`crate::layout::plan`], blank pages as placeholders |
//! | `alphabetical` | one chapter per `abc` bucket, buckets sorted, songs in library order |
//! | `sequential` | library order |
//!
//! Songs without a piano source are not part of the document. A song with a
//! piano source but 0 or more than 4 pages fails the whole document.

use crate::config::DocumentLayout;
use crate::layout::{self, LayoutError, PageGroup, Slot};
use crate::metadata::CombinedMetadata;
use crate::scan::Library;
use crate::song::Song;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
}

const COLUMN_BREAK: &str = "\\tmpcolumnbreak\n";

/// `\tmp<command>{<value>}` followed by a newline.
pub fn tex_command(command: &str, value: &str) -> String {
    format!("\\tmp{command}{{{value}}}\n")
}

/// `\tmp<command>` followed by a newline.
pub fn tex_marker(command: &str) -> String {
    format!("\\tmp{command}\n")
}

/// Escape characters TeX would interpret in metadata text.
pub fn escape(text: &str) -> String {
    text.replace('&', "\\&")
}

pub fn format_metadata(metadata: &CombinedMetadata) -> String {
    let field = |value: Option<&str>| escape(value.unwrap_or_default());
    format!(
        "\n\\tmpmetadata\n{{{}}} % title\n{{{}}} % subtitle\n{{{}}} % composer\n{{{}}} % lyricist\n",
        escape(&metadata.title),
        field(metadata.subtitle.as_deref()),
        field(metadata.composer.as_deref()),
        field(metadata.lyricist.as_deref()),
    )
}

/// Metadata block plus one image per piano page.
pub fn format_song(song: &Song) -> Result<String, LayoutError> {
    layout::validate(song)?;
    let images: Vec<String> = song
        .piano_files
        .iter()
        .map(|file| tex_command("image", &song.artifact_reference(file)))
        .collect();
    Ok(format_metadata(&song.metadata.combined()) + &images.join(COLUMN_BREAK))
}

/// Songs one after another, no optimization.
pub fn format_song_list(songs: &[&Song]) -> Result<String, LayoutError> {
    let parts = songs
        .iter()
        .map(|song| format_song(song))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(COLUMN_BREAK))
}

pub fn format_page_groups(groups: &[PageGroup<'_, Song>]) -> Result<String, LayoutError> {
    let mut formatted = Vec::with_capacity(groups.len());
    for group in groups {
        let slots = group
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Song(song) => format_song(song),
                Slot::Placeholder => Ok(tex_marker("placeholder")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        formatted.push(slots.join(COLUMN_BREAK));
    }
    Ok(formatted.join(COLUMN_BREAK))
}

/// Songs grouped by `abc` bucket, one chapter per bucket.
pub fn format_alphabetical(songs: &[&Song]) -> Result<String, LayoutError> {
    let mut buckets: BTreeMap<&str, Vec<&Song>> = BTreeMap::new();
    for &song in songs {
        buckets.entry(song.abc.as_str()).or_default().push(song);
    }

    let mut output = String::new();
    for (abc, songs) in buckets {
        output.push_str("\n\n");
        output.push_str(&tex_command("chapter", &abc.to_uppercase()));
        output.push_str(&format_song_list(&songs)?);
    }
    Ok(output)
}

/// Songs that belong in the piano songbook: those with a piano source.
pub fn document_songs(library: &Library) -> Vec<&Song> {
    library
        .songs()
        .iter()
        .filter(|song| song.piano_source.is_some())
        .collect()
}

/// Markup for all songs of the library in the given layout.
pub fn build_song_markup(library: &Library, layout: DocumentLayout) -> Result<String, GenerateError> {
    let songs = document_songs(library);
    let markup = match layout {
        DocumentLayout::PageTurn => {
            let groups = layout::plan(songs.iter().copied())?;
            format_page_groups(&groups)?
        }
        DocumentLayout::Alphabetical => format_alphabetical(&songs)?,
        DocumentLayout::Sequential => format_song_list(&songs)?,
    };
    Ok(markup)
}

/// The complete document: header comment and song markup.
pub fn build_document(library: &Library, layout: DocumentLayout) -> Result<String, GenerateError> {
    let markup = build_song_markup(library, layout)?;
    Ok(format!(
        "% Piano songbook, generated by {} {}. Do not edit.\n% Base path: {}\n% Layout: {}\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        library.base_path().display(),
        layout,
        markup
    ))
}

/// Assemble the document and write it to `path`.
pub fn write_document(
    library: &Library,
    layout: DocumentLayout,
    path: &Path,
) -> Result<PathBuf, GenerateError> {
    let document = build_document(library, layout)?;
    fs::write(path, document)?;
    info!(path = %path.display(), %layout, "document written");
    Ok(path.to_path_buf())
}
