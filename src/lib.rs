//! # Songbook Intermediates
//!
//! Incremental build of the intermediate files behind a songbook: projector
//! slides, piano score pages and the page-turn optimized piano songbook
//! document. The library folder is the data source: every folder holding an
//! `info.yml` is a song, and the scores next to it are converted into numbered
//! files by external programs.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Scan      songs/   →  Library            (folders → songs with metadata)
//! 2. Build     Library  →  <song>/NB/*        (scores → slides and piano pages)
//! 3. Assemble  Library  →  songs.tex          (piano pages → songbook document)
//! ```
//!
//! Stages share the in-memory [`scan::Library`]. Nothing between stages is
//! persisted except the generated files themselves and the content hash
//! store, which remembers which scores were already converted.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: walks the base directory and collects songs into a library |
//! | [`song`] | One song: identity from its folder, sources, built artifacts |
//! | [`metadata`] | `info.yml` parsing and validation, combined display metadata |
//! | [`process`] | Stage 2: decides what to rebuild and drives the converters |
//! | [`convert`] | External converter programs behind a trait, plus output checks |
//! | [`hash_store`] | Persistent content hashes, the "did this score change?" oracle |
//! | [`naming`] | Multi-part artifact naming (`Piano_no001.eps`) and renaming |
//! | [`layout`] | Page-turn planner: groups of songs that never split across a turn |
//! | [`generate`] | Stage 3: renders the songbook document in the chosen layout |
//! | [`config`] | `songbook.toml` loading, validation and stock defaults |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## Content Hashes, Not Timestamps
//!
//! A score is reconverted when its SHA-256 digest differs from the one
//! recorded at the previous observation, or when its artifacts are missing.
//! Copying a library, checking it out again or touching files never triggers
//! a rebuild by itself. The first observation of a file records a baseline
//! and reports it unchanged; missing artifacts are what builds a fresh song.
//!
//! ## Converters Behind a Trait
//!
//! MuseScore and `pdf2svg` are system programs. [`convert::Converter`] has one
//! method per program invocation, so every stage above it is tested with a
//! recording mock instead of the real tools.
//!
//! ## Page-Turn Layout
//!
//! Piano scores are printed double-sided. The first group holds two pages,
//! every later group four, and a song never spans two groups. Short groups
//! are padded with empty pages so each group starts where a turn happens.

pub mod config;
pub mod convert;
pub mod generate;
pub mod hash_store;
pub mod layout;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod song;

#[cfg(test)]
pub(crate) mod test_helpers;
