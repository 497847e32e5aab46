//! Converter trait and shared error type.
//!
//! The [`Converter`] trait has one method per external program. Methods run
//! the program to completion and check its exit status; they make no claims
//! about what ended up on disk. Output checks and renaming live in
//! [`operations`](super::operations).
//!
//! The production implementation is
//! [`CommandConverter`](super::command::CommandConverter).

use crate::naming::NamingError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed ({status}):\n{stdout}")]
    CommandFailed {
        program: String,
        status: String,
        stdout: String,
    },
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),
    #[error("No page images were produced from {0}")]
    NoPages(PathBuf),
}

/// Trait for converter backends.
///
/// Every call blocks until the external program exits. A non-zero exit is
/// reported as [`ConverterError::CommandFailed`] with the program's stdout.
pub trait Converter: Sync {
    /// Export `score` to a PDF at `pdf`.
    fn score_to_pdf(&self, score: &Path, pdf: &Path) -> Result<(), ConverterError>;

    /// Split `pdf` into one vector image per page inside `output_dir`.
    fn pdf_to_images(&self, pdf: &Path, output_dir: &Path) -> Result<(), ConverterError>;

    /// Export `score` to one vector image per page next to the score.
    fn score_to_images(&self, score: &Path) -> Result<(), ConverterError>;
}
