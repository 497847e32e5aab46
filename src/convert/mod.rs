//! External converters: score → PDF → page images.
//!
//! | Operation | Program (default) |
//! |---|---|
//! | **Score → PDF** | `mscore --export-to <pdf> <score>` |
//! | **PDF → page images** | `pdf2svg <pdf> <dir>/%02d.svg all` |
//! | **Score → page images** | `mscore-to-vector.sh -e <score>` |
//!
//! The module is split into:
//! - **Backend**: [`Converter`] trait, one method per external program
//! - **Command**: [`CommandConverter`], the production implementation
//! - **Operations**: High-level functions adding output checks and
//!   canonical renaming on top of a converter

pub mod backend;
pub mod command;
pub mod operations;

pub use backend::{Converter, ConverterError};
pub use command::CommandConverter;
pub use operations::{render_pdf_to_page_images, render_score_to_page_images, render_to_pdf};
