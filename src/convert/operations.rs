//! High-level conversion operations.
//!
//! These functions wrap a [`Converter`] call with what the pipeline actually
//! cares about: whether the expected output exists afterwards, and the
//! canonical names of the pages that were produced.

use super::backend::{Converter, ConverterError};
use crate::naming;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConverterError>;

/// Render `source` to the PDF at `output_pdf`.
///
/// The notation editor sometimes exits non-zero after writing a perfectly
/// good file, so success is decided by the output:
///
/// | Output exists | Exit status | Result |
/// |---|---|---|
/// | yes | any | `Ok(Some(pdf))` |
/// | no | non-zero | `Err(CommandFailed)` |
/// | no | zero | `Ok(None)`, the caller decides |
///
/// A PDF left at `output_pdf` by an earlier run is removed first, so only a
/// file written by this export counts.
pub fn render_to_pdf(
    converter: &impl Converter,
    source: &Path,
    output_pdf: &Path,
) -> Result<Option<PathBuf>> {
    match fs::remove_file(output_pdf) {
        Ok(()) => debug!(pdf = %output_pdf.display(), "removed stale PDF"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let outcome = converter.score_to_pdf(source, output_pdf);
    if output_pdf.is_file() {
        if let Err(e) = outcome {
            warn!(source = %source.display(), error = %e, "converter reported failure but wrote the PDF");
        }
        return Ok(Some(output_pdf.to_path_buf()));
    }
    outcome?;
    debug!(source = %source.display(), "converter exited cleanly without a PDF");
    Ok(None)
}

/// Split `pdf` into page images in `output_dir`, named after `base_name`.
///
/// Returns the canonical file names in page order.
pub fn render_pdf_to_page_images(
    converter: &impl Converter,
    pdf: &Path,
    output_dir: &Path,
    base_name: &str,
) -> Result<Vec<String>> {
    fs::create_dir_all(output_dir)?;
    converter.pdf_to_images(pdf, output_dir)?;
    let suffix = naming::artifact_suffix(base_name)?;
    let pages = naming::rename_multipart_files(output_dir, &suffix, base_name)?;
    if pages.is_empty() {
        return Err(ConverterError::NoPages(pdf.to_path_buf()));
    }
    Ok(pages)
}

/// Render `source` to page images in `scratch_dir`, named after `base_name`.
///
/// The export helper writes its pages next to the score it is given, so the
/// source is copied into `scratch_dir` first. The copy is removed again
/// whether or not the export succeeded.
pub fn render_score_to_page_images(
    converter: &impl Converter,
    source: &Path,
    scratch_dir: &Path,
    base_name: &str,
) -> Result<Vec<String>> {
    fs::create_dir_all(scratch_dir)?;
    let file_name = source
        .file_name()
        .ok_or_else(|| ConverterError::NoPages(source.to_path_buf()))?;
    let copy = scratch_dir.join(file_name);
    fs::copy(source, &copy)?;

    let outcome = converter.score_to_images(&copy);
    if let Err(e) = fs::remove_file(&copy) {
        warn!(copy = %copy.display(), error = %e, "could not remove scratch copy");
    }
    outcome?;

    let suffix = naming::artifact_suffix(base_name)?;
    let pages = naming::rename_multipart_files(scratch_dir, &suffix, base_name)?;
    if pages.is_empty() {
        return Err(ConverterError::NoPages(source.to_path_buf()));
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::backend::tests::{MockConverter, MockFailure, RecordedOp};
    use tempfile::TempDir;

    fn score(tmp: &TempDir, name: &str, pages: usize) -> PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, format!("pages={pages}\n")).unwrap();
        path
    }

    // =========================================================================
    // render_to_pdf
    // =========================================================================

    #[test]
    fn pdf_rendered() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let pdf = tmp.path().join("projector.pdf");

        let result = render_to_pdf(&MockConverter::new(), &source, &pdf).unwrap();
        assert_eq!(result, Some(pdf));
    }

    #[test]
    fn pdf_written_despite_failure_counts_as_success() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let pdf = tmp.path().join("projector.pdf");
        let converter = MockConverter::failing(MockFailure::ScoreToPdfWithOutput);

        assert_eq!(render_to_pdf(&converter, &source, &pdf).unwrap(), Some(pdf));
    }

    #[test]
    fn pdf_missing_after_failure_is_error() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let converter = MockConverter::failing(MockFailure::ScoreToPdf);

        let result = render_to_pdf(&converter, &source, &tmp.path().join("projector.pdf"));
        assert!(matches!(result, Err(ConverterError::CommandFailed { .. })));
    }

    #[test]
    fn stale_pdf_does_not_mask_failed_export() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let pdf = score(&tmp, "projector.pdf", 7);
        let converter = MockConverter::failing(MockFailure::ScoreToPdf);

        let result = render_to_pdf(&converter, &source, &pdf);
        assert!(matches!(result, Err(ConverterError::CommandFailed { .. })));
        assert!(!pdf.exists());
    }

    #[test]
    fn stale_pdf_removed_on_silent_export() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let pdf = score(&tmp, "projector.pdf", 7);
        let converter = MockConverter::failing(MockFailure::ScoreToPdfSilent);

        assert_eq!(render_to_pdf(&converter, &source, &pdf).unwrap(), None);
    }

    #[test]
    fn pdf_missing_after_clean_exit_is_none() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "projector.mscx", 2);
        let converter = MockConverter::failing(MockFailure::ScoreToPdfSilent);

        let result = render_to_pdf(&converter, &source, &tmp.path().join("projector.pdf"));
        assert_eq!(result.unwrap(), None);
    }

    // =========================================================================
    // render_pdf_to_page_images
    // =========================================================================

    #[test]
    fn pdf_pages_renamed_canonically() {
        let tmp = TempDir::new().unwrap();
        let pdf = score(&tmp, "projector.pdf", 3);
        let out = tmp.path().join("NB");

        let pages =
            render_pdf_to_page_images(&MockConverter::new(), &pdf, &out, "Projector.svg").unwrap();

        assert_eq!(
            pages,
            vec!["Projector_no001.svg", "Projector_no002.svg", "Projector_no003.svg"]
        );
        assert_eq!(fs::read_to_string(out.join("Projector_no001.svg")).unwrap(), "slide 1");
        assert_eq!(fs::read_to_string(out.join("Projector_no003.svg")).unwrap(), "slide 3");
    }

    #[test]
    fn pdf_without_pages_is_error() {
        let tmp = TempDir::new().unwrap();
        let pdf = score(&tmp, "projector.pdf", 1);
        let converter = MockConverter::failing(MockFailure::PdfToNoImages);

        let result = render_pdf_to_page_images(&converter, &pdf, tmp.path(), "Projector.svg");
        assert!(matches!(result, Err(ConverterError::NoPages(_))));
    }

    #[test]
    fn pdf_split_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let pdf = score(&tmp, "projector.pdf", 1);
        let converter = MockConverter::failing(MockFailure::PdfToImages);

        let result = render_pdf_to_page_images(&converter, &pdf, tmp.path(), "Projector.svg");
        assert!(matches!(result, Err(ConverterError::CommandFailed { .. })));
    }

    // =========================================================================
    // render_score_to_page_images
    // =========================================================================

    #[test]
    fn score_pages_rendered_from_scratch_copy() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "lead.mscx", 2);
        let scratch = tmp.path().join("NB");
        let converter = MockConverter::new();

        let pages = render_score_to_page_images(&converter, &source, &scratch, "Piano.eps").unwrap();

        assert_eq!(pages, vec!["Piano_no001.eps", "Piano_no002.eps"]);
        assert!(!scratch.join("lead.mscx").exists());
        assert!(source.exists());
        let ops = converter.get_operations();
        assert!(
            matches!(&ops[0], RecordedOp::ScoreToImages { score } if score.ends_with("NB/lead.mscx"))
        );
    }

    #[test]
    fn score_export_failure_removes_scratch_copy() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "piano.mscx", 2);
        let scratch = tmp.path().join("NB");
        let converter = MockConverter::failing(MockFailure::ScoreToImages);

        let result = render_score_to_page_images(&converter, &source, &scratch, "Piano.eps");

        assert!(matches!(result, Err(ConverterError::CommandFailed { .. })));
        assert!(!scratch.join("piano.mscx").exists());
    }

    #[test]
    fn score_with_ten_pages_keeps_page_order() {
        let tmp = TempDir::new().unwrap();
        let source = score(&tmp, "piano.mscx", 10);
        let scratch = tmp.path().join("NB");

        let pages =
            render_score_to_page_images(&MockConverter::new(), &source, &scratch, "Piano.eps").unwrap();

        assert_eq!(pages.len(), 10);
        assert_eq!(fs::read_to_string(scratch.join("Piano_no002.eps")).unwrap(), "page 2");
        assert_eq!(fs::read_to_string(scratch.join("Piano_no010.eps")).unwrap(), "page 10");
    }
}
