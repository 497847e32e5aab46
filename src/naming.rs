//! Multi-part artifact naming.
//!
//! Converters name their page outputs however they like (`pdf2svg` writes
//! `01.svg`, `02.svg`, the vector export helper writes `piano_1.eps`, …). Every
//! generated artifact set is renamed into one canonical scheme so downstream
//! consumers can address "page N of song S" without knowing which tool ran:
//!
//! ```text
//! Piano.eps, page 1  → Piano_no001.eps
//! Piano.eps, page 2  → Piano_no002.eps
//! Projector.svg, 12  → Projector_no012.svg
//! ```
//!
//! ## Renaming
//!
//! [`rename_multipart_files`] lists the directory, keeps the files with the
//! artifact's suffix, sorts them by name (digit runs compare numerically, so
//! `piano_10.eps` follows `piano_9.eps`) and renames them in that order. The
//! directory is listed again afterwards and that listing is returned: it is
//! the single source of truth for what was actually produced.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Highest part number the three-digit suffix can express.
pub const MAX_PART_NUMBER: usize = 999;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{base}: multipart numbers above {MAX_PART_NUMBER} are not supported (got {number})")]
    TooManyParts { base: String, number: usize },
    #[error("Multipart numbers start at 1: {0}")]
    ZeroPart(String),
    #[error("Multipart base name has no extension: {0}")]
    MissingExtension(String),
}

/// Format the canonical file name of part `number` of a multi-part artifact.
///
/// - `("Piano.eps", 1)` → `Piano_no001.eps`
/// - `("Projector.svg", 42)` → `Projector_no042.svg`
pub fn multipart_file_name(base: &str, number: usize) -> Result<String, NamingError> {
    if number == 0 {
        return Err(NamingError::ZeroPart(base.to_string()));
    }
    if number > MAX_PART_NUMBER {
        return Err(NamingError::TooManyParts {
            base: base.to_string(),
            number,
        });
    }
    let (stem, extension) = split_extension(base)?;
    Ok(format!("{stem}_no{number:03}.{extension}"))
}

/// The file suffix (including the dot) shared by all parts of `base`.
///
/// `Piano.eps` → `.eps`
pub fn artifact_suffix(base: &str) -> Result<String, NamingError> {
    let (_, extension) = split_extension(base)?;
    Ok(format!(".{extension}"))
}

fn split_extension(base: &str) -> Result<(&str, &str), NamingError> {
    match base.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            Ok((stem, extension))
        }
        _ => Err(NamingError::MissingExtension(base.to_string())),
    }
}

/// List the names of regular, non-hidden files in `dir` ending with `suffix`.
///
/// The result is sorted in natural order. A missing directory yields an
/// empty list: nothing has been generated there yet.
pub fn list_files(dir: &Path, suffix: &str) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && name.ends_with(suffix) {
            names.push(name);
        }
    }
    names.sort_by(|a, b| natural_cmp(a, b));
    Ok(names)
}

/// List a complete canonical artifact set of `base` in `dir`.
///
/// Returns `<stem>_no001.<ext>` .. `<stem>_noNNN.<ext>` when those are
/// exactly the files carrying the artifact's suffix. Anything else (a gap
/// in the numbering, unrenamed converter output, foreign names) is an
/// incomplete set and yields an empty list, so the category gets rebuilt.
pub fn list_multipart_files(dir: &Path, base: &str) -> Result<Vec<String>, NamingError> {
    let names = list_files(dir, &artifact_suffix(base)?)?;
    for (index, name) in names.iter().enumerate() {
        if *name != multipart_file_name(base, index + 1)? {
            return Ok(Vec::new());
        }
    }
    Ok(names)
}

/// Delete every file in `dir` ending with `suffix`. Returns how many were removed.
pub fn delete_files(dir: &Path, suffix: &str) -> io::Result<usize> {
    let names = list_files(dir, suffix)?;
    for name in &names {
        fs::remove_file(dir.join(name))?;
    }
    Ok(names.len())
}

/// Rename all `suffix` files in `dir` into the canonical scheme of `base`.
///
/// Renaming happens in two passes (first to hidden temporary names, then to
/// the final names) so a converter output that already carries a canonical
/// name can never be overwritten before it has been moved itself.
pub fn rename_multipart_files(
    dir: &Path,
    suffix: &str,
    base: &str,
) -> Result<Vec<String>, NamingError> {
    let current = list_files(dir, suffix)?;

    let mut staged = Vec::with_capacity(current.len());
    for (index, name) in current.iter().enumerate() {
        let number = index + 1;
        let final_name = multipart_file_name(base, number)?;
        let temp_name = format!(".renaming-{number:03}{suffix}.part");
        fs::rename(dir.join(name), dir.join(&temp_name))?;
        staged.push((temp_name, final_name));
    }

    for (temp_name, final_name) in &staged {
        fs::rename(dir.join(temp_name), dir.join(final_name))?;
    }

    Ok(list_files(dir, suffix)?)
}

/// Compare two file names, treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let l_trimmed = l_run.trim_start_matches('0');
                let r_trimmed = r_run.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed))
                    .then_with(|| l_run.len().cmp(&r_run.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}
