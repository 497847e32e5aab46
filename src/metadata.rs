//! Song metadata from `info.yml`.
//!
//! Every song folder carries an `info.yml` describing the song:
//!
//! ```yaml
//! title: Auf der Mauer, auf der Lauer
//! subtitle: Kinderlied
//! composer: Volksweise
//! year: 1830
//! wikidata: 2873915
//! ```
//!
//! ## Validation
//!
//! - Only the keys in [`ALLOWED_KEYS`] are accepted; anything else is a
//!   typo or an unsupported field and fails the whole scan.
//! - `title` is required.
//! - `wikidata` is the numeric part of the item ID (`2873915`, not `Q2873915`).
//! - Scalars (strings, numbers, booleans) are stored as text; `~` is absent.
//!
//! ## Combined fields
//!
//! The document shows four lines per song. [`SongMetadata::combined`] folds
//! the secondary fields into them:
//!
//! ```text
//! title:    Title (year)
//! subtitle: subtitle - alias - country
//! composer: composer, artist, genre      (artist omitted when it equals composer)
//! lyricist: lyricist                     (only when it differs from artist and composer)
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keys recognized in `info.yml`.
pub const ALLOWED_KEYS: &[&str] = &[
    "alias",
    "arranger",
    "artist",
    "audio",
    "composer",
    "country",
    "description",
    "genre",
    "lyricist",
    "musescore",
    "source",
    "subtitle",
    "title",
    "wikidata",
    "wikipedia",
    "year",
    "youtube",
];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{0}: expected a mapping of keys to values")]
    NotAMapping(PathBuf),
    #[error("{path}: unsupported key {key:?}")]
    UnsupportedKey { path: PathBuf, key: String },
    #[error("{path}: value of {key:?} must be a plain scalar")]
    InvalidValue { path: PathBuf, key: String },
    #[error("{0}: a title is required")]
    MissingTitle(PathBuf),
    #[error("{path}: the Wikidata ID must be a number without the Q prefix, got {value:?}")]
    InvalidWikidata { path: PathBuf, value: String },
}

/// Validated contents of one `info.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SongMetadata {
    pub title: String,
    pub alias: Option<String>,
    pub arranger: Option<String>,
    pub artist: Option<String>,
    pub audio: Option<String>,
    pub composer: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub lyricist: Option<String>,
    pub musescore: Option<String>,
    pub source: Option<String>,
    pub subtitle: Option<String>,
    pub wikidata: Option<String>,
    pub wikipedia: Option<String>,
    pub year: Option<String>,
    pub youtube: Option<String>,
}

/// The four metadata lines shown in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub composer: Option<String>,
    pub lyricist: Option<String>,
}

impl SongMetadata {
    /// Read and validate the metadata file at `path`.
    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        if !path.is_file() {
            return Err(MetadataError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse and validate YAML text. `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, MetadataError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|source| MetadataError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        let mapping = match value {
            serde_yaml::Value::Mapping(m) => m,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => return Err(MetadataError::NotAMapping(origin.to_path_buf())),
        };

        let mut metadata = SongMetadata::default();
        let mut title = None;
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(k) => k,
                other => scalar_text(&other).unwrap_or_default(),
            };
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                return Err(MetadataError::UnsupportedKey {
                    path: origin.to_path_buf(),
                    key,
                });
            }
            let text = match value {
                serde_yaml::Value::Null => None,
                ref v => Some(scalar_text(v).ok_or_else(|| MetadataError::InvalidValue {
                    path: origin.to_path_buf(),
                    key: key.clone(),
                })?),
            };
            if key == "title" {
                title = text;
            } else {
                *metadata.field_mut(&key) = text;
            }
        }

        metadata.title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MetadataError::MissingTitle(origin.to_path_buf()))?;

        if let Some(wikidata) = &metadata.wikidata
            && !is_numeric_id(wikidata)
        {
            return Err(MetadataError::InvalidWikidata {
                path: origin.to_path_buf(),
                value: wikidata.clone(),
            });
        }
        Ok(metadata)
    }

    fn field_mut(&mut self, key: &str) -> &mut Option<String> {
        match key {
            "alias" => &mut self.alias,
            "arranger" => &mut self.arranger,
            "artist" => &mut self.artist,
            "audio" => &mut self.audio,
            "composer" => &mut self.composer,
            "country" => &mut self.country,
            "description" => &mut self.description,
            "genre" => &mut self.genre,
            "lyricist" => &mut self.lyricist,
            "musescore" => &mut self.musescore,
            "source" => &mut self.source,
            "subtitle" => &mut self.subtitle,
            "wikidata" => &mut self.wikidata,
            "wikipedia" => &mut self.wikipedia,
            "year" => &mut self.year,
            _ => &mut self.youtube,
        }
    }

    /// Fold secondary fields into the four displayed lines.
    pub fn combined(&self) -> CombinedMetadata {
        let title = match present(self.year.as_deref()) {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title.clone(),
        };

        let subtitle = join_present(
            &[
                self.subtitle.as_deref(),
                self.alias.as_deref(),
                self.country.as_deref(),
            ],
            " - ",
        );

        let composer = present(self.composer.as_deref());
        let artist = present(self.artist.as_deref()).filter(|a| Some(*a) != composer);
        let composer_line = join_present(&[composer, artist, self.genre.as_deref()], ", ");

        let lyricist = present(self.lyricist.as_deref())
            .filter(|l| Some(*l) != present(self.artist.as_deref()) && Some(*l) != composer)
            .map(String::from);

        CombinedMetadata {
            title,
            subtitle,
            composer: composer_line,
            lyricist,
        }
    }
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_numeric_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Join the non-empty values with `separator`; `None` when all are empty.
fn join_present(values: &[Option<&str>], separator: &str) -> Option<String> {
    let parts: Vec<&str> = values.iter().filter_map(|v| present(*v)).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}
