//! Scraper handoff ingest
//!
//! The scraping collaborator writes one CSV row per archived page snapshot.
//! This module reads that file back into `Document` records, enforcing the
//! required columns and dropping rows that have nothing to chunk.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while reading the scraper handoff file
#[derive(Error, Debug)]
pub enum InputDataError {
    /// Source file does not exist
    #[error("Source file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Source file lacks a required column
    #[error("Source file is missing required column: {column}")]
    MissingColumn { column: String },

    /// Malformed CSV content
    #[error("Malformed source file: {0}")]
    Csv(#[from] csv::Error),
}

/// One scraped snapshot, as handed off by the scraping collaborator.
///
/// `archive_url` and `content` tolerate empty cells because the scraper
/// writes whatever it managed to extract; rows without usable content are
/// dropped at ingest rather than surfacing later as unembeddable chunks.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Identity of the source site.
    #[serde(alias = "original_url")]
    pub origin_url: String,
    /// The archive.org snapshot the text was extracted from, when known.
    #[serde(default)]
    pub archive_url: Option<String>,
    /// Extracted article text. `None` when the scraper wrote an empty cell.
    #[serde(default)]
    pub content: Option<String>,
}

impl Document {
    /// Construct a document directly; the CSV loader is the usual path.
    pub fn new(
        origin_url: impl Into<String>,
        archive_url: Option<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            origin_url: origin_url.into(),
            archive_url,
            content,
        }
    }

    /// The chunkable text of this document, or `None` when the content
    /// cell was missing or blank.
    pub fn text(&self) -> Option<&str> {
        match self.content.as_deref() {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn has_content(&self) -> bool {
        self.text().is_some()
    }

    /// Cap content at `max_chars` characters, mirroring the truncation the
    /// scraper applies to oversized pages.
    fn truncate_content(&mut self, max_chars: usize) {
        if let Some(content) = self.content.as_mut() {
            if content.chars().count() > max_chars {
                *content = content.chars().take(max_chars).collect();
            }
        }
    }
}

/// Read the scraper handoff CSV into `Document` records.
///
/// Rows whose content cell is missing or blank are dropped here so the
/// chunker never sees them. A missing file or a missing required column is
/// fatal for the run.
pub fn read_documents(
    path: &Path,
    max_content_chars: Option<usize>,
) -> Result<Vec<Document>, InputDataError> {
    if !path.exists() {
        return Err(InputDataError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    require_columns(reader.headers()?)?;

    let mut documents = Vec::new();
    let mut dropped = 0usize;
    for row in reader.deserialize::<Document>() {
        let mut document = row?;
        if !document.has_content() {
            dropped += 1;
            debug!("Dropping row without usable content: {}", document.origin_url);
            continue;
        }
        if let Some(cap) = max_content_chars {
            document.truncate_content(cap);
        }
        documents.push(document);
    }

    info!(
        "Loaded {} documents from {} ({} rows dropped)",
        documents.len(),
        path.display(),
        dropped
    );
    Ok(documents)
}

fn require_columns(headers: &csv::StringRecord) -> Result<(), InputDataError> {
    let has = |name: &str| headers.iter().any(|header| header == name);
    if !has("origin_url") && !has("original_url") {
        return Err(InputDataError::MissingColumn {
            column: "original_url".to_string(),
        });
    }
    if !has("content") {
        return Err(InputDataError::MissingColumn {
            column: "content".to_string(),
        });
    }
    Ok(())
}
