//! Corpus bundle persistence
//!
//! A corpus on disk is four files in one directory: the index snapshot,
//! the chunk texts (zstd-compressed JSON), the per-chunk source records,
//! and a manifest written last. Every file lands via temp-file + rename,
//! and the manifest carries BLAKE3 checksums of the other three, so a
//! reader either sees a committed bundle or no bundle at all.

use super::CorpusError;
use crate::embedding::FlatIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Manifest schema version; bump on any layout change
pub const MANIFEST_SCHEMA_VERSION: &str = "1";

const INDEX_FILE: &str = "index.bin";
const CHUNKS_FILE: &str = "chunks.json.zst";
const SOURCES_FILE: &str = "sources.json";
const MANIFEST_FILE: &str = "manifest.json";

const ZSTD_LEVEL: i32 = 3;

/// Per-chunk provenance record, aligned with the chunk-text list by position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Site the chunk's document was scraped from
    pub source_url: String,
    /// Archive snapshot, when the scraper recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
}

/// BLAKE3 checksums of the three data files, hex-encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleChecksums {
    pub index: String,
    pub chunks: String,
    pub sources: String,
}

/// Manifest describing one persisted corpus build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub schema_version: String,
    /// Unique id of this build
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    /// Embedding model the corpus was built with; queries must use the same
    pub model: String,
    /// Embedding dimension (0 for an empty corpus)
    pub dimension: usize,
    pub chunk_count: usize,
    pub documents_indexed: usize,
    pub checksums: BundleChecksums,
}

/// Reads and writes the on-disk corpus bundle.
pub struct CorpusStore {
    dir: PathBuf,
}

impl CorpusStore {
    /// Store rooted at `<data_dir>/corpus`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("corpus"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// True when a committed bundle exists.
    pub fn exists(&self) -> bool {
        self.manifest_path().exists()
    }

    /// Persist one built corpus, replacing any previous bundle.
    ///
    /// The three data files are written first and the manifest last. The
    /// old manifest is removed up front, so a crash mid-write leaves no
    /// readable manifest and therefore no corpus, never a mixed one.
    pub fn write(
        &self,
        index: &FlatIndex,
        chunks: &[String],
        sources: &[SourceRecord],
        model: &str,
        documents_indexed: usize,
    ) -> Result<CorpusManifest, CorpusError> {
        debug_assert_eq!(chunks.len(), sources.len());

        fs::create_dir_all(&self.dir).map_err(|e| CorpusError::Io {
            source: e,
            context: format!("Failed to create corpus directory: {}", self.dir.display()),
        })?;

        let manifest_path = self.manifest_path();
        if manifest_path.exists() {
            fs::remove_file(&manifest_path).map_err(|e| CorpusError::Io {
                source: e,
                context: format!(
                    "Failed to remove stale manifest: {}",
                    manifest_path.display()
                ),
            })?;
        }

        let index_bytes = index.to_bytes()?;
        let chunk_bytes = encode_chunks(chunks)?;
        let source_bytes = serde_json::to_vec_pretty(sources).map_err(|e| CorpusError::Json {
            source: e,
            context: "Failed to encode source records".to_string(),
        })?;

        self.write_file(INDEX_FILE, &index_bytes)?;
        self.write_file(CHUNKS_FILE, &chunk_bytes)?;
        self.write_file(SOURCES_FILE, &source_bytes)?;

        let manifest = CorpusManifest {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            model: model.to_string(),
            dimension: index.dimension().unwrap_or(0),
            chunk_count: chunks.len(),
            documents_indexed,
            checksums: BundleChecksums {
                index: blake3::hash(&index_bytes).to_hex().to_string(),
                chunks: blake3::hash(&chunk_bytes).to_hex().to_string(),
                sources: blake3::hash(&source_bytes).to_hex().to_string(),
            },
        };
        let manifest_bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|e| CorpusError::Json {
                source: e,
                context: "Failed to encode manifest".to_string(),
            })?;
        self.write_file(MANIFEST_FILE, &manifest_bytes)?;

        info!(
            "Persisted corpus: {} chunks, model {}, build {}",
            chunks.len(),
            model,
            manifest.build_id
        );
        Ok(manifest)
    }

    /// Load the full bundle, verifying checksums and part alignment.
    pub fn read(
        &self,
    ) -> Result<(CorpusManifest, FlatIndex, Vec<String>, Vec<SourceRecord>), CorpusError> {
        let manifest = self.read_manifest()?;

        let index_bytes = self.read_required(INDEX_FILE)?;
        let chunk_bytes = self.read_required(CHUNKS_FILE)?;
        let source_bytes = self.read_required(SOURCES_FILE)?;

        verify_checksum("index", &manifest.checksums.index, &index_bytes)?;
        verify_checksum("chunks", &manifest.checksums.chunks, &chunk_bytes)?;
        verify_checksum("sources", &manifest.checksums.sources, &source_bytes)?;

        let index = FlatIndex::from_bytes(&index_bytes)?;
        let chunks = decode_chunks(&chunk_bytes)?;
        let sources: Vec<SourceRecord> =
            serde_json::from_slice(&source_bytes).map_err(|e| CorpusError::Corrupt {
                reason: format!("unreadable source records: {}", e),
            })?;

        if index.len() != chunks.len() || chunks.len() != sources.len() {
            return Err(CorpusError::Corrupt {
                reason: format!(
                    "bundle parts disagree: {} vectors, {} chunks, {} sources",
                    index.len(),
                    chunks.len(),
                    sources.len()
                ),
            });
        }
        if chunks.len() != manifest.chunk_count {
            return Err(CorpusError::Corrupt {
                reason: format!(
                    "manifest records {} chunks, bundle has {}",
                    manifest.chunk_count,
                    chunks.len()
                ),
            });
        }

        Ok((manifest, index, chunks, sources))
    }

    /// Read the manifest alone, for status reporting.
    pub fn read_manifest(&self) -> Result<CorpusManifest, CorpusError> {
        let manifest_bytes = self.read_required(MANIFEST_FILE)?;
        let manifest: CorpusManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|e| CorpusError::Corrupt {
                reason: format!("unreadable manifest: {}", e),
            })?;
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(CorpusError::Corrupt {
                reason: format!(
                    "unsupported manifest schema version {}",
                    manifest.schema_version
                ),
            });
        }
        Ok(manifest)
    }

    fn read_required(&self, name: &str) -> Result<Vec<u8>, CorpusError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(CorpusError::NotFound { path });
        }
        fs::read(&path).map_err(|e| CorpusError::Io {
            source: e,
            context: format!("Failed to read corpus file: {}", path.display()),
        })
    }

    /// Atomic write: temp file in the bundle directory, fsync, rename.
    fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), CorpusError> {
        let final_path = self.dir.join(name);
        let temp_path = self.dir.join(format!(".{}.tmp", name));

        let mut file = fs::File::create(&temp_path).map_err(|e| CorpusError::Io {
            source: e,
            context: format!("Failed to create temp file: {}", temp_path.display()),
        })?;
        file.write_all(bytes).map_err(|e| CorpusError::Io {
            source: e,
            context: format!("Failed to write temp file: {}", temp_path.display()),
        })?;
        file.sync_all().map_err(|e| CorpusError::Io {
            source: e,
            context: format!("Failed to sync temp file: {}", temp_path.display()),
        })?;
        drop(file);

        fs::rename(&temp_path, &final_path).map_err(|e| CorpusError::Io {
            source: e,
            context: format!(
                "Failed to rename temp file to final location: {} -> {}",
                temp_path.display(),
                final_path.display()
            ),
        })?;
        Ok(())
    }
}

fn verify_checksum(part: &str, expected: &str, bytes: &[u8]) -> Result<(), CorpusError> {
    let actual = blake3::hash(bytes).to_hex().to_string();
    if actual != expected {
        return Err(CorpusError::Corrupt {
            reason: format!("{} checksum mismatch", part),
        });
    }
    Ok(())
}

fn encode_chunks(chunks: &[String]) -> Result<Vec<u8>, CorpusError> {
    let json = serde_json::to_vec(chunks).map_err(|e| CorpusError::Json {
        source: e,
        context: "Failed to encode chunk texts".to_string(),
    })?;
    zstd::encode_all(json.as_slice(), ZSTD_LEVEL).map_err(|e| CorpusError::Io {
        source: e,
        context: "Failed to compress chunk texts".to_string(),
    })
}

fn decode_chunks(bytes: &[u8]) -> Result<Vec<String>, CorpusError> {
    let json = zstd::decode_all(bytes).map_err(|e| CorpusError::Corrupt {
        reason: format!("chunk texts failed to decompress: {}", e),
    })?;
    serde_json::from_slice(&json).map_err(|e| CorpusError::Corrupt {
        reason: format!("unreadable chunk texts: {}", e),
    })
}
