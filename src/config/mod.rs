//! Configuration management
//!
//! TOML configuration with environment variable overrides
//! (`ATOMWIRE_SECTION__KEY=value`) and a validator that reports every
//! problem at once instead of bailing on the first.

use crate::chunker::{ChunkPolicy, KeywordFilter, SizeMetric};
use crate::error::{AtomwireError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// The fixed list of monitored sites the archive scraper walks.
pub const DEFAULT_SITES: &[&str] = &[
    "https://www.scientificamerican.com",
    "https://www.bnnbloomberg.ca",
    "https://www.axios.com",
    "https://techcrunch.com",
    "https://nuclearstreet.com/",
    "https://www.pewresearch.org",
    "https://www.doctorsfornuclearenergy.org",
    "https://grist.org/",
    "https://thenarwhal.ca",
    "http://www.bostonglobe.com",
    "https://holtecinternational.com",
    "https://nanonuclearenergy.com/",
    "https://kairospower.com",
    "https://www.terrapower.com",
    "https://www.aalo.com",
    "https://www.energy.gov/ne/office-nuclear-energy-news",
    "https://www.energy.gov/ne/listings/ne-press-releases",
    "https://www.anl.gov",
    "https://thoriumenergyalliance.com",
    "https://www.nucnet.org",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub sources: SourcesConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for persisted data; the corpus bundle lives in `<data_dir>/corpus`
    pub data_dir: PathBuf,
}

/// Where scraped documents come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// CSV handoff file written by the scraping collaborator
    pub file: PathBuf,
    /// Optional per-document ingest cap in characters, mirroring the
    /// truncation the scraper applies to oversized pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_chars: Option<usize>,
    /// Monitored sites, used for coverage reporting in `status`
    #[serde(default)]
    pub sites: Vec<String>,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub size_metric: SizeMetric,
    pub max_size: usize,
    /// Optional relevance keyword; documents mentioning it fewer than
    /// `keyword_min_count` times are skipped at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default = "default_keyword_min_count")]
    pub keyword_min_count: usize,
}

fn default_keyword_min_count() -> usize {
    2
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Retries per embedding batch before per-item degradation
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_max_retries() -> usize {
    1
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result count when `--limit` is not given
    pub default_limit: usize,
    /// Truncation budget for the assembled context block
    pub context_max_chars: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AtomwireError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AtomwireError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| AtomwireError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: ATOMWIRE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("ATOMWIRE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "SOURCES__FILE" => {
                self.sources.file = PathBuf::from(value);
            }
            "CHUNKING__MAX_SIZE" => {
                self.chunking.max_size =
                    value.parse().map_err(|_| AtomwireError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "CHUNKING__SIZE_METRIC" => {
                self.chunking.size_metric = match value.to_ascii_lowercase().as_str() {
                    "characters" => SizeMetric::Characters,
                    "words" => SizeMetric::Words,
                    _ => {
                        return Err(AtomwireError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Unknown size metric '{}'", value),
                        })
                    }
                };
            }
            "CHUNKING__KEYWORD" => {
                self.chunking.keyword = Some(value.to_string());
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size =
                    value.parse().map_err(|_| AtomwireError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "RETRIEVAL__DEFAULT_LIMIT" => {
                self.retrieval.default_limit =
                    value.parse().map_err(|_| AtomwireError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            AtomwireError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("atomwire").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AtomwireError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".atomwire"))
    }

    /// `storage.data_dir` with a leading `~/` expanded
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    /// `sources.file` with a leading `~/` expanded
    pub fn sources_file(&self) -> Result<PathBuf> {
        expand_path(&self.sources.file)
    }

    /// Chunking policy derived from the `[chunking]` section
    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            metric: self.chunking.size_metric,
            max_size: self.chunking.max_size,
        }
    }

    /// Keyword filter from config, if one is set
    pub fn keyword_filter(&self) -> Result<Option<KeywordFilter>> {
        match &self.chunking.keyword {
            Some(keyword) => {
                let filter = KeywordFilter::new(keyword, self.chunking.keyword_min_count)
                    .map_err(|e| AtomwireError::InvalidConfigValue {
                        path: "chunking.keyword".to_string(),
                        message: e.to_string(),
                    })?;
                Ok(Some(filter))
            }
            None => Ok(None),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.atomwire"),
            },
            sources: SourcesConfig {
                file: PathBuf::from("scraped_sources.csv"),
                max_content_chars: None,
                sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
            },
            chunking: ChunkingConfig {
                size_metric: SizeMetric::Characters,
                max_size: 500,
                keyword: None,
                keyword_min_count: default_keyword_min_count(),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
                max_retries: default_max_retries(),
            },
            retrieval: RetrievalConfig {
                default_limit: 5,
                context_max_chars: 2000,
            },
        }
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| AtomwireError::Config("Invalid path encoding".to_string()))?;
    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AtomwireError::Config("Cannot determine home directory".to_string()))?;
        Ok(home_dir.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
