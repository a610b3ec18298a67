//! Sentence-boundary chunking
//!
//! Article text is split on the literal `.` terminator and the sentences
//! are greedily packed into chunks no larger than the configured budget.
//! Terminators stay attached to their sentence, so concatenating a
//! document's chunks reproduces its content byte for byte.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How chunk size is measured against the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMetric {
    /// Budget counts characters
    Characters,
    /// Budget counts whitespace-separated words
    Words,
}

/// Chunking policy: size metric and per-chunk budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub metric: SizeMetric,
    pub max_size: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            metric: SizeMetric::Characters,
            max_size: 500,
        }
    }
}

/// A bounded slice of one document's text, with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text; never empty
    pub text: String,
    /// `origin_url` of the document this chunk came from
    pub source_url: String,
    /// Archive snapshot the document was extracted from, when known
    pub archive_url: Option<String>,
    /// Position of this chunk within its document
    pub sequence_index: usize,
}

/// Greedy sentence-boundary chunker
pub struct Chunker {
    policy: ChunkPolicy,
}

impl Chunker {
    pub fn new(policy: ChunkPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    /// Split `text` into chunks of at most `max_size` under the policy's
    /// metric.
    ///
    /// A single sentence over budget is emitted as its own oversized chunk
    /// rather than truncated. Empty and whitespace-only input produce no
    /// chunks. For any other input the chunks concatenate back to `text`
    /// exactly.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_size = 0usize;

        for sentence in text.split_inclusive('.') {
            let sentence_size = self.measure(sentence);
            if !current.is_empty() && current_size + sentence_size > self.policy.max_size {
                chunks.push(std::mem::take(&mut current));
                current_size = 0;
            }
            current.push_str(sentence);
            current_size += sentence_size;
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    // Word counts are measured per sentence and summed, which can only
    // overcount the joined chunk. The budget therefore stays an upper bound.
    fn measure(&self, text: &str) -> usize {
        match self.policy.metric {
            SizeMetric::Characters => text.chars().count(),
            SizeMetric::Words => text.split_whitespace().count(),
        }
    }
}

/// Document-level relevance gate.
///
/// A document is admitted only when the keyword occurs at least
/// `min_count` times, case-insensitively. The scraper folds the headline
/// into the content, so a single text covers both.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    pattern: Regex,
    keyword: String,
    min_count: usize,
}

impl KeywordFilter {
    pub fn new(keyword: &str, min_count: usize) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(keyword)))?;
        Ok(Self {
            pattern,
            keyword: keyword.to_string(),
            min_count,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }

    /// True when `text` mentions the keyword often enough.
    pub fn admits(&self, text: &str) -> bool {
        self.pattern.find_iter(text).take(self.min_count).count() >= self.min_count
    }
}
