/// Batched embedding with bounded retry and per-item degradation
use super::{zero_vector, EmbeddingError, EmbeddingProvider};
use tracing::{debug, info, warn};

/// Result of embedding one text sequence
#[derive(Debug)]
pub struct BatchOutcome {
    /// One vector per input text, in input order
    pub vectors: Vec<Vec<f32>>,
    /// Input positions that received the zero-vector sentinel
    pub degraded: Vec<usize>,
}

impl BatchOutcome {
    pub fn degraded_count(&self) -> usize {
        self.degraded.len()
    }
}

/// Feeds an `EmbeddingProvider` during corpus builds.
///
/// Texts are embedded in batches of `batch_size`. A failed batch gets up
/// to `max_retries` further attempts; if it still fails, the batcher drops
/// to per-item calls and substitutes a zero vector for any text the
/// provider cannot handle, so one bad item never sinks a whole build.
/// Degraded positions are reported back to the caller and logged.
pub struct EmbeddingBatcher<'a> {
    provider: &'a dyn EmbeddingProvider,
    batch_size: usize,
    max_retries: usize,
}

impl<'a> EmbeddingBatcher<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, batch_size: usize, max_retries: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_retries,
        }
    }

    /// Embed all of `texts`, degrading individual failures to zero vectors.
    ///
    /// Output position `i` always belongs to input position `i`. The only
    /// hard failure left is a provider that breaks its own contract by
    /// returning a misaligned batch.
    pub fn embed_all(&self, texts: &[String]) -> Result<BatchOutcome, EmbeddingError> {
        info!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(texts.len());
        let mut degraded = Vec::new();
        let mut offset = 0usize;

        for batch in texts.chunks(self.batch_size) {
            match self.embed_batch_with_retry(batch) {
                Ok(batch_vectors) => {
                    if batch_vectors.len() != batch.len() {
                        return Err(EmbeddingError::Generation(format!(
                            "Provider returned {} vectors for {} texts",
                            batch_vectors.len(),
                            batch.len()
                        )));
                    }
                    debug!("Embedded batch of {} texts", batch.len());
                    vectors.extend(batch_vectors);
                }
                Err(e) => {
                    warn!(
                        "Batch at offset {} failed after retries, embedding items individually: {}",
                        offset, e
                    );
                    self.embed_items(batch, offset, &mut vectors, &mut degraded);
                }
            }
            offset += batch.len();
        }

        if degraded.is_empty() {
            info!("Embedded {} texts", vectors.len());
        } else {
            warn!(
                "Embedded {} texts, {} degraded to zero vectors",
                vectors.len(),
                degraded.len()
            );
        }

        Ok(BatchOutcome { vectors, degraded })
    }

    fn embed_batch_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0usize;
        loop {
            match self.provider.embed_batch(batch) {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!("Retrying failed batch (attempt {}): {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn embed_items(
        &self,
        batch: &[String],
        offset: usize,
        vectors: &mut Vec<Vec<f32>>,
        degraded: &mut Vec<usize>,
    ) {
        let dimension = self.provider.dimension();
        for (i, text) in batch.iter().enumerate() {
            match self.provider.embed(text) {
                Ok(vector) => vectors.push(vector),
                Err(e) => {
                    debug!("Text {} could not be embedded: {}", offset + i, e);
                    vectors.push(zero_vector(dimension));
                    degraded.push(offset + i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Controllable provider: batch calls fail until `batch_failures` have
    /// been burned; single calls fail for texts containing "poison".
    struct FlakyProvider {
        batch_failures: AtomicUsize,
        batch_calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(batch_failures: usize) -> Self {
            Self {
                batch_failures: AtomicUsize::new(batch_failures),
                batch_calls: AtomicUsize::new(0),
            }
        }

        fn vector_for(text: &str) -> Vec<f32> {
            vec![text.len() as f32, 1.0]
        }
    }

    impl EmbeddingProvider for FlakyProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("poison") {
                return Err(EmbeddingError::InvalidInput("poisoned".to_string()));
            }
            Ok(Self::vector_for(text))
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self
                .batch_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(EmbeddingError::Generation("transient".to_string()));
            }
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(EmbeddingError::Generation("batch poisoned".to_string()));
            }
            Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "flaky-test"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_clean_batches() {
        let provider = FlakyProvider::new(0);
        let batcher = EmbeddingBatcher::new(&provider, 2, 1);

        let input = texts(&["a", "bb", "ccc", "dddd", "eeeee"]);
        let outcome = batcher.embed_all(&input).unwrap();

        assert_eq!(outcome.vectors.len(), 5);
        assert!(outcome.degraded.is_empty());
        assert_eq!(outcome.vectors[2], vec![3.0, 1.0]);
        // 5 texts with batch_size 2 means 3 batch calls
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_input() {
        let provider = FlakyProvider::new(0);
        let batcher = EmbeddingBatcher::new(&provider, 8, 1);

        let outcome = batcher.embed_all(&[]).unwrap();
        assert!(outcome.vectors.is_empty());
        assert!(outcome.degraded.is_empty());
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let provider = FlakyProvider::new(1);
        let batcher = EmbeddingBatcher::new(&provider, 8, 1);

        let input = texts(&["one", "two"]);
        let outcome = batcher.embed_all(&input).unwrap();

        assert_eq!(outcome.vectors.len(), 2);
        assert!(outcome.degraded.is_empty());
        // first call failed, retry succeeded
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_poisoned_item_degrades_to_zero_vector() {
        let provider = FlakyProvider::new(0);
        let batcher = EmbeddingBatcher::new(&provider, 8, 1);

        let input = texts(&["fine", "poison pill", "also fine"]);
        let outcome = batcher.embed_all(&input).unwrap();

        assert_eq!(outcome.vectors.len(), 3);
        assert_eq!(outcome.degraded, vec![1]);
        assert_eq!(outcome.vectors[1], vec![0.0, 0.0]);
        assert_eq!(outcome.vectors[0], vec![4.0, 1.0]);
        assert_eq!(outcome.vectors[2], vec![9.0, 1.0]);
    }

    #[test]
    fn test_degraded_positions_are_global_offsets() {
        let provider = FlakyProvider::new(0);
        let batcher = EmbeddingBatcher::new(&provider, 2, 0);

        let input = texts(&["a", "b", "c", "poison", "e"]);
        let outcome = batcher.embed_all(&input).unwrap();

        assert_eq!(outcome.vectors.len(), 5);
        assert_eq!(outcome.degraded, vec![3]);
        assert_eq!(outcome.degraded_count(), 1);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let provider = FlakyProvider::new(0);
        let batcher = EmbeddingBatcher::new(&provider, 0, 1);

        let outcome = batcher.embed_all(&texts(&["a", "b"])).unwrap();
        assert_eq!(outcome.vectors.len(), 2);
    }
}
