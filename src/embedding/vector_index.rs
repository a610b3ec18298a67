/// Flat exact-search vector index
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Cannot index zero-dimension vectors")]
    ZeroDimension,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index snapshot is unreadable: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One nearest-neighbor hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Ordinal of the stored vector, which is also the chunk's position
    /// in the corpus
    pub ordinal: usize,
    /// Squared Euclidean distance to the query; lower is closer
    pub distance: f32,
}

/// Serialized form: the dimension plus the row-major vector data.
#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    dimension: usize,
    data: Vec<f32>,
}

/// Exact nearest-neighbor index over squared Euclidean distance.
///
/// Every query scans every stored vector, so results are exact. At the
/// corpus sizes the archive pipeline produces (thousands of chunks) a
/// scan is well under a millisecond.
///
/// The index is immutable once built. Rebuilding from scratch is the only
/// update path, matching the corpus build cycle.
pub struct FlatIndex {
    /// One stored vector per row; shape (0, 0) when empty
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Build an index over `vectors`.
    ///
    /// The first vector fixes the dimension; every other vector must
    /// match it. An empty input builds an empty index that answers every
    /// search with no hits.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if vectors.is_empty() {
            return Ok(Self::empty());
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }

        let mut matrix = Array2::<f32>::zeros((vectors.len(), dimension));
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            matrix
                .row_mut(row)
                .assign(&ArrayView1::from(vector.as_slice()));
        }

        Ok(Self { vectors: matrix })
    }

    fn empty() -> Self {
        Self {
            vectors: Array2::zeros((0, 0)),
        }
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension shared by all stored vectors; `None` for an empty index
    pub fn dimension(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.vectors.ncols())
        }
    }

    /// Return the `k` stored vectors closest to `query`, nearest first.
    ///
    /// Ties are broken by insertion order, so repeated searches over the
    /// same corpus return the same ranking. An empty index returns no hits
    /// for any query; otherwise the query must match the index dimension.
    /// Fewer than `k` stored vectors yield them all.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let dimension = self.vectors.ncols();
        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let mut hits: Vec<SearchHit> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(ordinal, row)| {
                let diff = &row - &query;
                SearchHit {
                    ordinal,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize the index for the corpus bundle.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let snapshot = IndexSnapshot {
            dimension: self.vectors.ncols(),
            data: self.vectors.iter().copied().collect(),
        };
        bincode::serialize(&snapshot).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Rebuild an index from `to_bytes` output, rejecting snapshots whose
    /// data does not divide evenly into rows.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let snapshot: IndexSnapshot =
            bincode::deserialize(bytes).map_err(|e| IndexError::Serialization(e.to_string()))?;

        if snapshot.dimension == 0 {
            if !snapshot.data.is_empty() {
                return Err(IndexError::Serialization(
                    "zero-dimension snapshot carries data".to_string(),
                ));
            }
            return Ok(Self::empty());
        }

        if snapshot.data.len() % snapshot.dimension != 0 {
            return Err(IndexError::Serialization(format!(
                "data length {} is not a multiple of dimension {}",
                snapshot.data.len(),
                snapshot.dimension
            )));
        }

        let rows = snapshot.data.len() / snapshot.dimension;
        let vectors = Array2::from_shape_vec((rows, snapshot.dimension), snapshot.data)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        Ok(Self { vectors })
    }

    /// Write the index to `path`.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read an index back from `path`.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dimension: usize, axis: usize) -> Vec<f32> {
        let mut vector = vec![0.0; dimension];
        vector[axis] = 1.0;
        vector
    }

    #[test]
    fn test_build_and_search() {
        let index = FlatIndex::build(vec![unit(4, 0), unit(4, 1), unit(4, 2)]).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(4));

        let hits = index.search(&unit(4, 1), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(hits[0].distance, 0.0);
        assert!(hits[1].distance > hits[0].distance);
    }

    #[test]
    fn test_distances_are_non_decreasing() {
        let vectors = vec![
            vec![0.0, 0.0],
            vec![3.0, 4.0],
            vec![1.0, 1.0],
            vec![0.5, 0.0],
        ];
        let index = FlatIndex::build(vectors).unwrap();

        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(hits.len(), 4);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(hits[0].ordinal, 0);
        assert_eq!(hits[3].ordinal, 1);
        assert_eq!(hits[3].distance, 25.0);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let duplicate = vec![1.0, 2.0, 3.0];
        let index = FlatIndex::build(vec![
            duplicate.clone(),
            vec![9.0, 9.0, 9.0],
            duplicate.clone(),
            duplicate.clone(),
        ])
        .unwrap();

        let hits = index.search(&duplicate, 3).unwrap();
        assert_eq!(
            hits.iter().map(|h| h.ordinal).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );
        assert!(hits.iter().all(|h| h.distance == 0.0));
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = FlatIndex::build(vec![unit(3, 0), unit(3, 1)]).unwrap();
        let hits = index.search(&unit(3, 0), 10).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let index = FlatIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);

        // No dimension to validate against, so any query is answerable
        let hits = index.search(&[1.0, 2.0, 3.0], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_mismatched_vectors_rejected() {
        let result = FlatIndex::build(vec![unit(4, 0), unit(3, 0)]);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = FlatIndex::build(vec![Vec::new()]);
        assert!(matches!(result, Err(IndexError::ZeroDimension)));
    }

    #[test]
    fn test_query_dimension_checked() {
        let index = FlatIndex::build(vec![unit(4, 0)]).unwrap();
        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_roundtrip_preserves_results() {
        let index = FlatIndex::build(vec![unit(8, 0), unit(8, 3), unit(8, 7)]).unwrap();
        let restored = FlatIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();

        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.dimension(), index.dimension());

        let query = unit(8, 3);
        let before = index.search(&query, 3).unwrap();
        let after = restored.search(&query, 3).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_index_roundtrip() {
        let index = FlatIndex::build(Vec::new()).unwrap();
        let restored = FlatIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");

        let index = FlatIndex::build(vec![unit(4, 0), unit(4, 2)]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), Some(4));

        let hits = loaded.search(&unit(4, 2), 1).unwrap();
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = FlatIndex::from_bytes(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(result, Err(IndexError::Serialization(_))));
    }
}
