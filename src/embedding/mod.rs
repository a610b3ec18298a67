/// Embedding and similarity search
///
/// An `EmbeddingProvider` turns chunk text into fixed-dimension vectors,
/// the `EmbeddingBatcher` feeds it during corpus builds with bounded retry
/// and zero-vector degradation, and the `FlatIndex` answers exact
/// nearest-neighbor queries over the result.
mod batch;
mod provider;
mod vector_index;

pub use batch::{BatchOutcome, EmbeddingBatcher};
pub use provider::{
    supported_models, zero_vector, EmbeddingError, EmbeddingProvider, FastEmbedProvider,
};
pub use vector_index::{FlatIndex, IndexError, SearchHit};
