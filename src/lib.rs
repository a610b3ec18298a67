//! Atomwire - Semantic retrieval over archived nuclear-industry news
//!
//! Reads the CSV snapshots collected by the archive scraper, splits each
//! article into sentence-bounded chunks, embeds the chunks with a local
//! model, and answers nearest-neighbour queries over the result with full
//! source provenance.

pub mod chunker;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;

pub use error::{AtomwireError, Result};
