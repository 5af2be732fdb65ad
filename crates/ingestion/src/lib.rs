//! DealFlow Ingestion Library
//!
//! Turns raw filings, decks and reports into indexed chunks.

pub mod chunker;
pub mod errors;
mod ledger;
pub mod loader;
pub mod processor;

pub use chunker::{Chunker, Chunks, TextChunk};
pub use errors::IngestionError;
pub use processor::{
    cancellation, BatchReport, DocumentFailure, IngestionProcessor, IngestionReport,
    IngestionSettings,
};
