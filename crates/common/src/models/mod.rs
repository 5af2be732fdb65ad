//! Shared data model
//!
//! Records exchanged between the engine and its collaborators. Documents and
//! company records arrive from the persistence layer; chunks are produced by
//! the chunker and live only as long as their parent document is indexed.

mod chunk;
mod company;
mod document;

pub use chunk::Chunk;
pub use company::{CompanyRecord, Industry, Region};
pub use document::{Document, DocumentType};
