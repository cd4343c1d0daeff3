//! Binds a chat application to GenAI model endpoints discovered from
//! platform service bindings, sizes the embedding index from the discovered
//! embedding model, and provisions a pgvector store or a no-op stand-in.

pub mod config;
pub mod db;
pub mod dimensions;
pub mod discovery;
pub mod embedding;
pub mod observability;
pub mod startup;
pub mod vector_store;

#[cfg(test)]
mod tests;

pub use startup::{AppContext, bootstrap};
