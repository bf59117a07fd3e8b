//! Triple model, triple-store port, and SPARQL templates

mod port;
pub mod sparql;
mod triple;

pub use port::{
    LabelMatch, MemoryTripleStore, ResolvedName, SparqlEndpoint, SparqlTripleStore,
    TripleQueries, TripleStoreError,
};
pub use triple::{vocab, Triple};
