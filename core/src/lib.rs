//! Learning-to-rank re-ranking core: structured query evaluation over
//! a field-segmented inverted index, BM25/Indri scoring, feature
//! vector generation, and re-ranking of external ranker predictions.

pub mod eval;
pub mod evaluator;
pub mod features;
pub mod index;
pub mod memory;
pub mod model;
pub mod persist;
pub mod query;
pub mod rank;
pub mod ranker;
pub mod tokenizer;

pub use index::{DocId, DocMeta, Field, IndexStore, InvertedList, Posting, TermVector, TermVectorEntry};
pub use model::{Bm25Params, IndriParams, RetrievalModel};
