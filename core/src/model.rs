/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub b: f64,
    pub k1: f64,
    pub k3: f64,
}

/// Dirichlet-smoothed language model (Indri) parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndriParams {
    pub mu: f64,
    pub lambda: f64,
}

/// Retrieval model for a run. Immutable once constructed; everything
/// model-specific dispatches on the variant explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrievalModel {
    Bm25(Bm25Params),
    Indri(IndriParams),
}

impl RetrievalModel {
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalModel::Bm25(_) => "BM25",
            RetrievalModel::Indri(_) => "Indri",
        }
    }
}
