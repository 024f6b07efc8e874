use crate::index::{DocId, Field, IndexStore, InvertedList};
use crate::model::{Bm25Params, RetrievalModel};
use crate::query::Qryop;
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Per-document scores in insertion order. Sorting happens only at
/// output time, never here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreList {
    pub entries: Vec<(DocId, f64)>,
}

impl ScoreList {
    pub fn add(&mut self, doc: DocId, score: f64) {
        self.entries.push((doc, score));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum EvalResult {
    Inverted(InvertedList),
    Scores(ScoreList),
}

/// Depth-first operator tree evaluator. Collection statistics (N,
/// per-field average lengths) are fetched once at construction and
/// reused for every query in the run.
pub struct QueryEvaluator<'a, S: IndexStore> {
    store: &'a S,
    model: RetrievalModel,
    num_docs: f64,
    avg_len: [f64; 5],
}

impl<'a, S: IndexStore> QueryEvaluator<'a, S> {
    pub fn new(store: &'a S, model: RetrievalModel) -> Self {
        let mut avg_len = [0.0; 5];
        for field in Field::ALL {
            let dc = store.doc_count(field);
            if dc > 0 {
                avg_len[field.idx()] =
                    store.sum_total_term_freq(field) as f64 / dc as f64;
            }
        }
        QueryEvaluator {
            store,
            model,
            num_docs: store.num_docs() as f64,
            avg_len,
        }
    }

    /// Evaluate a parsed query to its score list.
    pub fn evaluate(&self, op: &Qryop) -> Result<ScoreList> {
        match self.eval_node(op)? {
            EvalResult::Scores(s) => Ok(s),
            EvalResult::Inverted(_) => {
                bail!("query root produces an inverted list, not a score list")
            }
        }
    }

    fn eval_node(&self, op: &Qryop) -> Result<EvalResult> {
        match op {
            Qryop::Term { term, field } => {
                Ok(EvalResult::Inverted(self.store.postings(*field, term)))
            }
            Qryop::Score(child) => {
                let list = match self.eval_node(child)? {
                    EvalResult::Inverted(list) => list,
                    EvalResult::Scores(_) => {
                        bail!("SCORE argument must produce an inverted list")
                    }
                };
                // The inverted list is consumed here; a SCORE result
                // never carries postings onward.
                match &self.model {
                    RetrievalModel::Bm25(p) => Ok(EvalResult::Scores(self.score_bm25(&list, p))),
                    RetrievalModel::Indri(_) => {
                        bail!("SCORE is not defined for the Indri model")
                    }
                }
            }
            Qryop::Sum(args) => {
                let mut lists = Vec::with_capacity(args.len());
                for arg in args {
                    match self.eval_node(arg)? {
                        EvalResult::Scores(s) => lists.push(s),
                        EvalResult::Inverted(_) => {
                            bail!("SUM argument must produce a score list")
                        }
                    }
                }
                Ok(EvalResult::Scores(sum_score_lists(lists)))
            }
        }
    }

    fn score_bm25(&self, list: &InvertedList, p: &Bm25Params) -> ScoreList {
        let df = list.df() as f64;
        let avg_len = self.avg_len[list.field.idx()];
        let idf = ((self.num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
        // Repeated query terms are not counted; qtf is fixed at 1.
        let qtf = 1.0;
        let user_weight = (p.k3 + 1.0) * qtf / (p.k3 + qtf);

        let mut scores = ScoreList::default();
        for posting in &list.postings {
            let tf = posting.tf as f64;
            let doc_len = self.store.doc_length(list.field, posting.doc_id) as f64;
            let tf_weight = tf / (tf + p.k1 * ((1.0 - p.b) + p.b * doc_len / avg_len));
            scores.add(posting.doc_id, idf * tf_weight * user_weight);
        }
        scores
    }
}

/// Merge score lists by summing per document; a document missing from
/// a child contributes 0 for that child. Output keeps first-seen
/// document order, linear in total entries.
fn sum_score_lists(lists: Vec<ScoreList>) -> ScoreList {
    let mut order: Vec<DocId> = Vec::new();
    let mut acc: HashMap<DocId, f64> = HashMap::new();
    for list in lists {
        for (doc, score) in list.entries {
            match acc.entry(doc) {
                std::collections::hash_map::Entry::Occupied(mut e) => {
                    *e.get_mut() += score;
                }
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(score);
                    order.push(doc);
                }
            }
        }
    }

    let mut merged = ScoreList::default();
    for doc in order {
        merged.add(doc, acc[&doc]);
    }
    merged
}
