use crate::index::{DocId, Field, IndexStore};
use crate::model::{Bm25Params, IndriParams};
use std::collections::HashSet;

/// Field-level BM25/Indri scorer used for feature extraction. Works
/// directly on document term vectors, independent of the operator
/// tree. Collection statistics are gathered once at construction.
pub struct RetrievalEvaluator<'a, S: IndexStore> {
    store: &'a S,
    bm25: Option<Bm25Params>,
    indri: Option<IndriParams>,
    num_docs: f64,
    avg_len: [f64; 5],
    col_len: [f64; 5],
}

impl<'a, S: IndexStore> RetrievalEvaluator<'a, S> {
    pub fn new(store: &'a S, bm25: Option<Bm25Params>, indri: Option<IndriParams>) -> Self {
        let mut avg_len = [0.0; 5];
        let mut col_len = [0.0; 5];
        if bm25.is_some() {
            for field in Field::ALL {
                let dc = store.doc_count(field);
                if dc > 0 {
                    avg_len[field.idx()] =
                        store.sum_total_term_freq(field) as f64 / dc as f64;
                }
            }
        }
        if indri.is_some() {
            for field in Field::ALL {
                col_len[field.idx()] = store.sum_total_term_freq(field) as f64;
            }
        }
        RetrievalEvaluator {
            store,
            bm25,
            indri,
            num_docs: store.num_docs() as f64,
            avg_len,
            col_len,
        }
    }

    /// BM25 score of the query stems against one document field. Sums
    /// the per-term weight over stems present in the field vector;
    /// absent stems contribute nothing. A document without the field
    /// yields NaN, recovered downstream by normalization.
    pub fn bm25_score(&self, query_stems: &[String], doc: DocId, field: Field) -> f64 {
        let p = match &self.bm25 {
            Some(p) => p,
            None => return 0.0,
        };
        let vector = match self.store.term_vector(doc, field) {
            Some(v) => v,
            None => return f64::NAN,
        };

        let doc_len = self.store.doc_length(field, doc) as f64;
        let avg_len = self.avg_len[field.idx()];
        let qtf = 1.0;
        let user_weight = (p.k3 + 1.0) * qtf / (p.k3 + qtf);

        let mut score = 0.0;
        for entry in vector.stems() {
            if query_stems.iter().any(|s| *s == entry.stem) {
                let tf = entry.tf as f64;
                let df = entry.df as f64;
                let idf = ((self.num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
                let tf_weight = tf / (tf + p.k1 * ((1.0 - p.b) + p.b * doc_len / avg_len));
                score += idf * tf_weight * user_weight;
            }
        }
        score
    }

    /// Dirichlet-smoothed language model score: the product over every
    /// query stem of `p^(1/|query|)`, where unmatched stems are
    /// smoothed with tf = 0. When no stem matches at all the score is
    /// forced to exactly 0 instead of the nonzero smoothed product.
    pub fn indri_score(&self, query_stems: &[String], doc: DocId, field: Field) -> f64 {
        let p = match &self.indri {
            Some(p) => p,
            None => return 0.0,
        };
        let vector = match self.store.term_vector(doc, field) {
            Some(v) => v,
            None => return f64::NAN,
        };

        let doc_len = self.store.doc_length(field, doc) as f64;
        let col_len = self.col_len[field.idx()];
        let exponent = 1.0 / query_stems.len() as f64;

        let mut score = 1.0;
        let mut matched: HashSet<usize> = HashSet::new();
        for entry in vector.stems() {
            if let Some(ix) = query_stems.iter().position(|s| *s == entry.stem) {
                matched.insert(ix);
                let tf = entry.tf as f64;
                let p_mle =
                    self.store.total_term_freq(field, &entry.stem) as f64 / col_len;
                let prob = (1.0 - p.lambda) * (tf + p.mu * p_mle) / (doc_len + p.mu)
                    + p.lambda * p_mle;
                score *= prob.powf(exponent);
            }
        }

        if matched.is_empty() {
            return 0.0;
        }
        for (ix, stem) in query_stems.iter().enumerate() {
            if !matched.contains(&ix) {
                let p_mle = self.store.total_term_freq(field, stem) as f64 / col_len;
                let prob = (1.0 - p.lambda) * p.mu * p_mle / (doc_len + p.mu)
                    + p.lambda * p_mle;
                score *= prob.powf(exponent);
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DocInput, MemoryIndex, MemoryIndexBuilder};

    fn index() -> MemoryIndex {
        let mut b = MemoryIndexBuilder::new();
        for (ext, body, title) in [
            ("d0", "solar panel efficiency panel", "solar panel"),
            ("d1", "wind turbine blade", "wind power"),
            ("d2", "solar wind observation", ""),
        ] {
            let mut fields = vec![(Field::Body, body.to_string())];
            if !title.is_empty() {
                fields.push((Field::Title, title.to_string()));
            }
            b.add_document(DocInput {
                external_id: ext.into(),
                url: format!("http://example.com/{ext}"),
                spam_score: 0,
                fields,
            });
        }
        b.build()
    }

    fn bm25() -> Bm25Params {
        Bm25Params {
            b: 0.75,
            k1: 1.2,
            k3: 0.0,
        }
    }

    fn indri() -> IndriParams {
        IndriParams {
            mu: 100.0,
            lambda: 0.4,
        }
    }

    fn stems(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn bm25_sums_only_matching_stems() {
        let idx = index();
        let ev = RetrievalEvaluator::new(&idx, Some(bm25()), None);
        let hit = ev.bm25_score(&stems(&["solar", "panel"]), 0, Field::Body);
        let partial = ev.bm25_score(&stems(&["solar", "zebra"]), 0, Field::Body);
        let miss = ev.bm25_score(&stems(&["zebra"]), 0, Field::Body);
        assert!(hit > partial);
        assert!(partial > 0.0);
        assert_eq!(miss, 0.0);
    }

    #[test]
    fn missing_field_is_nan() {
        let idx = index();
        let ev = RetrievalEvaluator::new(&idx, Some(bm25()), Some(indri()));
        // d2 has no title field.
        assert!(ev.bm25_score(&stems(&["solar"]), 2, Field::Title).is_nan());
        assert!(ev.indri_score(&stems(&["solar"]), 2, Field::Title).is_nan());
    }

    #[test]
    fn indri_zero_when_no_stem_matches() {
        let idx = index();
        let ev = RetrievalEvaluator::new(&idx, None, Some(indri()));
        // "turbine" exists in the collection, so the smoothed product
        // would be nonzero; the no-match rule forces exactly 0.
        let score = ev.indri_score(&stems(&["turbin"]), 0, Field::Body);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn indri_smooths_unmatched_stems() {
        let idx = index();
        let ev = RetrievalEvaluator::new(&idx, None, Some(indri()));
        let both = ev.indri_score(&stems(&["solar", "panel"]), 0, Field::Body);
        let one = ev.indri_score(&stems(&["solar", "turbin"]), 0, Field::Body);
        assert!(both > one);
        assert!(one > 0.0);
    }

    #[test]
    fn disabled_models_score_zero() {
        let idx = index();
        let ev = RetrievalEvaluator::new(&idx, None, None);
        assert_eq!(ev.bm25_score(&stems(&["solar"]), 0, Field::Body), 0.0);
        assert_eq!(ev.indri_score(&stems(&["solar"]), 0, Field::Body), 0.0);
    }
}
