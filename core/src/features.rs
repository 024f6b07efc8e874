use crate::eval::QueryEvaluator;
use crate::evaluator::RetrievalEvaluator;
use crate::index::{DocId, Field, IndexStore};
use crate::model::{Bm25Params, IndriParams, RetrievalModel};
use crate::query::parse_query;
use crate::tokenizer::tokenize;
use anyhow::{bail, Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub const NUM_FEATURES: usize = 18;

/// Documents taken from the initial BM25 ranking per test query.
const RERANK_DEPTH: usize = 100;

// 0-based slot layout. Slots 16 and 17 are reserved and always 0.
const SLOT_SPAM: usize = 0;
const SLOT_URL_DEPTH: usize = 1;
const SLOT_WIKI: usize = 2;
const SLOT_PAGE_RANK: usize = 3;
const BM25_SLOTS: [usize; 4] = [4, 7, 10, 13];
const INDRI_SLOTS: [usize; 4] = [5, 8, 11, 14];
const OVERLAP_SLOTS: [usize; 4] = [6, 9, 12, 15];

/// One query read from a query file.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: String,
    pub text: String,
}

/// One relevance judgment row.
#[derive(Debug, Clone)]
pub struct Judgment {
    pub query_id: String,
    pub external_id: String,
    pub label: i32,
}

/// Read a `<queryId>:<raw text>` query file.
pub fn read_queries(path: &Path) -> Result<Vec<Query>> {
    let f = File::open(path).with_context(|| format!("opening query file {}", path.display()))?;
    let mut queries = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (id, text) = line
            .split_once(':')
            .with_context(|| format!("malformed query line: {line}"))?;
        queries.push(Query {
            id: id.to_string(),
            text: text.to_string(),
        });
    }
    Ok(queries)
}

/// Read a `<queryId> <unused> <externalId> <label>` judgment file.
pub fn read_judgments(path: &Path) -> Result<Vec<Judgment>> {
    let f = File::open(path)
        .with_context(|| format!("opening judgment file {}", path.display()))?;
    let mut judgments = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 4 {
            bail!("malformed judgment line: {line}");
        }
        judgments.push(Judgment {
            query_id: parts[0].to_string(),
            external_id: parts[2].to_string(),
            label: parts[3]
                .parse()
                .with_context(|| format!("bad relevance label in: {line}"))?,
        });
    }
    Ok(judgments)
}

/// Read a tab-separated `<externalId>\t<score>` PageRank file. The
/// split is on the last tab so external ids may contain tabs.
pub fn read_page_rank(path: &Path) -> Result<HashMap<String, f64>> {
    let f = File::open(path)
        .with_context(|| format!("opening PageRank file {}", path.display()))?;
    let mut scores = HashMap::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (ext, score) = line
            .rsplit_once('\t')
            .with_context(|| format!("malformed PageRank line: {line}"))?;
        scores.insert(
            ext.to_string(),
            score
                .parse()
                .with_context(|| format!("bad PageRank score in: {line}"))?,
        );
    }
    Ok(scores)
}

/// Whether the PageRank slot is enabled under a 1-based disable set.
pub fn page_rank_needed(disabled_slots: &HashSet<usize>) -> bool {
    !disabled_slots.contains(&(SLOT_PAGE_RANK + 1))
}

/// Whether the Indri model is consulted under a 1-based disable set;
/// false once its whole column group is disabled. Callers may skip
/// reading Indri parameters entirely in that case.
pub fn indri_needed(disabled_slots: &HashSet<usize>) -> bool {
    !INDRI_SLOTS.iter().all(|&s| disabled_slots.contains(&(s + 1)))
}

/// Builds, normalizes, and writes 18-slot feature vectors for
/// (query, document) pairs.
pub struct FeatureGenerator<'a, S: IndexStore> {
    store: &'a S,
    evaluator: RetrievalEvaluator<'a, S>,
    disabled: [bool; NUM_FEATURES],
    page_rank: HashMap<String, f64>,
}

impl<'a, S: IndexStore> FeatureGenerator<'a, S> {
    /// `disabled_slots` uses the 1-based indices of the configuration
    /// surface. A model whose entire column group is disabled is not
    /// consulted at all.
    pub fn new(
        store: &'a S,
        bm25: Option<Bm25Params>,
        indri: Option<IndriParams>,
        disabled_slots: &HashSet<usize>,
        page_rank: HashMap<String, f64>,
    ) -> Self {
        let mut disabled = [false; NUM_FEATURES];
        for &slot in disabled_slots {
            if (1..=NUM_FEATURES).contains(&slot) {
                disabled[slot - 1] = true;
            }
        }
        let bm25 = bm25.filter(|_| !BM25_SLOTS.iter().all(|&s| disabled[s]));
        let indri = indri.filter(|_| !INDRI_SLOTS.iter().all(|&s| disabled[s]));
        FeatureGenerator {
            store,
            evaluator: RetrievalEvaluator::new(store, bm25, indri),
            disabled,
            page_rank,
        }
    }

    /// Generate the labeled training file: for each query, the judged
    /// documents in qrels order, normalized per query, written as
    /// `<label> qid:<id> 1:<f1> .. 18:<f18> # <externalId>` with the
    /// judgment shifted by +3 into the ranker's positive range.
    pub fn generate_training_file(
        &self,
        queries: &[Query],
        judgments: &[Judgment],
        out: &Path,
    ) -> Result<()> {
        let f = File::create(out)
            .with_context(|| format!("creating training feature file {}", out.display()))?;
        let mut writer = BufWriter::new(f);

        for query in queries {
            let stems = tokenize(&query.text);
            let mut external_ids = Vec::new();
            let mut labels = Vec::new();
            let mut vectors = Vec::new();
            for judgment in judgments.iter().filter(|j| j.query_id == query.id) {
                let doc = self
                    .store
                    .internal_id(&judgment.external_id)
                    .with_context(|| {
                        format!("external id {} not found in index", judgment.external_id)
                    })?;
                external_ids.push(judgment.external_id.clone());
                labels.push(judgment.label + 3);
                vectors.push(self.feature_vector(&stems, &judgment.external_id, doc)?);
            }

            normalize(&mut vectors);
            for i in 0..vectors.len() {
                write_feature_line(&mut writer, labels[i], &query.id, &vectors[i], &external_ids[i])?;
            }
            tracing::info!(query_id = %query.id, docs = vectors.len(), "training features written");
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate the unlabeled testing file: each query's top ranked
    /// documents from an initial BM25 run of the operator tree, in
    /// rank order, normalized per query. Queries that fail to parse
    /// are reported and skipped, never fatal.
    pub fn generate_testing_file(
        &self,
        queries: &[Query],
        bm25: Bm25Params,
        out: &Path,
    ) -> Result<()> {
        let f = File::create(out)
            .with_context(|| format!("creating testing feature file {}", out.display()))?;
        let mut writer = BufWriter::new(f);

        let model = RetrievalModel::Bm25(bm25);
        let engine = QueryEvaluator::new(self.store, model);

        for query in queries {
            let scores = match parse_query(&query.text, &model)
                .and_then(|op| engine.evaluate(&op))
            {
                Ok(scores) => scores,
                Err(e) => {
                    tracing::warn!(query_id = %query.id, error = %e, "skipping query");
                    continue;
                }
            };

            let mut ranked: Vec<(String, DocId, f64)> = Vec::with_capacity(scores.len());
            for (doc, score) in scores.entries {
                let ext = self
                    .store
                    .external_id(doc)
                    .with_context(|| format!("no external id for internal doc {doc}"))?;
                ranked.push((ext.to_string(), doc, score));
            }
            ranked.sort_by(|a, b| {
                b.2.partial_cmp(&a.2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            ranked.truncate(RERANK_DEPTH);

            let stems = tokenize(&query.text);
            let mut vectors = Vec::with_capacity(ranked.len());
            for (ext, doc, _) in &ranked {
                vectors.push(self.feature_vector(&stems, ext, *doc)?);
            }
            normalize(&mut vectors);
            for (i, (ext, _, _)) in ranked.iter().enumerate() {
                write_feature_line(&mut writer, 0, &query.id, &vectors[i], ext)?;
            }
            tracing::info!(query_id = %query.id, docs = ranked.len(), "testing features written");
        }
        writer.flush()?;
        Ok(())
    }

    /// Raw (pre-normalization) feature vector for one document.
    fn feature_vector(
        &self,
        query_stems: &[String],
        external_id: &str,
        doc: DocId,
    ) -> Result<[f64; NUM_FEATURES]> {
        let meta = self
            .store
            .doc_meta(doc)
            .with_context(|| format!("no metadata for internal doc {doc}"))?;

        let mut f = [0.0; NUM_FEATURES];
        if !self.disabled[SLOT_SPAM] {
            f[SLOT_SPAM] = meta.spam_score as f64;
        }
        if !self.disabled[SLOT_URL_DEPTH] {
            f[SLOT_URL_DEPTH] = meta.url.matches('/').count() as f64;
        }
        if !self.disabled[SLOT_WIKI] && meta.url.contains("wikipedia.org") {
            f[SLOT_WIKI] = 1.0;
        }
        if !self.disabled[SLOT_PAGE_RANK] {
            // NaN sentinel for unknown documents; normalization turns
            // it into 0 without polluting the column's min/max.
            f[SLOT_PAGE_RANK] = self
                .page_rank
                .get(external_id)
                .copied()
                .unwrap_or(f64::NAN);
        }

        for (i, field) in Field::FEATURE_FIELDS.into_iter().enumerate() {
            if !self.disabled[BM25_SLOTS[i]] {
                f[BM25_SLOTS[i]] = self.evaluator.bm25_score(query_stems, doc, field);
            }
            if !self.disabled[INDRI_SLOTS[i]] {
                f[INDRI_SLOTS[i]] = self.evaluator.indri_score(query_stems, doc, field);
            }
            if !self.disabled[OVERLAP_SLOTS[i]] {
                f[OVERLAP_SLOTS[i]] = self.overlap_score(query_stems, doc, field);
            }
        }
        Ok(f)
    }

    /// Number of term-vector entries that match a query stem, divided
    /// by the query stem count.
    fn overlap_score(&self, query_stems: &[String], doc: DocId, field: Field) -> f64 {
        let vector = match self.store.term_vector(doc, field) {
            Some(v) => v,
            None => return f64::NAN,
        };
        let mut matches = 0.0;
        for entry in vector.stems() {
            if query_stems.iter().any(|s| *s == entry.stem) {
                matches += 1.0;
            }
        }
        matches / query_stems.len() as f64
    }
}

/// Min-max normalize one query group of vectors, column by column.
/// NaN values are excluded from the range and map to 0, as does any
/// column with a degenerate (min == max) range. Callers must never
/// mix documents of different queries in one call.
fn normalize(vectors: &mut [[f64; NUM_FEATURES]]) {
    for i in 0..NUM_FEATURES {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in vectors.iter() {
            if !v[i].is_nan() {
                min = min.min(v[i]);
                max = max.max(v[i]);
            }
        }
        for v in vectors.iter_mut() {
            if min == max || !v[i].is_finite() {
                v[i] = 0.0;
            } else {
                v[i] = (v[i] - min) / (max - min);
            }
        }
    }
}

fn write_feature_line(
    out: &mut impl Write,
    label: i32,
    query_id: &str,
    vector: &[f64; NUM_FEATURES],
    external_id: &str,
) -> Result<()> {
    let mut line = format!("{label} qid:{query_id}");
    for (i, v) in vector.iter().enumerate() {
        line.push_str(&format!(" {}:{}", i + 1, v));
    }
    line.push_str(&format!(" # {external_id}"));
    writeln!(out, "{line}")?;
    Ok(())
}
