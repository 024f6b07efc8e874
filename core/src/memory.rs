use crate::index::{
    DocId, DocMeta, Field, IndexStore, InvertedList, Posting, TermVector, TermVectorEntry,
};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One field's slice of the index.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FieldIndex {
    postings: HashMap<String, Vec<Posting>>,
    /// doc id -> field length in stems; 0 for docs without the field.
    doc_lengths: Vec<u64>,
    term_vectors: HashMap<DocId, TermVector>,
    collection_tf: HashMap<String, u64>,
    total_len: u64,
    doc_count: u32,
}

/// Field-segmented in-memory index implementing [`IndexStore`].
/// Built once via [`MemoryIndexBuilder`], then read-only.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryIndex {
    fields: Vec<FieldIndex>,
    docs: Vec<DocMeta>,
    id_map: HashMap<String, DocId>,
}

/// Raw input for one document: metadata plus per-field text.
#[derive(Debug, Clone, Default)]
pub struct DocInput {
    pub external_id: String,
    pub url: String,
    pub spam_score: i64,
    pub fields: Vec<(Field, String)>,
}

#[derive(Debug)]
pub struct MemoryIndexBuilder {
    index: MemoryIndex,
}

impl Default for MemoryIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        MemoryIndexBuilder {
            index: MemoryIndex {
                fields: Field::ALL.iter().map(|_| FieldIndex::default()).collect(),
                docs: Vec::new(),
                id_map: HashMap::new(),
            },
        }
    }

    /// Ingest one document. Doc ids are assigned densely in insertion
    /// order, which keeps every postings list sorted by construction.
    pub fn add_document(&mut self, input: DocInput) -> DocId {
        let doc_id = self.index.docs.len() as DocId;
        self.index.id_map.insert(input.external_id.clone(), doc_id);
        self.index.docs.push(DocMeta {
            external_id: input.external_id,
            url: input.url,
            spam_score: input.spam_score,
        });

        for (field, text) in &input.fields {
            let stems = tokenize(text);
            if stems.is_empty() {
                continue;
            }
            let fx = &mut self.index.fields[field.idx()];

            let mut tf_map: HashMap<&str, u32> = HashMap::new();
            let mut order: Vec<&str> = Vec::new();
            for stem in &stems {
                let count = tf_map.entry(stem.as_str()).or_insert(0);
                if *count == 0 {
                    order.push(stem.as_str());
                }
                *count += 1;
            }

            let mut entries = Vec::with_capacity(order.len());
            for stem in order {
                let tf = tf_map[stem];
                fx.postings
                    .entry(stem.to_string())
                    .or_default()
                    .push(Posting { doc_id, tf });
                *fx.collection_tf.entry(stem.to_string()).or_insert(0) += tf as u64;
                // df is filled in by build() once all documents are in.
                entries.push(TermVectorEntry {
                    stem: stem.to_string(),
                    tf,
                    df: 0,
                });
            }
            fx.term_vectors
                .insert(doc_id, TermVector::with_sentinel(entries));

            let len = stems.len() as u64;
            if fx.doc_lengths.len() <= doc_id as usize {
                fx.doc_lengths.resize(doc_id as usize + 1, 0);
            }
            fx.doc_lengths[doc_id as usize] = len;
            fx.total_len += len;
            fx.doc_count += 1;
        }

        doc_id
    }

    /// Finalize: back-fill term-vector document frequencies from the
    /// completed postings lists.
    pub fn build(mut self) -> MemoryIndex {
        for fx in &mut self.index.fields {
            let dfs: HashMap<String, u32> = fx
                .postings
                .iter()
                .map(|(term, plist)| (term.clone(), plist.len() as u32))
                .collect();
            for tv in fx.term_vectors.values_mut() {
                for entry in tv.entries.iter_mut().skip(1) {
                    entry.df = dfs.get(&entry.stem).copied().unwrap_or(0);
                }
            }
        }
        self.index
    }
}

impl IndexStore for MemoryIndex {
    fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    fn doc_count(&self, field: Field) -> u32 {
        self.fields[field.idx()].doc_count
    }

    fn sum_total_term_freq(&self, field: Field) -> u64 {
        self.fields[field.idx()].total_len
    }

    fn doc_length(&self, field: Field, doc: DocId) -> u64 {
        self.fields[field.idx()]
            .doc_lengths
            .get(doc as usize)
            .copied()
            .unwrap_or(0)
    }

    fn term_vector(&self, doc: DocId, field: Field) -> Option<&TermVector> {
        self.fields[field.idx()].term_vectors.get(&doc)
    }

    fn total_term_freq(&self, field: Field, term: &str) -> u64 {
        self.fields[field.idx()]
            .collection_tf
            .get(term)
            .copied()
            .unwrap_or(0)
    }

    fn postings(&self, field: Field, term: &str) -> InvertedList {
        match self.fields[field.idx()].postings.get(term) {
            Some(plist) => InvertedList {
                term: term.to_string(),
                field,
                postings: plist.clone(),
            },
            None => InvertedList::empty(term, field),
        }
    }

    fn internal_id(&self, external_id: &str) -> Option<DocId> {
        self.id_map.get(external_id).copied()
    }

    fn external_id(&self, doc: DocId) -> Option<&str> {
        self.docs.get(doc as usize).map(|d| d.external_id.as_str())
    }

    fn doc_meta(&self, doc: DocId) -> Option<&DocMeta> {
        self.docs.get(doc as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(ext: &str, body: &str, title: &str) -> DocInput {
        DocInput {
            external_id: ext.to_string(),
            url: format!("http://example.com/{ext}"),
            spam_score: 0,
            fields: vec![
                (Field::Body, body.to_string()),
                (Field::Title, title.to_string()),
            ],
        }
    }

    #[test]
    fn postings_are_sorted_and_deduped() {
        let mut b = MemoryIndexBuilder::new();
        b.add_document(doc("d0", "rust search engine search", "rust"));
        b.add_document(doc("d1", "search ranking", "ranking"));
        let idx = b.build();

        let list = idx.postings(Field::Body, "search");
        assert_eq!(list.df(), 2);
        assert_eq!(list.postings[0], Posting { doc_id: 0, tf: 2 });
        assert_eq!(list.postings[1], Posting { doc_id: 1, tf: 1 });
        assert!(list.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
    }

    #[test]
    fn term_vector_carries_sentinel_and_df() {
        let mut b = MemoryIndexBuilder::new();
        b.add_document(doc("d0", "rust search", "t"));
        b.add_document(doc("d1", "search", "t"));
        let idx = b.build();

        let tv = idx.term_vector(0, Field::Body).unwrap();
        assert_eq!(tv.entries[0].stem, "");
        let search = tv.stems().iter().find(|e| e.stem == "search").unwrap();
        assert_eq!(search.df, 2);
    }

    #[test]
    fn field_statistics() {
        let mut b = MemoryIndexBuilder::new();
        b.add_document(doc("d0", "alpha beta gamma", "alpha"));
        b.add_document(doc("d1", "alpha", "beta"));
        let idx = b.build();

        assert_eq!(idx.num_docs(), 2);
        assert_eq!(idx.doc_count(Field::Body), 2);
        assert_eq!(idx.sum_total_term_freq(Field::Body), 4);
        assert_eq!(idx.doc_length(Field::Body, 0), 3);
        assert_eq!(idx.total_term_freq(Field::Body, "alpha"), 2);
        assert_eq!(idx.internal_id("d1"), Some(1));
        assert_eq!(idx.external_id(1), Some("d1"));
        assert_eq!(idx.doc_count(Field::Inlink), 0);
    }
}
