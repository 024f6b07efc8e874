use serde::{Deserialize, Serialize};

/// Dense internal document id assigned by the index.
pub type DocId = u32;

/// Indexed document fields. Feature extraction covers the first four;
/// `keywords` is additionally recognized as a query field suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Body,
    Title,
    Url,
    Inlink,
    Keywords,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Body,
        Field::Title,
        Field::Url,
        Field::Inlink,
        Field::Keywords,
    ];

    /// Fields that contribute BM25/Indri/overlap feature slots.
    pub const FEATURE_FIELDS: [Field; 4] =
        [Field::Body, Field::Title, Field::Url, Field::Inlink];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Body => "body",
            Field::Title => "title",
            Field::Url => "url",
            Field::Inlink => "inlink",
            Field::Keywords => "keywords",
        }
    }

    /// Resolve a query-term field suffix (case-insensitive). Returns
    /// `None` for anything that is not a recognized field name.
    pub fn from_suffix(s: &str) -> Option<Field> {
        match s.to_ascii_lowercase().as_str() {
            "body" => Some(Field::Body),
            "title" => Some(Field::Title),
            "url" => Some(Field::Url),
            "inlink" => Some(Field::Inlink),
            "keywords" => Some(Field::Keywords),
            _ => None,
        }
    }

    pub(crate) fn idx(self) -> usize {
        match self {
            Field::Body => 0,
            Field::Title => 1,
            Field::Url => 2,
            Field::Inlink => 3,
            Field::Keywords => 4,
        }
    }
}

/// Per-document metadata held by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub url: String,
    pub spam_score: i64,
}

/// One (document, term frequency) occurrence in an inverted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Postings for one (term, field) pair, ascending by doc id with no
/// duplicate doc ids. `df` is the postings count.
#[derive(Debug, Clone)]
pub struct InvertedList {
    pub term: String,
    pub field: Field,
    pub postings: Vec<Posting>,
}

impl InvertedList {
    pub fn empty(term: &str, field: Field) -> Self {
        InvertedList {
            term: term.to_string(),
            field,
            postings: Vec::new(),
        }
    }

    pub fn df(&self) -> usize {
        self.postings.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVectorEntry {
    pub stem: String,
    pub tf: u32,
    pub df: u32,
}

/// Ordered stem list of one document field. Entry 0 is a reserved
/// sentinel; scans start at position 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermVector {
    pub entries: Vec<TermVectorEntry>,
}

impl TermVector {
    /// Wrap raw entries, inserting the position-0 sentinel.
    pub fn with_sentinel(mut entries: Vec<TermVectorEntry>) -> Self {
        entries.insert(
            0,
            TermVectorEntry {
                stem: String::new(),
                tf: 0,
                df: 0,
            },
        );
        TermVector { entries }
    }

    /// Entries excluding the position-0 sentinel.
    pub fn stems(&self) -> &[TermVectorEntry] {
        &self.entries[1..]
    }
}

/// Read-only document/term statistics provider. Everything that needs
/// index statistics takes one of these explicitly; there is no global
/// index handle.
pub trait IndexStore {
    fn num_docs(&self) -> u32;

    /// Number of documents that have the given field.
    fn doc_count(&self, field: Field) -> u32;

    /// Total term occurrences across the collection for a field.
    fn sum_total_term_freq(&self, field: Field) -> u64;

    fn doc_length(&self, field: Field, doc: DocId) -> u64;

    /// Field term vector of a document, if the document has the field.
    fn term_vector(&self, doc: DocId, field: Field) -> Option<&TermVector>;

    /// Collection frequency of a term in a field.
    fn total_term_freq(&self, field: Field, term: &str) -> u64;

    /// Inverted list for a (field, term) pair; empty when unseen.
    fn postings(&self, field: Field, term: &str) -> InvertedList;

    fn internal_id(&self, external_id: &str) -> Option<DocId>;

    fn external_id(&self, doc: DocId) -> Option<&str>;

    fn doc_meta(&self, doc: DocId) -> Option<&DocMeta>;
}
