use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could","did","do","does","doing","down","during",
            "each","few","for","from","further","had","has","have","having",
            "he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself","me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought",
            "our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these",
            "they","this","those","through","to","too","under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with",
            "would","you","your","yours","yourself","yourselves",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Normalize text into query/document stems: NFKC fold, lowercase,
/// stopword removal, English stemming. The same pipeline is used for
/// query terms and indexed documents so that stems line up.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut stems = Vec::new();
    for mat in RE.find_iter(&normalized) {
        let token = mat.as_str();
        if is_stopword(token) {
            continue;
        }
        stems.push(STEMMER.stem(token).to_string());
    }
    stems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_and_lowercases() {
        let stems = tokenize("Running RUNNERS ran");
        assert!(stems.iter().all(|s| s.starts_with("run") || s == "ran"));
    }

    #[test]
    fn stopword_only_input_yields_nothing() {
        assert!(tokenize("the of and").is_empty());
    }
}
