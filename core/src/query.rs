use crate::index::Field;
use crate::model::RetrievalModel;
use crate::tokenizer::tokenize;
use anyhow::{bail, Result};

/// Query operator tree node. The result category of a node is fixed
/// by construction: `Term` produces an inverted list, `Score` and
/// `Sum` produce score lists.
#[derive(Debug, Clone, PartialEq)]
pub enum Qryop {
    /// Leaf term operator over one field.
    Term { term: String, field: Field },
    /// Bridge from an inverted-list child to a score list, weighting
    /// each posting with the active model's per-term formula.
    Score(Box<Qryop>),
    /// N-ary sum over score-list children.
    Sum(Vec<Qryop>),
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
}

fn lex(query: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in query.chars() {
        match c {
            '(' | ')' | ',' | ' ' | '\t' | '\n' | '\r' => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                match c {
                    '(' => tokens.push(Token::Open),
                    ')' => tokens.push(Token::Close),
                    _ => {}
                }
            }
            _ => word.push(c),
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

/// Parse a raw query under the active retrieval model. The model's
/// default combinator wraps the whole query; a model without one is
/// unsupported for structured evaluation.
pub fn parse_query(raw: &str, model: &RetrievalModel) -> Result<Qryop> {
    let wrapped = match model {
        RetrievalModel::Bm25(_) => format!("#SUM({})", raw.trim()),
        RetrievalModel::Indri(_) => bail!(
            "retrieval model {} defines no default query combinator",
            model.name()
        ),
    };

    let tokens = lex(&wrapped);
    let mut pos = 0;
    let op = parse_operator(&tokens, &mut pos)?;
    if pos < tokens.len() {
        bail!("malformed query, tokens remain after the top-level operator: {raw}");
    }
    Ok(op)
}

fn parse_operator(tokens: &[Token], pos: &mut usize) -> Result<Qryop> {
    let keyword = match tokens.get(*pos) {
        Some(Token::Word(w)) if w.starts_with('#') => w.clone(),
        other => bail!("expected a query operator, found {other:?}"),
    };
    *pos += 1;
    if !keyword.eq_ignore_ascii_case("#sum") {
        bail!("unknown query operator {keyword}");
    }
    match tokens.get(*pos) {
        Some(Token::Open) => *pos += 1,
        _ => bail!("expected ( after {keyword}"),
    }

    let mut args = Vec::new();
    loop {
        match tokens.get(*pos) {
            None => bail!("unbalanced parentheses in query"),
            Some(Token::Close) => {
                *pos += 1;
                break;
            }
            Some(Token::Open) => bail!("unexpected ( in query"),
            Some(Token::Word(w)) if w.starts_with('#') => {
                args.push(parse_operator(tokens, pos)?);
            }
            Some(Token::Word(w)) => {
                if let Some(leaf) = parse_term(w)? {
                    args.push(bridge(leaf));
                }
                *pos += 1;
            }
        }
    }

    // An operator that closes without arguments is a syntax error
    // rather than a silent prune; the pruned subtree would otherwise
    // disappear from the query without a trace.
    if args.is_empty() {
        bail!("query operator {keyword} has no arguments");
    }
    Ok(Qryop::Sum(args))
}

/// Turn one word token into a term leaf. A `term.field` suffix selects
/// the field when recognized; otherwise the dot stays part of the
/// term and the field defaults to body. Normalization may drop the
/// term entirely (stopword) or reject it (multiple stems).
fn parse_term(word: &str) -> Result<Option<Qryop>> {
    let parts: Vec<&str> = word.split('.').collect();
    let (term, field) = if parts.len() == 2 {
        match Field::from_suffix(parts[1]) {
            Some(f) => (parts[0], f),
            None => (word, Field::Body),
        }
    } else {
        (word, Field::Body)
    };

    let stems = tokenize(term);
    match stems.len() {
        0 => Ok(None),
        1 => Ok(Some(Qryop::Term {
            term: stems.into_iter().next().unwrap(),
            field,
        })),
        _ => bail!("query term {word} normalizes to more than one stem"),
    }
}

/// Score-list combinators take score-list arguments; leaf terms get a
/// SCORE bridge inserted over them.
fn bridge(op: Qryop) -> Qryop {
    match op {
        t @ Qryop::Term { .. } => Qryop::Score(Box::new(t)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bm25Params, IndriParams};

    fn bm25() -> RetrievalModel {
        RetrievalModel::Bm25(Bm25Params {
            b: 0.75,
            k1: 1.2,
            k3: 0.0,
        })
    }

    fn term(t: &str, f: Field) -> Qryop {
        Qryop::Score(Box::new(Qryop::Term {
            term: t.into(),
            field: f,
        }))
    }

    #[test]
    fn wraps_bag_of_words_in_sum_of_scored_terms() {
        let op = parse_query("obama family tree", &bm25()).unwrap();
        assert_eq!(
            op,
            Qryop::Sum(vec![
                term("obama", Field::Body),
                term("famili", Field::Body),
                term("tree", Field::Body),
            ])
        );
    }

    #[test]
    fn recognized_field_suffix_selects_field() {
        let op = parse_query("apple.title", &bm25()).unwrap();
        assert_eq!(op, Qryop::Sum(vec![term("appl", Field::Title)]));
    }

    #[test]
    fn unrecognized_suffix_folds_into_term() {
        // "apple.the": "the" is not a field, so the whole token is the
        // term; normalization then drops the stopword half.
        let op = parse_query("apple.the pie", &bm25()).unwrap();
        assert_eq!(
            op,
            Qryop::Sum(vec![term("appl", Field::Body), term("pie", Field::Body)])
        );
    }

    #[test]
    fn multi_stem_term_is_rejected() {
        assert!(parse_query("apple.color", &bm25()).is_err());
    }

    #[test]
    fn nested_sum() {
        let op = parse_query("cat #SUM(dog bird)", &bm25()).unwrap();
        assert_eq!(
            op,
            Qryop::Sum(vec![
                term("cat", Field::Body),
                Qryop::Sum(vec![term("dog", Field::Body), term("bird", Field::Body)]),
            ])
        );
    }

    #[test]
    fn empty_operator_is_an_error() {
        assert!(parse_query("", &bm25()).is_err());
        assert!(parse_query("the of", &bm25()).is_err());
        assert!(parse_query("apple #SUM(the)", &bm25()).is_err());
    }

    #[test]
    fn trailing_tokens_are_an_error() {
        assert!(parse_query("apple) banana", &bm25()).is_err());
    }

    #[test]
    fn unknown_operator_is_an_error() {
        assert!(parse_query("#NEAR(a b)", &bm25()).is_err());
    }

    #[test]
    fn indri_has_no_default_combinator() {
        let indri = RetrievalModel::Indri(IndriParams {
            mu: 2500.0,
            lambda: 0.4,
        });
        assert!(parse_query("apple", &indri).is_err());
    }
}
