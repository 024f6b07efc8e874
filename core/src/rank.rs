use anyhow::{bail, Context, Result};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One (external id, score) result row.
#[derive(Debug, Clone, PartialEq)]
pub struct DocScoreEntry {
    pub external_id: String,
    pub score: f64,
}

/// Scored documents for one query with the output total order:
/// score descending, external id ascending on ties.
#[derive(Debug, Default)]
pub struct DocScore {
    pub entries: Vec<DocScoreEntry>,
}

impl DocScore {
    pub fn add(&mut self, external_id: String, score: f64) {
        self.entries.push(DocScoreEntry { external_id, score });
    }

    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
    }
}

/// Merge the testing feature file with the predicted score file and
/// write final TREC result lines. The two files are aligned strictly
/// by row position; rows are grouped by contiguous runs of the same
/// query id, exactly as they were emitted.
pub fn rerank(
    feature_file: &Path,
    score_file: &Path,
    out: &Path,
    run_tag: &str,
) -> Result<()> {
    let features = read_lines(feature_file)?;
    let score_lines = read_lines(score_file)?;
    if features.len() != score_lines.len() {
        bail!(
            "feature file has {} rows but score file has {}",
            features.len(),
            score_lines.len()
        );
    }

    let f = File::create(out)
        .with_context(|| format!("creating result file {}", out.display()))?;
    let mut writer = BufWriter::new(f);

    let mut current_query = String::new();
    let mut group = DocScore::default();
    for (feature_line, score_line) in features.iter().zip(&score_lines) {
        let (query_id, external_id) = parse_feature_row(feature_line)?;
        let score: f64 = score_line
            .trim()
            .parse()
            .with_context(|| format!("bad predicted score: {score_line}"))?;

        if query_id != current_query {
            write_query_result(&mut writer, &current_query, &mut group, run_tag)?;
            current_query = query_id.to_string();
        }
        group.add(external_id.to_string(), score);
    }
    write_query_result(&mut writer, &current_query, &mut group, run_tag)?;
    writer.flush()?;
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut lines = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Recover the query id (from the `qid:` token) and external id (from
/// the trailing `#` comment) of one feature row.
fn parse_feature_row(line: &str) -> Result<(&str, &str)> {
    let qid_token = line
        .split_whitespace()
        .nth(1)
        .with_context(|| format!("truncated feature line: {line}"))?;
    let query_id = qid_token
        .strip_prefix("qid:")
        .with_context(|| format!("missing qid token in feature line: {line}"))?;
    let hash = line
        .find('#')
        .with_context(|| format!("missing document comment in feature line: {line}"))?;
    Ok((query_id, line[hash + 1..].trim()))
}

fn write_query_result(
    writer: &mut impl Write,
    query_id: &str,
    group: &mut DocScore,
    run_tag: &str,
) -> Result<()> {
    if group.entries.is_empty() {
        return Ok(());
    }
    group.sort();
    for (rank, entry) in group.entries.iter().enumerate() {
        writeln!(
            writer,
            "{} Q0 {} {} {:.6} {}",
            query_id,
            entry.external_id,
            rank + 1,
            entry.score,
            run_tag
        )?;
    }
    group.entries.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_score_then_external_id() {
        let mut ds = DocScore::default();
        ds.add("d2".into(), 0.5);
        ds.add("d1".into(), 0.5);
        ds.add("d3".into(), 0.9);
        ds.sort();
        let order: Vec<&str> = ds.entries.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(order, ["d3", "d1", "d2"]);
        assert_eq!(ds.entries[0].score, 0.9);
    }

    #[test]
    fn feature_row_round_trip() {
        let line = "4 qid:17 1:0.5 2:1 # clueweb09-en0000-00-00001";
        let (qid, ext) = parse_feature_row(line).unwrap();
        assert_eq!(qid, "17");
        assert_eq!(ext, "clueweb09-en0000-00-00001");
    }

    #[test]
    fn rerank_groups_contiguous_query_runs() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("features.txt");
        let scores = dir.path().join("scores.txt");
        let out = dir.path().join("results.txt");
        std::fs::write(
            &features,
            "0 qid:1 1:0 # a\n0 qid:1 1:0 # b\n0 qid:2 1:0 # c\n",
        )
        .unwrap();
        std::fs::write(&scores, "0.25\n0.75\n0.5\n").unwrap();

        rerank(&features, &scores, &out, "run-1").unwrap();
        let got = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            got,
            "1 Q0 b 1 0.750000 run-1\n1 Q0 a 2 0.250000 run-1\n2 Q0 c 1 0.500000 run-1\n"
        );
    }

    #[test]
    fn rerank_rejects_misaligned_files() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("features.txt");
        let scores = dir.path().join("scores.txt");
        std::fs::write(&features, "0 qid:1 1:0 # a\n").unwrap();
        std::fs::write(&scores, "0.1\n0.2\n").unwrap();
        assert!(rerank(&features, &scores, &dir.path().join("out"), "t").is_err());
    }
}
