use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// External rank-learning collaborator: file-in/file-out train and
/// predict. Injectable so the pipeline runs in tests without the real
/// executables.
pub trait Ranker {
    /// Train a model from a labeled feature file.
    fn train(&self, feature_file: &Path, model_file: &Path) -> Result<()>;

    /// Score a feature file with a trained model, one float per row.
    fn predict(&self, feature_file: &Path, model_file: &Path, score_file: &Path) -> Result<()>;
}

/// SVM-rank driver invoking the `svm_rank_learn` / `svm_rank_classify`
/// executables.
pub struct SvmRank {
    pub learn_path: PathBuf,
    pub classify_path: PathBuf,
    pub param_c: String,
}

impl SvmRank {
    fn run(&self, mut cmd: Command, what: &str) -> Result<()> {
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {what}"))?;

        // Both streams must be drained while waiting, or a chatty
        // tool fills the pipe buffer and the wait deadlocks.
        let stdout = child.stdout.take().context("child stdout is piped")?;
        let stderr = child.stderr.take().context("child stderr is piped")?;
        let out_thread = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                tracing::info!(target: "svm_rank", "{line}");
            }
        });
        let err_thread = thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                tracing::warn!(target: "svm_rank", "{line}");
            }
        });

        let status = child.wait().with_context(|| format!("waiting for {what}"))?;
        let _ = out_thread.join();
        let _ = err_thread.join();

        if !status.success() {
            bail!("{what} failed with {status}");
        }
        Ok(())
    }
}

impl Ranker for SvmRank {
    fn train(&self, feature_file: &Path, model_file: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.learn_path);
        cmd.arg("-c")
            .arg(&self.param_c)
            .arg(feature_file)
            .arg(model_file);
        self.run(cmd, "svm_rank_learn")
    }

    fn predict(&self, feature_file: &Path, model_file: &Path, score_file: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.classify_path);
        cmd.arg(feature_file).arg(model_file).arg(score_file);
        self.run(cmd, "svm_rank_classify")
    }
}

/// In-process test double: predict echoes each feature row's label
/// column back as its score, so pipeline plumbing can be exercised
/// end to end without the external binaries.
pub struct LabelEchoRanker;

impl Ranker for LabelEchoRanker {
    fn train(&self, _feature_file: &Path, model_file: &Path) -> Result<()> {
        std::fs::write(model_file, "label-echo\n")
            .with_context(|| format!("writing model file {}", model_file.display()))?;
        Ok(())
    }

    fn predict(&self, feature_file: &Path, _model_file: &Path, score_file: &Path) -> Result<()> {
        let f = File::open(feature_file)
            .with_context(|| format!("opening feature file {}", feature_file.display()))?;
        let out = File::create(score_file)
            .with_context(|| format!("creating score file {}", score_file.display()))?;
        let mut writer = BufWriter::new(out);
        for line in BufReader::new(f).lines() {
            let line = line?;
            let label: f64 = line
                .split_whitespace()
                .next()
                .with_context(|| format!("empty feature line: {line}"))?
                .parse()
                .with_context(|| format!("bad label in feature line: {line}"))?;
            writeln!(writer, "{label}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_ranker_round_trips_labels() {
        let dir = tempfile::tempdir().unwrap();
        let features = dir.path().join("features.txt");
        let model = dir.path().join("model.txt");
        let scores = dir.path().join("scores.txt");
        std::fs::write(&features, "4 qid:1 1:0 # a\n2 qid:1 1:1 # b\n").unwrap();

        let ranker = LabelEchoRanker;
        ranker.train(&features, &model).unwrap();
        ranker.predict(&features, &model, &scores).unwrap();

        let got = std::fs::read_to_string(&scores).unwrap();
        assert_eq!(got, "4\n2\n");
    }
}
