mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Params;
use letor_core::features::{
    indri_needed, page_rank_needed, read_judgments, read_page_rank, read_queries,
    FeatureGenerator,
};
use letor_core::memory::{DocInput, MemoryIndex, MemoryIndexBuilder};
use letor_core::persist::{load_index, load_meta, save_index, IndexPaths, INDEX_VERSION};
use letor_core::rank::rerank;
use letor_core::ranker::{Ranker, SvmRank};
use letor_core::{Bm25Params, Field, IndriParams};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    spam_score: i64,
    #[serde(default)]
    body: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    inlink: String,
    #[serde(default)]
    keywords: String,
}

#[derive(Parser)]
#[command(name = "letor")]
#[command(about = "Learning-to-rank re-ranking pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a field-segmented index from JSONL document files
    Index {
        /// Input path (file or directory of .jsonl files)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Run train, predict, and re-rank from a parameter file
    Run {
        /// Parameter file (key=value per line)
        #[arg(long)]
        params: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index { input, output } => build_index(&input, &output),
        Commands::Run { params } => run_pipeline(Path::new(&params)),
    }
}

fn build_index(input: &str, output: &str) -> Result<()> {
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file()
                && matches!(
                    p.extension().and_then(|s| s.to_str()),
                    Some("json") | Some("jsonl")
                )
            {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else {
        files.push(input_path.to_path_buf());
    }
    if files.is_empty() {
        bail!("no input documents found under {input}");
    }

    let mut builder = MemoryIndexBuilder::new();
    let mut num_docs = 0u32;
    for file in files {
        let f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
        for line in BufReader::new(f).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: InputDoc = serde_json::from_str(&line)
                .with_context(|| format!("bad document line in {}", file.display()))?;
            builder.add_document(to_doc_input(doc));
            num_docs += 1;
        }
    }
    tracing::info!(num_docs, "ingested documents");

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default();
    save_index(&IndexPaths::new(output), &builder.build(), &created_at)?;
    tracing::info!(output, "index written");
    Ok(())
}

fn to_doc_input(doc: InputDoc) -> DocInput {
    // The raw URL doubles as the url field's text.
    let fields = vec![
        (Field::Body, doc.body),
        (Field::Title, doc.title),
        (Field::Url, doc.url.clone()),
        (Field::Inlink, doc.inlink),
        (Field::Keywords, doc.keywords),
    ];
    DocInput {
        external_id: doc.id,
        url: doc.url,
        spam_score: doc.spam_score,
        fields,
    }
}

/// Open an index directory, refusing a meta version this build does
/// not understand.
fn open_index(paths: &IndexPaths) -> Result<MemoryIndex> {
    let meta = load_meta(paths)?;
    if meta.version != INDEX_VERSION {
        bail!(
            "index at {} has version {}, expected {INDEX_VERSION}",
            paths.root.display(),
            meta.version
        );
    }
    tracing::info!(num_docs = meta.num_docs, created_at = %meta.created_at, "index opened");
    load_index(paths)
}

/// Indri parameters are read only when the model is consulted; a run
/// that disables the whole Indri column group may omit them.
fn indri_params(params: &Params, disabled: &HashSet<usize>) -> Result<Option<IndriParams>> {
    if !indri_needed(disabled) {
        return Ok(None);
    }
    Ok(Some(IndriParams {
        mu: params.get_f64("Indri:mu")?,
        lambda: params.get_f64("Indri:lambda")?,
    }))
}

fn run_pipeline(param_path: &Path) -> Result<()> {
    let start = Instant::now();
    let params = Params::from_file(param_path)?;

    let algorithm = params.get("retrievalAlgorithm")?;
    if !algorithm.eq_ignore_ascii_case("BM25") {
        bail!("unsupported retrieval algorithm for the initial ranking: {algorithm}");
    }

    let index = open_index(&IndexPaths::new(params.get("indexPath")?))?;

    let bm25 = Bm25Params {
        b: params.get_f64("BM25:b")?,
        k1: params.get_f64("BM25:k_1")?,
        k3: params.get_f64("BM25:k_3")?,
    };
    let disabled = params.disabled_slots()?;
    let indri = indri_params(&params, &disabled)?;
    let page_rank = if page_rank_needed(&disabled) {
        read_page_rank(Path::new(params.get("letor:pageRankFile")?))?
    } else {
        HashMap::new()
    };

    let generator = FeatureGenerator::new(&index, Some(bm25), indri, &disabled, page_rank);

    // Training features from judged documents.
    let train_queries = read_queries(Path::new(params.get("letor:trainingQueryFile")?))?;
    let judgments = read_judgments(Path::new(params.get("letor:trainingQrelsFile")?))?;
    let train_features = PathBuf::from(params.get("letor:trainingFeatureVectorsFile")?);
    generator.generate_training_file(&train_queries, &judgments, &train_features)?;

    let ranker = SvmRank {
        learn_path: PathBuf::from(params.get("letor:svmRankLearnPath")?),
        classify_path: PathBuf::from(params.get("letor:svmRankClassifyPath")?),
        param_c: params.get("letor:svmRankParamC")?.to_string(),
    };
    let model_file = PathBuf::from(params.get("letor:svmRankModelFile")?);
    ranker.train(&train_features, &model_file)?;
    tracing::info!(model = %model_file.display(), "ranker trained");

    // Testing features for the top of the initial BM25 ranking. The
    // trained model is a hard dependency of this stage; the two
    // phases never overlap.
    let test_queries = read_queries(Path::new(params.get("queryFilePath")?))?;
    let test_features = PathBuf::from(params.get("letor:testingFeatureVectorsFile")?);
    generator.generate_testing_file(&test_queries, bm25, &test_features)?;

    let score_file = PathBuf::from(params.get("letor:testingDocumentScores")?);
    ranker.predict(&test_features, &model_file, &score_file)?;

    let run_tag = params.get_opt("trecEvalRunTag").unwrap_or("letor");
    rerank(
        &test_features,
        &score_file,
        Path::new(params.get("trecEvalOutputPath")?),
        run_tag,
    )?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pipeline complete"
    );
    Ok(())
}
