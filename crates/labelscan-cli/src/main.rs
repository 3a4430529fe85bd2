mod display;
mod ocr;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use labelscan_ai::{BoosterConfig, TrainConfig};
use labelscan_core::{AdditiveEntry, AllergenEntry, Catalog, ImageFile};
use labelscan_host::{Orchestrator, load_matcher, train_and_save};
use labelscan_store::load_corpus;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::ocr::TesseractExtractor;

#[derive(Parser)]
#[command(name = "labelscan")]
#[command(about = "Food label allergen scanner and ingredient text classifier")]
#[command(version)]
struct Cli {
    /// Directory holding the vectorizer and model artifacts
    #[arg(long, global = true, env = "LABELSCAN_ARTIFACTS", default_value = "artifacts")]
    artifacts_dir: PathBuf,

    /// Allergen/additive catalog (JSON); the built-in catalog when omitted
    #[arg(long, global = true, env = "LABELSCAN_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the vectorizer and classifier on a labelled corpus and save them
    Train {
        /// CSV or Parquet file with `text` and `label` columns
        #[arg(long)]
        corpus: PathBuf,
        #[command(flatten)]
        knobs: TrainArgs,
    },
    /// Score the saved artifacts against every row of a corpus
    Evaluate {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Classify label text and list detected allergens and additives
    Classify {
        /// Text to classify (reads stdin when neither --text nor --file is given)
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// OCR a label photo with Tesseract, then classify the text
    Scan {
        image: PathBuf,
        /// Tesseract executable
        #[arg(long, env = "LABELSCAN_TESSERACT", default_value = "tesseract")]
        tesseract: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the active allergen/additive catalog
    Catalog {
        /// Show only the allergen keyword or E-code matching this term
        #[arg(long)]
        lookup: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Seed for the stratified split
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Share of each class held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,
    /// Boosting rounds
    #[arg(long, default_value_t = 100)]
    rounds: usize,
    #[arg(long, default_value_t = 0.3)]
    learning_rate: f64,
    #[arg(long, default_value_t = 6)]
    max_depth: usize,
}

impl TrainArgs {
    fn config(&self) -> TrainConfig {
        TrainConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
            booster: BoosterConfig {
                n_rounds: self.rounds,
                learning_rate: self.learning_rate,
                max_depth: self.max_depth,
                ..BoosterConfig::default()
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("labelscan v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train { corpus, knobs } => cmd_train(&cli.artifacts_dir, &corpus, &knobs),
        Commands::Evaluate { corpus, json } => {
            let orch = open(&cli.artifacts_dir, cli.catalog.as_deref())?;
            let corpus = load_corpus(&corpus)
                .with_context(|| format!("loading corpus {}", corpus.display()))?;
            let report = orch.evaluate(&corpus)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report);
            }
            Ok(())
        }
        Commands::Classify { text, file, json } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => {
                    std::io::read_to_string(std::io::stdin()).context("reading stdin")?
                }
            };
            let orch = open(&cli.artifacts_dir, cli.catalog.as_deref())?;
            let result = orch.classify(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                display::print_classification(&result);
            }
            Ok(())
        }
        Commands::Scan {
            image,
            tesseract,
            json,
        } => {
            let orch = open(&cli.artifacts_dir, cli.catalog.as_deref())?;
            let extractor = TesseractExtractor::new(tesseract);
            let scan = orch
                .scan(&extractor, &ImageFile::new(&image))
                .with_context(|| format!("scanning {}", image.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scan)?);
            } else {
                println!("{}", scan.text.trim());
                println!();
                display::print_classification(&scan.classification);
            }
            Ok(())
        }
        Commands::Catalog { lookup, json } => {
            let matcher = load_matcher(cli.catalog.as_deref())?;
            if let Some(term) = lookup {
                return cmd_lookup(matcher.catalog(), &term, json);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(matcher.catalog())?);
            } else {
                display::print_catalog(matcher.catalog());
            }
            Ok(())
        }
    }
}

fn open(artifacts_dir: &Path, catalog: Option<&Path>) -> Result<Orchestrator> {
    let matcher = load_matcher(catalog).context("loading catalog")?;
    Orchestrator::open(artifacts_dir, matcher).with_context(|| {
        format!(
            "loading artifacts from {} (run `labelscan train` first)",
            artifacts_dir.display()
        )
    })
}

fn cmd_lookup(catalog: &Catalog, term: &str, json: bool) -> Result<()> {
    let Some(hit) = CatalogHit::find(catalog, term) else {
        bail!("{term:?} is neither an allergen keyword nor an additive code in the catalog");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&hit)?);
    } else {
        display::print_hit(hit.allergen, hit.additive);
    }
    Ok(())
}

/// Catalog entries whose key matches a lookup term, ignoring case.
#[derive(Serialize)]
struct CatalogHit<'a> {
    allergen: Option<&'a AllergenEntry>,
    additive: Option<&'a AdditiveEntry>,
}

impl<'a> CatalogHit<'a> {
    fn find(catalog: &'a Catalog, term: &str) -> Option<Self> {
        let term = term.trim();
        let hit = Self {
            allergen: catalog.allergens.get(term),
            additive: catalog.additives.get(term),
        };
        (hit.allergen.is_some() || hit.additive.is_some()).then_some(hit)
    }
}

fn cmd_train(artifacts_dir: &Path, corpus_path: &Path, knobs: &TrainArgs) -> Result<()> {
    let corpus = load_corpus(corpus_path)
        .with_context(|| format!("loading corpus {}", corpus_path.display()))?;
    let outcome = train_and_save(&corpus, knobs.config(), artifacts_dir).context("training")?;

    println!("=== Training run {} ===", &outcome.pair.run_id[..12]);
    println!("  {:<26} {}", "samples", corpus.len());
    println!("  {:<26} {}", "train", outcome.train_size);
    println!("  {:<26} {}", "held out", outcome.held_out_size);
    println!("  {:<26} {}", "split seed", outcome.pair.training.seed);
    println!("  {:<26} {}", "vocabulary", outcome.pair.vectorizer.dim());
    println!(
        "  {:<26} {}",
        "classes",
        outcome.pair.model.classes().join(", ")
    );
    println!("  {:<26} {}", "artifacts", artifacts_dir.display());
    println!();
    match &outcome.report {
        Some(report) => display::print_report(report),
        None => println!("Held-out split is empty; no evaluation."),
    }
    Ok(())
}
