//! CLI entry point for household propensity scoring.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use propensity_features::{CategoryVocabulary, CsvRowSource, FeatureEncoder, RowSource, read_csv};
use propensity_learning::{
    ModelVariant, OverlapPolicy, Pipeline, PipelineConfig, RankedResult, RunMode, RunOutcome,
    ScoringRequest,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// CLI-compatible model variant enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVariant {
    /// Logistic regression
    Linear,
    /// Feed-forward ReLU network trained with Adam
    Network,
}

impl From<CliVariant> for ModelVariant {
    fn from(cli: CliVariant) -> Self {
        match cli {
            CliVariant::Linear => ModelVariant::Linear,
            CliVariant::Network => ModelVariant::Network,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Household purchase-propensity scoring",
    long_about = "Train a propensity model for one product category and rank households \
                  by their predicted purchase probability.\n\n\
                  EXAMPLES:\n  \
                  # List selectable product categories\n  \
                  propensity categories --feature-store feature_store.csv\n\n  \
                  # Hold-out run with the network model\n  \
                  propensity score --feature-store feature_store.csv --category \"SOFT DRINKS\" \\\n    \
                  --lo 0.1 --hi 0.9 --variant network --seed 42\n\n  \
                  # Score current rows with a model trained on all history\n  \
                  propensity score --feature-store feature_store.csv \\\n    \
                  --features-to-score features_to_score.csv --deployed --category \"SOFT DRINKS\""
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable table
    ///
    /// Disables all logs so stdout only holds JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the product categories that can be scored
    Categories(SourceArgs),

    /// Train a model for one category and rank households by score
    Score(ScoreArgs),

    /// Fit a category vocabulary on a feature store and save it as JSON
    FitVocabulary {
        /// Feature-store CSV to fit on
        #[arg(long)]
        feature_store: PathBuf,

        /// Where to write the vocabulary
        #[arg(short, long, default_value = "vocabulary.json")]
        output: PathBuf,

        /// Pipeline configuration JSON (only the feature settings are used)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Feature-store CSV with labelled history
    #[arg(long)]
    feature_store: PathBuf,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// CSV of current rows to score (deployed mode)
    #[arg(long)]
    features_to_score: Option<PathBuf>,

    /// Product category to score
    #[arg(short, long)]
    category: String,

    /// Lower probability bound
    #[arg(long, default_value = "0.0")]
    lo: f64,

    /// Upper probability bound
    #[arg(long, default_value = "1.0")]
    hi: f64,

    /// Model variant
    #[arg(long, value_enum)]
    variant: Option<CliVariant>,

    /// Train on all history and score the current rows instead of a hold-out split
    #[arg(long)]
    deployed: bool,

    /// Drop current rows that were also training rows
    #[arg(long)]
    exclude_training_rows: bool,

    /// Report each household once, with its highest score
    #[arg(long)]
    dedupe: bool,

    /// Seed for the split and network initialisation
    #[arg(long)]
    seed: Option<u64>,

    /// Network training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Vocabulary JSON to encode with instead of fitting one on the history
    #[arg(long)]
    vocabulary: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    dotenv().ok();

    match &cli.command {
        Command::Categories(args) => run_categories(args, cli.json),
        Command::Score(args) => run_score(args, cli.json),
        Command::FitVocabulary {
            feature_store,
            output,
            config,
        } => run_fit_vocabulary(feature_store, output, config.as_deref(), cli.json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    Ok(())
}

fn run_categories(args: &SourceArgs, json: bool) -> Result<()> {
    require_file(&args.feature_store)?;
    let config = load_config(args.config.as_deref())?;

    let source = CsvRowSource::new(&args.feature_store, config.feature);
    let categories = source.categories()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        for category in &categories {
            println!("{category}");
        }
    }
    Ok(())
}

fn run_score(args: &ScoreArgs, json: bool) -> Result<()> {
    require_file(&args.source.feature_store)?;
    if let Some(path) = &args.features_to_score {
        require_file(path)?;
    }

    let mut config = load_config(args.source.config.as_deref())?;
    if let Some(variant) = args.variant {
        config.variant = variant.into();
    }
    if args.deployed {
        config.mode = RunMode::Deployed;
    }
    if args.exclude_training_rows {
        config.overlap = OverlapPolicy::ExcludeTrainingRows;
    }
    if args.dedupe {
        config.dedupe_households = true;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(epochs) = args.epochs {
        config.network.epochs = epochs;
    }

    if config.mode == RunMode::Deployed && args.features_to_score.is_none() {
        return Err(anyhow!("--deployed requires --features-to-score"));
    }

    let mut source = CsvRowSource::new(&args.source.feature_store, config.feature.clone());
    if let Some(path) = &args.features_to_score {
        source = source.with_features_to_score(path);
    }

    let mut builder = Pipeline::builder()
        .config(config)
        .source(Arc::new(source));
    if let Some(path) = &args.vocabulary {
        require_file(path)?;
        builder = builder.vocabulary(CategoryVocabulary::load(path)?);
    }
    if !json {
        builder = builder.on_progress(|update| {
            if let Some((done, total)) = update.epochs_completed {
                tracing::debug!("[{}/{}] {}", done, total, update.message);
            } else {
                info!(
                    "[{:>3.0}%] {}: {}",
                    update.progress * 100.0,
                    update.stage.as_str(),
                    update.message
                );
            }
        });
    }
    let pipeline = builder.build()?;

    let outcome = pipeline.run(&ScoringRequest::new(&args.category, args.lo, args.hi))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn run_fit_vocabulary(
    feature_store: &Path,
    output: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    require_file(feature_store)?;
    let config = load_config(config)?;

    let data = read_csv(feature_store)?;
    let vocabulary = FeatureEncoder::fit(&config.feature, &data)?.into_vocabulary();
    vocabulary.save(output)?;
    info!("Saved vocabulary to {}", output.display());

    if json {
        println!("{}", serde_json::to_string_pretty(&vocabulary)?);
    } else {
        println!("Vocabulary v{} written to {}", vocabulary.version, output.display());
        for column in vocabulary.columns() {
            if let Some(encoding) = vocabulary.get(column) {
                println!("  {:<24} {} values", column, encoding.len());
            }
        }
    }
    Ok(())
}

/// Print a run outcome as a table on stdout.
fn print_outcome(outcome: &RunOutcome) {
    println!("\n{}", "=".repeat(60));
    println!(
        "{} ({} model, {} rows scored)",
        outcome.category,
        outcome.variant.as_str(),
        outcome.scored_rows
    );
    println!("{}", "=".repeat(60));

    let training = &outcome.training.training_metrics;
    println!(
        "  Training: {} rows, accuracy {:.4}, AUC {}",
        outcome.training.rows,
        training.accuracy,
        format_auc(training.auc)
    );
    if let Some(evaluation) = &outcome.evaluation {
        println!(
            "  Evaluation: {} rows, accuracy {:.4}, AUC {}",
            evaluation.rows,
            evaluation.accuracy,
            format_auc(evaluation.auc)
        );
    }
    println!();

    match &outcome.result {
        RankedResult::Empty => println!("No results"),
        RankedResult::Ranked(entries) => {
            println!("{:<6} {:<16} {:>12}", "Rank", "Household", "Probability");
            println!("{}", "-".repeat(36));
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:<6} {:<16} {:>12.4}",
                    rank + 1,
                    entry.household,
                    entry.probability
                );
            }
        }
    }

    if outcome.training.positive_rate < 0.05 {
        warn!("Very few purchasers in the training rows; scores may be unreliable");
    }
}

fn format_auc(auc: Option<f64>) -> String {
    auc.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}
