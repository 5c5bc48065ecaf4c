//! VocalX command line
//!
//! Usage:
//!   vx taxonomy                          - List the sound taxonomy
//!   vx health                            - Load models and report what is loaded
//!   vx introspect mix.wav                - Score a recording against the taxonomy
//!   vx separate mix.wav -d "lead vocals" - Extract one sound
//!   vx disentangle mix.wav               - Separate everything that is detected

mod wav;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vx_core::{Anchor, Description};
use vx_ml::service::{
    self, DisentangleOutcome, DisentangleRequest, IntrospectRequest, SeparateRequest,
};
use vx_ml::{EngineConfig, EngineContext, MlResult, ScorerConfig, SoundTaxonomy, models};

#[derive(Parser)]
#[command(name = "vx", version, about = "VocalX text-queried source separation")]
struct Cli {
    /// Engine config (YAML or JSON); default model paths when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sound taxonomy in selection order
    Taxonomy,
    /// Load models and print their status as JSON
    Health,
    /// Score a recording against the taxonomy
    Introspect {
        input: PathBuf,
        /// Scores strictly above this are selected
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Best-k fallback when nothing passes
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Extract one described sound
    Separate {
        input: PathBuf,
        /// Sound to extract
        #[arg(short, long)]
        description: String,
        /// Anchors as JSON, e.g. '[["+",6.3,7.0],["-",0.0,1.0]]'
        #[arg(short, long)]
        anchors: Option<String>,
        #[arg(long)]
        predict_spans: Option<bool>,
        #[arg(long)]
        reranking: Option<u32>,
        /// Output directory
        #[arg(short, long, default_value = "separated")]
        out_dir: PathBuf,
    },
    /// Separate every sound, given or detected, one after another
    Disentangle {
        input: PathBuf,
        /// Sounds to separate in order; introspected when omitted
        #[arg(short, long = "description")]
        descriptions: Vec<String>,
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Best-k fallback when nothing passes
        #[arg(short, long)]
        fallback: Option<usize>,
        #[arg(long)]
        predict_spans: Option<bool>,
        #[arg(long)]
        reranking: Option<u32>,
        /// Output directory
        #[arg(short, long, default_value = "separated")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Taxonomy => print_taxonomy(&config),
        Commands::Health => {
            let context = bootstrap(&config)?;
            println!("{}", serde_json::to_string_pretty(&context.health())?);
            Ok(())
        }
        Commands::Introspect {
            input,
            threshold,
            top_k,
        } => {
            let context = bootstrap(&config)?;
            let request = IntrospectRequest {
                audio: wav::read_wav(&input)?,
                threshold,
                top_k,
            };
            let report = execute(&context, move |ctx| service::introspect(ctx, request))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Separate {
            input,
            description,
            anchors,
            predict_spans,
            reranking,
            out_dir,
        } => {
            let anchors = match anchors {
                Some(json) => Anchor::parse_list(&json).context("parsing --anchors")?,
                None => None,
            };
            let context = bootstrap(&config)?;
            let request = SeparateRequest {
                audio: wav::read_wav(&input)?,
                description: Description::new(&description),
                anchors,
                predict_spans,
                reranking_candidates: reranking,
            };
            let report = execute(&context, move |ctx| service::separate(ctx, request))?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            let target = out_dir.join(format!("{}.wav", report.description.slug()));
            wav::write_wav(&target, &report.target)?;
            wav::write_wav(out_dir.join("residual.wav"), &report.residual)?;
            println!("{}", target.display());
            Ok(())
        }
        Commands::Disentangle {
            input,
            descriptions,
            threshold,
            fallback,
            predict_spans,
            reranking,
            out_dir,
        } => {
            let context = bootstrap(&config)?;
            let request = DisentangleRequest {
                audio: wav::read_wav(&input)?,
                descriptions: (!descriptions.is_empty())
                    .then(|| descriptions.into_iter().map(Description::from).collect()),
                threshold,
                top_k_fallback: fallback,
                predict_spans,
                reranking_candidates: reranking,
            };

            match execute(&context, move |ctx| service::disentangle(ctx, request))? {
                DisentangleOutcome::Separated(result) => {
                    std::fs::create_dir_all(&out_dir)
                        .with_context(|| format!("creating {}", out_dir.display()))?;
                    for track in &result.tracks {
                        let path = out_dir.join(format!(
                            "{:02}-{}.wav",
                            track.iteration,
                            track.description.slug()
                        ));
                        wav::write_wav(&path, &track.audio)?;
                        println!("{}", path.display());
                    }
                    wav::write_wav(out_dir.join("residual.wav"), &result.residual)?;
                    if let Some(scores) = &result.scores {
                        let path = out_dir.join("scores.json");
                        std::fs::write(&path, serde_json::to_string_pretty(scores)?)
                            .with_context(|| format!("writing {}", path.display()))?;
                    }
                    Ok(())
                }
                DisentangleOutcome::NothingDetected { scores } => {
                    println!("No sounds detected");
                    for entry in scores.ranked().into_iter().take(5) {
                        println!("  {:>8.4}  {}", entry.score, entry.description);
                    }
                    Ok(())
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Config file, or the default model layout
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(EngineConfig::default()
            .with_separator(models::SEPARATOR, models::SEPARATOR_EMBEDDINGS)
            .with_scorer(ScorerConfig {
                model_path: models::CLAP_AUDIO.into(),
                embeddings_path: models::CLAP_EMBEDDINGS.into(),
                ..Default::default()
            })),
    }
}

fn bootstrap(config: &EngineConfig) -> Result<EngineContext> {
    EngineContext::bootstrap(config).context("loading models")
}

fn print_taxonomy(config: &EngineConfig) -> Result<()> {
    let taxonomy = match &config.taxonomy_path {
        Some(path) => SoundTaxonomy::load(path)
            .with_context(|| format!("loading taxonomy {}", path.display()))?,
        None => SoundTaxonomy::builtin().clone(),
    };

    println!("# {} ({} labels)", taxonomy.version, taxonomy.len());
    for label in taxonomy.iter() {
        println!("{label}");
    }
    Ok(())
}

/// Run a request, under the configured deadline if there is one
fn execute<T, F>(context: &EngineContext, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&EngineContext) -> MlResult<T> + Send + 'static,
{
    let result = match context.config().timeout_secs {
        Some(secs) => {
            let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
            runtime.block_on(service::run_with_timeout(
                context,
                Duration::from_secs(secs),
                job,
            ))
        }
        None => job(context),
    };

    result.map_err(|e| {
        let failure = vx_ml::RequestFailure::from(&e);
        anyhow::Error::new(e).context(format!("request failed ({:?})", failure.class))
    })
}
