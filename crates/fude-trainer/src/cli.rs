//! Command-line interface for the `fude` binary.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fude_core::{HmmEngine, Writing};
use fude_core::config::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_SAMPLING_RATE, DEFAULT_STATES_PER_STROKE, DEFAULT_TOLERANCE,
    DEFAULT_TOP_K, ModelConfig,
};
use tracing::{Level, info};

use crate::config::{DEFAULT_ROOT, PipelineConfig};
use crate::pad::WritingPad;
use crate::pipeline::{BatchReport, Pipeline};
use crate::source::{JsonlStrokeSource, parse_lines};

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "fude")]
#[command(about = "Build, train and evaluate per-character HMM handwriting models")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the feature and model stores
    #[arg(short, long, env = "FUDE_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Fraction of pen points kept during feature extraction
    #[arg(short, long, env = "FUDE_SAMPLING_RATE", default_value_t = DEFAULT_SAMPLING_RATE)]
    pub sampling_rate: f64,

    /// HMM states per stroke of a character's reference sample
    #[arg(long, env = "FUDE_STATES_PER_STROKE", default_value_t = DEFAULT_STATES_PER_STROKE)]
    pub states_per_stroke: usize,

    /// Maximum Baum-Welch iterations
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Baum-Welch convergence threshold on log-likelihood gain
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Number of ranked candidates to report
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long, env = "FUDE_WORKERS")]
    pub workers: Option<usize>,

    /// Debug logging and per-sample evaluation report
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract feature sequences from labeled stroke files
    Fextract {
        /// JSONL stroke file for the training partition
        #[arg(long)]
        train: PathBuf,
        /// JSONL stroke file for the evaluation partition
        #[arg(long)]
        eval: PathBuf,
    },
    /// Build initial models from training features
    Init,
    /// Refine initial models with Baum-Welch
    Train,
    /// Rank evaluation samples and report match@1/5/10
    Eval,
    /// Recognize writings read as JSON lines from a file or stdin
    Recognize {
        /// Input file; reads stdin when omitted
        input: Option<PathBuf>,
    },
}

impl Cli {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let model = ModelConfig::new()
            .with_sampling_rate(self.sampling_rate)
            .with_states_per_stroke(self.states_per_stroke)
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance)
            .with_top_k(self.top_k);
        PipelineConfig::new(&self.root)
            .with_model(model)
            .with_workers(self.workers)
    }
}

fn finish(stage: &str, report: &BatchReport) -> bool {
    info!(stage, "{report}");
    if report.has_failures() {
        eprintln!("{stage}: {report}");
    }
    !report.has_failures()
}

/// Recognizes JSON-line writings from `reader`, writing one result line per
/// writing to `out`. Returns `false` if any line was malformed or could not
/// be ranked.
pub fn recognize_stream<E, R, W>(pad: &WritingPad<E>, reader: R, out: &mut W) -> anyhow::Result<bool>
where
    E: HmmEngine,
    R: BufRead,
    W: Write,
{
    let mut malformed = 0usize;
    let writings = parse_lines::<Writing, _>(reader).filter_map(|w| match w {
        Ok(w) => Some(w),
        Err(e) => {
            eprintln!("skipping input: {e:#}");
            malformed += 1;
            None
        }
    });

    let mut failed = 0usize;
    let mut write_err = None;
    pad.run(writings, |_, result| {
        let line = match result {
            Ok(matches) => matches.join(" "),
            Err(e) => {
                failed += 1;
                format!("error: {e}")
            }
        };
        if let Err(e) = writeln!(out, "{line}") {
            write_err.get_or_insert(e);
        }
    });

    if let Some(e) = write_err {
        return Err(e).context("failed to write recognition result");
    }
    Ok(malformed == 0 && failed == 0)
}

/// Runs the parsed command. Returns `false` if any character failed.
pub fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = cli.pipeline_config();

    match cli.command {
        Commands::Fextract { ref train, ref eval } => {
            let pipeline = Pipeline::new(config)?;
            let source = JsonlStrokeSource::new(train, eval);
            let report = pipeline.extract_features(&source)?;
            Ok(finish("fextract", &report))
        }
        Commands::Init => {
            let report = Pipeline::new(config)?.build_initial_models()?;
            Ok(finish("init", &report))
        }
        Commands::Train => {
            let report = Pipeline::new(config)?.train()?;
            Ok(finish("train", &report))
        }
        Commands::Eval => {
            let run = Pipeline::new(config)?.evaluate()?;
            print!("{}", run.report.summary());
            if cli.verbose {
                print!("{}", run.report.verbose_report());
            }
            Ok(finish("eval", &run.batch))
        }
        Commands::Recognize { ref input } => {
            let pad = WritingPad::open(&config)?;
            let reader: Box<dyn BufRead> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
                )),
                None => Box::new(std::io::stdin().lock()),
            };

            recognize_stream(&pad, reader, &mut std::io::stdout().lock())
        }
    }
}

/// Entry point for the binary.
pub fn main_entry() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("fude: {e:#}");
            std::process::exit(1);
        }
    }
}
