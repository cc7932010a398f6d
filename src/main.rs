//! Command-line entry points: `train` and `produce`.

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use faultgraph::codec::GraphCodec;
use faultgraph::engine::{Terminal, TraversalEngine};
use faultgraph::graph::Graph;
use faultgraph::interact::{DenyAll, Interaction, StdioInteraction};
use faultgraph::oracle::{CachedOracle, OpenAiOracle};
use faultgraph::telemetry;
use faultgraph::training::TrainingBuilder;

#[derive(Parser)]
#[command(
    name = "faultgraph",
    version,
    about = "Interactive troubleshooting over a trained diagnostic graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest fault-diagnosis chains and grow the graph
    Train {
        /// Graph document to load, or create when missing
        #[arg(long)]
        tree: PathBuf,
        /// Training corpus: segments split by blank lines or `###`
        #[arg(long)]
        segments: PathBuf,
        /// Output path (defaults to overwriting --tree)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run one interactive diagnostic session on stdin/stdout
    Produce {
        /// Graph document to load
        #[arg(long)]
        tree: PathBuf,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    telemetry::init();
    match Cli::parse().command {
        Command::Train {
            tree,
            segments,
            out,
        } => train(tree, segments, out).await,
        Command::Produce { tree } => produce(tree).await,
    }
}

async fn train(tree: PathBuf, segments: PathBuf, out: Option<PathBuf>) -> miette::Result<()> {
    let mut graph = if tree.exists() {
        GraphCodec::load(&tree)?
    } else {
        info!(path = %tree.display(), "no existing graph, starting empty");
        Graph::empty()
    }
    .with_dup_audit(tree.with_extension("dup.jsonl"));

    // Training never asks the user anything: every interactive prompt is
    // answered "no" so all branches get enumerated.
    let oracle = CachedOracle::new(OpenAiOracle::from_env(Arc::new(DenyAll))?);
    let builder = TrainingBuilder::new(Arc::new(oracle));

    let text = std::fs::read_to_string(&segments).into_diagnostic()?;
    let save_to = out.unwrap_or(tree);
    let report = builder.train_corpus(&mut graph, &text, &save_to).await?;

    let features = format!("{}+{}", report.features_created, report.features_reused);
    let problems = format!("{}+{}", report.problems_created, report.problems_reused);
    let solutions = format!("{}+{}", report.solutions_created, report.solutions_reused);
    info!(
        segments = report.segments,
        lines = report.lines,
        features = %features,
        problems = %problems,
        solutions = %solutions,
        out = %save_to.display(),
        "training run complete (created+reused)"
    );
    Ok(())
}

async fn produce(tree: PathBuf) -> miette::Result<()> {
    let graph = Arc::new(GraphCodec::load(&tree)?);
    let interaction: Arc<dyn Interaction> = Arc::new(StdioInteraction);
    let oracle = Arc::new(OpenAiOracle::from_env(Arc::clone(&interaction))?);

    let opening = interaction.ask("Describe the issue you are seeing.").await?;
    let mut engine = TraversalEngine::new(graph, oracle, Arc::clone(&interaction), &opening);

    let mut pending: Option<String> = None;
    loop {
        let input = pending.take();
        let outcome = engine.step(input.as_deref()).await;

        if outcome.done {
            match outcome.terminal {
                Some(Terminal::Success) => println!("Glad that resolved it."),
                Some(Terminal::Failure) => {
                    println!("I couldn't pin this one down. Please escalate to a technician.");
                }
                _ => {}
            }
            break;
        }
        if outcome.awaiting_input {
            let more = interaction
                .ask("I need a bit more detail to decide. What else can you tell me?")
                .await?;
            pending = Some(more);
        }
    }
    Ok(())
}
