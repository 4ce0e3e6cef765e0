// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use simq::prelude::*;
use simq::report::logger::DistributionLogger;
use simq::report::{SimulationResult, render_text};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::ControlFlow;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Progress bar refresh interval, in events.
const PROGRESS_EVERY: u64 = 1_000;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a problem described in a JSON file.
    Run {
        problem: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },

    /// Simulate an M/M/S/Q system.
    Example {
        #[arg(short, long, default_value_t = 1.0)]
        lambda: f64,
        #[arg(short, long, default_value_t = 2.0)]
        mu: f64,
        /// Number of servers; unlimited when omitted.
        #[arg(short = 'S', long)]
        servers: Option<u32>,
        /// Waiting room size; unbounded when omitted, 0 for none.
        #[arg(short, long)]
        queue: Option<u32>,
        #[command(flatten)]
        limits: Limits,
    },

    List,
}

#[derive(Args)]
struct Limits {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_events: Option<u64>,
    #[arg(long)]
    max_model_time: Option<f64>,
    /// Seconds.
    #[arg(long)]
    max_wall_clock: Option<u64>,
    #[arg(short, long, default_value = "results")]
    output: PathBuf,
    #[arg(long)]
    no_save: bool,
    /// Record every occupancy change of each service block.
    #[arg(long)]
    trace: bool,
}

impl Limits {
    fn apply(&self, config: &mut SimConfig) {
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(events) = self.max_events {
            config.max_event_count = events;
        }
        if let Some(t) = self.max_model_time {
            config.max_model_time = t;
        }
        if let Some(secs) = self.max_wall_clock {
            config.max_wall_clock = Duration::from_secs(secs);
        }
        if self.trace {
            config.trace_service_blocks = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { problem, limits } => {
            info!("Loading problem from: {}", problem.display());
            let content = fs::read_to_string(&problem)?;
            let mut spec: ProblemSpec = serde_json::from_str(&content)?;
            limits.apply(&mut spec.config);
            run_problem(spec, &limits).await?;
        }

        Commands::Example {
            lambda,
            mu,
            servers,
            queue,
            limits,
        } => {
            if lambda <= 0.0 || mu <= 0.0 {
                anyhow::bail!("Rates must be positive (lambda={}, mu={})", lambda, mu);
            }
            let mut config = SimConfig::default();
            limits.apply(&mut config);
            let spec = ProblemSpec::queueing_system(lambda, mu, servers, queue, config);
            run_problem(spec, &limits).await?;
        }

        Commands::List => {
            println!("\nAgent types");
            for name in AgentRegistry::global().list() {
                println!("  - {}", name);
            }

            println!("\nDistributions");
            for name in DistributionRegistry::global().list() {
                println!("  - {}", name);
            }

            println!("\nUsage: simq run <problem.json>");
            println!("Example: simq example --lambda 1 --mu 2 --servers 1 --queue 0\n");
        }
    }

    info!("Total runtime: {:.2}s", program_start.elapsed().as_secs_f64());

    Ok(())
}

async fn run_problem(spec: ProblemSpec, limits: &Limits) -> Result<()> {
    let problem = assemble(&spec)?;
    let max_events = problem.config().max_event_count;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current event");
            on_signal.cancel();
        }
    });

    let pb = ProgressBar::new(max_events);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len} events {msg}")?
            .progress_chars("█▓░"),
    );

    let bar = pb.clone();
    let token = cancel.clone();
    let result = tokio::task::spawn_blocking(move || {
        Simulation::new(problem).run_with(|progress| {
            if progress.event_count % PROGRESS_EVERY == 0 {
                bar.set_position(progress.event_count);
                bar.set_message(format!(
                    "t={:.2} error={:.6}",
                    progress.model_time, progress.generation_error
                ));
            }
            if token.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    })
    .await??;

    pb.finish_with_message(format!("stopped by {}", result.stop_reason));
    cancel.cancel();

    println!("\n{}", render_text(&result));

    if !limits.no_save {
        save_results(&result, &limits.output)?;
    }

    Ok(())
}

// Writes `<name>_<timestamp>.json` and `<name>_<timestamp>.csv` under `dir`.
fn save_results(result: &SimulationResult, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let stem = sanitize(&result.name);

    let json_path = dir.join(format!("{stem}_{timestamp}.json"));
    fs::write(&json_path, serde_json::to_string_pretty(result)?)?;
    info!("Results saved to: {}", json_path.display());

    let csv_path = dir.join(format!("{stem}_{timestamp}.csv"));
    let mut logger = DistributionLogger::new(File::create(&csv_path)?);
    logger.log_all(&result.distributions)?;
    info!("Distributions saved to: {}", csv_path.display());

    Ok((json_path, csv_path))
}

// Problem names like "M=1/M=2/Inf" would otherwise become directories.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
