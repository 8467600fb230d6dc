use std::{
    fs,
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use log::{error, info, warn};
use nlink_solver::config::Config;
use nlink_solver::format::{read_problem, write_solution};
use nlink_solver::graph::{Format, Graph};
use nlink_solver::pipeline::{self, InterrupterContainer, PipelineOutcome, PlanEvent};
use rustsat::solvers::InterruptSolver;

/// Solves a NumberLink-style routing problem with a SAT backend and writes
/// the resulting grid.
#[derive(Parser)]
struct Cli {
    /// Problem file in the SIZE/LINE_NUM/LINE#/VIA# text format.
    input: PathBuf,

    /// Where to write the solved grid. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file supplying defaults for flags left unset on the command
    /// line (var_limit, binary_encoding, format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abandon an encoding plan that would need more than this many SAT
    /// variables, instead of handing it to the solver.
    #[arg(short = 'l', long)]
    var_limit: Option<u32>,

    /// Use binary (one-hot log-width) encoding instead of unary where the
    /// encoder offers a choice.
    #[arg(short, long)]
    binary_encoding: bool,

    /// Force a problem family instead of guessing it from the input's shape.
    #[arg(short, long)]
    format: Option<FormatArg>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Adc2015,
    Adc2016,
    Adc2017,
}

impl From<FormatArg> for Format {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Adc2015 => Format::Adc2015,
            FormatArg::Adc2016 => Format::Adc2016,
            FormatArg::Adc2017 => Format::Adc2017,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));

    let interrupter: InterrupterContainer = Arc::new(Mutex::new(None));

    if let Err(err) = ctrlc::set_handler({
        let interrupter = interrupter.clone();
        let mut is_repeat = false;
        move || {
            if is_repeat {
                warn!("Aborting immediately");
                std::process::exit(-1);
            }

            is_repeat = true;
            warn!("Stopping...");
            if let Some(int) = &*interrupter.lock().expect("mutex poisoned") {
                int.interrupt();
            }
        }
    }) {
        warn!("Failed to set interrupt handler! {}", err);
    }

    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("failed to read {}", path.display()))?,
        None => Config::default(),
    };
    let var_limit = args.var_limit.or(config.var_limit);
    let binary_encoding = args.binary_encoding || config.binary_encoding.unwrap_or(false);
    let format_override = args.format.map(Format::from).or(config.format.map(Format::from));

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let problem = match read_problem(&text) {
        Ok(problem) => problem,
        Err(errors) => {
            for err in &errors {
                eprintln!("{}: {err}", args.input.display());
            }
            error!("failed to parse {} ({} error(s))", args.input.display(), errors.len());
            return Ok(ExitCode::FAILURE);
        }
    };

    let graph = Graph::build(&problem, format_override);
    info!(
        target: "nlink_solver::main",
        "loaded {}x{}x{} problem, {} net(s), format {:?}",
        graph.dimension.width, graph.dimension.height, graph.dimension.depth,
        graph.terminal_pairs.len(), graph.format
    );

    let outcome = if args.verbose > 0 {
        run_verbose(&graph, binary_encoding, var_limit, interrupter)?
    } else {
        pipeline::run(&graph, binary_encoding, var_limit, interrupter).context("solver pipeline failed")?
    };

    match outcome {
        PipelineOutcome::Sat(result) => {
            info!(
                target: "nlink_solver::main",
                "solved with plan {}: length {} bends {} ({} reroute pass(es))",
                result.plan_name, result.reroute_stats.total_length,
                result.reroute_stats.total_bends, result.reroute_stats.passes
            );
            let text = write_solution(graph.dimension, &result.routes);
            match args.output {
                Some(path) => {
                    fs::write(&path, text)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                None => print!("{text}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        PipelineOutcome::Abort(reason) => {
            use nlink_solver::pipeline::AbortReason;
            match reason {
                AbortReason::Unsat => eprintln!("no plan produced a satisfiable encoding"),
                AbortReason::Interrupted => eprintln!("interrupted"),
                AbortReason::VarLimitExceeded => {
                    eprintln!("every candidate plan exceeded the variable limit")
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Drives [`pipeline::run_stream`] to completion on a throwaway runtime,
/// printing each plan's progress to stderr as it arrives.
fn run_verbose(
    graph: &Graph,
    binary_encoding: bool,
    var_limit: Option<u32>,
    interrupter: InterrupterContainer,
) -> anyhow::Result<PipelineOutcome> {
    let rt = tokio::runtime::Builder::new_current_thread().build().context("failed to start the runtime")?;
    rt.block_on(async {
        let stream = pipeline::run_stream(graph, binary_encoding, var_limit, interrupter);
        tokio::pin!(stream);
        while let Some(event) = stream.next().await {
            match event {
                PlanEvent::Trying { plan_name } => eprintln!("trying plan {plan_name}..."),
                PlanEvent::VarLimitSkip { plan_name, used, limit } => {
                    eprintln!("plan {plan_name} would use {used} variables, over the limit of {limit}; skipping")
                }
                PlanEvent::Unsat { plan_name } => eprintln!("plan {plan_name} unsatisfiable"),
                PlanEvent::Done(result) => return result.context("solver pipeline failed"),
            }
        }
        unreachable!("run_stream always ends with PlanEvent::Done")
    })
}
