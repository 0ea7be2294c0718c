//! The `mzn-driver` command-line tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::LevelFilter;

use crate::results::Solution;
use crate::results::Statistics;
use crate::Driver;
use crate::Instance;
use crate::Model;
use crate::SolveOptions;
use crate::Solver;
use crate::Status;
use crate::Value;

#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// The MiniZinc executable to use. By default it is searched for on the path.
    #[arg(long, global = true)]
    pub minizinc: Option<PathBuf>,

    /// Log what is passed to MiniZinc.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Action,
}

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Action {
    /// Solve a model.
    Solve {
        /// The tag or id of the solver, optionally followed by `@version`.
        #[arg(long, default_value = "gecode")]
        solver: String,

        /// The model (.mzn) and data (.dzn, .json) files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Additional data files.
        #[arg(short = 'd', long = "data")]
        data: Vec<PathBuf>,

        /// Assign a parameter, given as `name=value`.
        ///
        /// The value is read as MiniZinc JSON, as a range `low..high`, or otherwise as a string.
        /// Multiple parameters can be assigned by passing this option multiple times.
        #[arg(short = 'D', long = "param", value_parser = parse_assignment)]
        params: Vec<(String, Value)>,

        /// Report all solutions.
        #[arg(short = 'a', long)]
        all_solutions: bool,

        /// Report intermediate solutions of an optimisation problem.
        #[arg(short = 'i', long)]
        intermediate_solutions: bool,

        /// Stop after this many solutions.
        #[arg(short = 'n')]
        nr_solutions: Option<usize>,

        /// The number of threads the solver may use.
        #[arg(short = 'p')]
        processes: Option<usize>,

        #[arg(short = 'r', long)]
        random_seed: Option<i64>,

        /// Let the solver ignore search annotations.
        #[arg(short = 'f', long)]
        free_search: bool,

        /// The number of milliseconds MiniZinc is allowed to run.
        #[arg(short = 't', long)]
        time_limit: Option<u64>,

        /// Print the statistics after solving.
        #[arg(short = 's', long)]
        statistics: bool,
    },

    /// List the solvers MiniZinc knows about.
    Solvers,

    /// Show the parameters and outputs of a model.
    Interface {
        #[arg(long, default_value = "gecode")]
        solver: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let mut driver = match &args.minizinc {
        Some(path) => Driver::new(path),
        None => Driver::find(None),
    }
    .context("Unable to start MiniZinc")?;

    match args.command {
        Action::Solve {
            solver,
            mut files,
            data,
            params,
            all_solutions,
            intermediate_solutions,
            nr_solutions,
            processes,
            random_seed,
            free_search,
            time_limit,
            statistics,
        } => {
            files.extend(data);
            let solver = Solver::lookup(&solver, &mut driver, false)?;
            let mut instance = Instance::new(Arc::new(driver), solver, load_model(&files)?);
            for (name, value) in params {
                instance.set(name, value);
            }

            let options = SolveOptions {
                all_solutions,
                intermediate_solutions,
                nr_solutions,
                processes,
                random_seed,
                free_search,
                time_limit: time_limit.map(Duration::from_millis),
                ..Default::default()
            };

            solve(&instance, &options, statistics)
        }
        Action::Solvers => list_solvers(&mut driver),
        Action::Interface { solver, files } => {
            let solver = Solver::lookup(&solver, &mut driver, false)?;
            let instance = Instance::new(Arc::new(driver), solver, load_model(&files)?);
            let interface = instance.interface()?;

            println!("method: {:?}", interface.method);
            for (name, declared) in &interface.input {
                println!("input {name}: {declared}");
            }
            for (name, declared) in &interface.output {
                println!("output {name}: {declared}");
            }

            Ok(())
        }
    }
}

fn load_model(files: &[PathBuf]) -> anyhow::Result<Model> {
    let mut model = Model::new();
    for file in files {
        model
            .add_file(file)
            .with_context(|| format!("Unable to use {}", file.display()))?;
    }

    Ok(model)
}

/// Streams the solutions, stopping MiniZinc when the process is interrupted.
fn solve(instance: &Instance, options: &SolveOptions, print_statistics: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut stream = instance.solutions(options).await?;

        loop {
            tokio::select! {
                solution = stream.next_solution() => match solution? {
                    Some(solution) => print_solution(&solution),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    stream.terminate().await?;
                    return Ok(());
                }
            }
        }

        if print_statistics {
            print_statistics_lines(stream.statistics());
        }
        if let Some(line) = status_line(stream.status()) {
            println!("{line}");
        }

        Ok::<_, anyhow::Error>(())
    })
}

fn list_solvers(driver: &mut Driver) -> anyhow::Result<()> {
    let registry = driver.available_solvers(false)?;

    let mut solvers = registry.values().flatten().collect::<Vec<_>>();
    solvers.sort_by(|a, b| (&a.id, &a.version).cmp(&(&b.id, &b.version)));
    solvers.dedup_by(|a, b| a.id == b.id && a.version == b.version);

    for solver in solvers {
        println!("{} {} ({})", solver.name, solver.version, solver.id);
    }

    Ok(())
}

fn print_solution(solution: &Solution) {
    match &solution.output {
        Some(output) => print!("{output}"),
        None => {
            for (name, value) in solution.iter() {
                println!("{name} = {value};");
            }
        }
    }

    println!("----------");
}

fn print_statistics_lines(statistics: &Statistics) {
    for (name, statistic) in statistics {
        println!("%%%mzn-stat: {name}={statistic}");
    }
}

fn status_line(status: Status) -> Option<&'static str> {
    match status {
        Status::OptimalSolution | Status::AllSolutions => Some("=========="),
        Status::Unsatisfiable => Some("=====UNSATISFIABLE====="),
        Status::Unbounded => Some("=====UNBOUNDED====="),
        Status::UnsatOrUnbounded => Some("=====UNSATorUNBOUNDED====="),
        Status::Error => Some("=====ERROR====="),
        Status::Unknown => Some("=====UNKNOWN====="),
        Status::Satisfied => None,
    }
}

/// Parse a `name=value` parameter assignment.
fn parse_assignment(text: &str) -> Result<(String, Value), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected `name=value`, got `{text}`"))?;
    let value = value.trim();

    let value = if let Ok(json) = serde_json::from_str::<serde_json::Value>(value) {
        Value::from_json(&json, None)
    } else if let Some((low, high)) = value.split_once("..") {
        match (low.trim().parse::<i64>(), high.trim().parse::<i64>()) {
            (Ok(low), Ok(high)) => Value::Range(low..=high),
            _ => Value::String(value.to_owned()),
        }
    } else {
        Value::String(value.to_owned())
    };

    Ok((name.trim().to_owned(), value))
}
