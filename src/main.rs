use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mkp_bp::driver::{BranchAndPrice, SolveConfig};
use mkp_bp::io::{read_instance, write_report};
use mkp_bp::lp::BoundedSimplex;
use mkp_bp::repair::BacktrackingPacker;

#[derive(Debug, Parser)]
#[command(name = "mkp-bp", about = "Exact branch-and-price solver for the multiple knapsack problem")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Solve an instance and write a result report.
    Solve {
        #[arg(short, long, value_name = "INSTANCE_FILE", value_hint = clap::ValueHint::FilePath)]
        instance: PathBuf,

        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        tunables: Tunables,
    },
    /// Solve an instance once and print wall time and node counters.
    Bench {
        #[arg(short, long, value_name = "INSTANCE_FILE", value_hint = clap::ValueHint::FilePath)]
        instance: PathBuf,

        #[command(flatten)]
        tunables: Tunables,
    },
}

#[derive(Debug, Args)]
struct Tunables {
    #[arg(long, default_value_t = SolveConfig::default().max_nodes)]
    max_nodes: u64,

    #[arg(long, default_value_t = SolveConfig::default().time_limit_ms)]
    time_limit_ms: u64,

    #[arg(long, default_value_t = SolveConfig::default().gap_tolerance)]
    gap_tolerance: f64,

    #[arg(long)]
    lp_time_limit_secs: Option<f64>,

    #[arg(long)]
    sat_time_limit_ms: Option<u64>,

    #[arg(long, default_value_t = SolveConfig::default().cg_max_iterations)]
    cg_max_iterations: usize,

    #[arg(long, default_value_t = SolveConfig::default().cg_tolerance)]
    cg_tolerance: f64,

    /// Raise the log level to debug.
    #[arg(short, long)]
    verbose: bool,
}

impl From<Tunables> for SolveConfig {
    fn from(t: Tunables) -> Self {
        let defaults = SolveConfig::default();
        SolveConfig {
            max_nodes: t.max_nodes,
            time_limit_ms: t.time_limit_ms,
            gap_tolerance: t.gap_tolerance,
            lp_time_limit_secs: t.lp_time_limit_secs.or(defaults.lp_time_limit_secs),
            sat_time_limit_ms: t.sat_time_limit_ms.or(defaults.sat_time_limit_ms),
            cg_max_iterations: t.cg_max_iterations,
            cg_tolerance: t.cg_tolerance,
            verbose: t.verbose,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.action {
        Action::Solve { instance, output, tunables } => {
            init_logging(tunables.verbose);
            let config: SolveConfig = tunables.into();
            let instance = read_instance(&instance, instance_name(&instance))?;
            let bp = BranchAndPrice::new(
                &instance,
                Box::new(BoundedSimplex::new()),
                Box::new(BacktrackingPacker::new()),
                config,
            );
            let report = bp.solve()?;
            write_report(&report, output.as_deref())?;
        }
        Action::Bench { instance, tunables } => {
            init_logging(tunables.verbose);
            let config: SolveConfig = tunables.into();
            let instance = read_instance(&instance, instance_name(&instance))?;
            let bp = BranchAndPrice::new(
                &instance,
                Box::new(BoundedSimplex::new()),
                Box::new(BacktrackingPacker::new()),
                config,
            );
            let report = bp.solve()?;
            println!(
                "status={:?} objective={} gap={:.6} nodes_processed={} nodes_pruned={} nodes_integer={} wall_time_ms={}",
                report.status,
                report.objective_lb,
                report.gap,
                report.nodes_processed,
                report.nodes_pruned,
                report.nodes_integer,
                report.wall_time_ms
            );
        }
    }

    Ok(())
}

fn instance_name(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_string())
}
