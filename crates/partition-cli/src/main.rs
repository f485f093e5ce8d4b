use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use common::io::{read_dot, write_dot_file};
use dfg_partition::{
    extract_partitions, output_namespace, partition, profile, Attempt, GoodLpSolver, PartitionError, PartitionOutcome,
    PartitionParams, SearchConfig,
};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Partition a dataflow graph into capacity-bounded tiles.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Graph in DOT format.
    graph: PathBuf,
    /// Maximum number of vertices per partition.
    capacity: usize,
    /// Maximum number of reads and of writes per partition.
    transaction_limit: usize,
    /// Objective weight of one memory transaction.
    #[arg(default_value_t = 1)]
    memory_weight: usize,
    #[arg(long, default_value = "outputParts")]
    output_dir: PathBuf,
    #[arg(long, default_value_t = 100)]
    max_iterations: usize,
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    /// Raise the log level, repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(format: LogFormat, verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let builder = FmtSubscriber::builder().with_max_level(level).with_span_events(FmtSpan::CLOSE);
    match format {
        LogFormat::Pretty => builder.finish().init(),
        LogFormat::Json => builder.json().finish().init(),
    }
}

fn write_model(path: &Path, outcome: &PartitionOutcome) -> Result<(), Box<dyn Error>> {
    let mut out = BufWriter::new(File::create(path)?);
    outcome.trial.model().write_lp(&mut out)?;
    Ok(())
}

fn write_attempts<W: Write>(out: &mut W, cli: &Cli, attempts: &[Attempt]) -> std::io::Result<()> {
    writeln!(
        out,
        "graph {} capacity {} transaction_limit {} memory_weight {}",
        cli.graph.display(),
        cli.capacity,
        cli.transaction_limit,
        cli.memory_weight
    )?;
    for attempt in attempts {
        writeln!(
            out,
            "iteration {} partitions {}: {} [{:.3} s]",
            attempt.iteration,
            attempt.num_parts,
            attempt.outcome,
            attempt.elapsed.as_secs_f64()
        )?;
    }
    Ok(())
}

fn write_run_log(path: &Path, cli: &Cli, outcome: &PartitionOutcome) -> Result<(), Box<dyn Error>> {
    let mut out = BufWriter::new(File::create(path)?);
    write_attempts(&mut out, cli, &outcome.attempts)?;
    let report = &outcome.report;
    writeln!(
        out,
        "solution found in iteration {} with {} partitions, objective {}, {:.3} s",
        outcome.iteration,
        outcome.num_parts,
        outcome.objective,
        outcome.elapsed.as_secs_f64()
    )?;
    writeln!(
        out,
        "load transactions {} store transactions {} total cost {}",
        report.load_transactions,
        report.store_transactions,
        cli.memory_weight * report.memory_transactions()
    )?;
    writeln!(out, "partition size writes out_edges reads in_edges loads stores")?;
    for (p, stats) in report.parts.iter().enumerate() {
        writeln!(
            out,
            "{p} {} {} {} {} {} {} {}",
            stats.size, stats.writes, stats.out_edges, stats.reads, stats.in_edges, stats.loads, stats.stores
        )?;
    }
    out.flush()?;
    Ok(())
}

fn write_failure_log(
    path: &Path,
    cli: &Cli,
    attempts: &[Attempt],
    iterations: usize,
    last_num_parts: usize,
) -> Result<(), Box<dyn Error>> {
    let mut out = BufWriter::new(File::create(path)?);
    write_attempts(&mut out, cli, attempts)?;
    writeln!(out, "no feasible partitioning after {iterations} iterations (last tried {last_num_parts} partitions)")?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let dfg = read_dot(&cli.graph)?;
    match profile(&dfg) {
        Ok(profile) => info!(
            nodes = profile.node_count,
            edges = profile.edge_count,
            critical_path = profile.critical_path,
            parallelism = profile.parallelism,
            loads = profile.loads,
            stores = profile.stores
        ),
        Err(e) => warn!("{e}"),
    }

    let params = PartitionParams::new(cli.capacity, cli.transaction_limit).with_memory_weight(cli.memory_weight);
    let config = SearchConfig { max_iterations: cli.max_iterations };
    let dir = cli.output_dir.join(output_namespace(&cli.graph, &params));
    let outcome = match partition(&dfg, &params, &config, &GoodLpSolver) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let PartitionError::NoFeasiblePartitioning { iterations, last_num_parts, attempts } = &e {
                fs::create_dir_all(&dir)?;
                write_failure_log(&dir.join("partition.log"), &cli, attempts, *iterations, *last_num_parts)?;
            }
            return Err(e.into());
        }
    };

    fs::create_dir_all(&dir)?;
    write_model(&dir.join("model.lp"), &outcome)?;
    for part in extract_partitions(&dfg, &outcome.assignment) {
        write_dot_file(dir.join(format!("{}.dot", part.index)), &part.dfg)?;
    }
    write_run_log(&dir.join("partition.log"), &cli, &outcome)?;

    info!(
        num_parts = outcome.num_parts,
        iteration = outcome.iteration,
        objective = outcome.objective,
        output = %dir.display(),
        "done"
    );
    Ok(())
}
