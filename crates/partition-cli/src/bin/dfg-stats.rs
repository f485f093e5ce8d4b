use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use common::io::read_dot;
use dfg_partition::profile;
use tracing::Level;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

/// Print the shape of dataflow graphs.
#[derive(Debug, Parser)]
struct Cli {
    /// Graphs in DOT format.
    #[arg(required = true)]
    graphs: Vec<PathBuf>,
    #[arg(long)]
    log_level: Option<Level>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if let Some(level) = cli.log_level {
        FmtSubscriber::builder().with_max_level(level).finish().init();
    }

    for path in &cli.graphs {
        let dfg = read_dot(path)?;
        let profile = profile(&dfg)?;
        println!("{}", path.display());
        println!("{profile}");
    }
    Ok(())
}
