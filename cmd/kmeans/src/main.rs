//! bsp-kmeans - cluster a file of points with the in-process BSP runner.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bsp_kmeans::LocalCluster;
use clap::Parser;
use tracing::{info, warn};

mod config;
mod report;

use config::ConfigFile;

/// Distributed k-means over bulk-synchronous rounds, one thread per worker.
///
/// Each input line is one point: coordinates separated by whitespace or
/// commas. Each output line is `<worker>\t<coordinates>`, naming the cluster
/// the point ended up in.
#[derive(Parser)]
#[command(name = "bsp-kmeans")]
#[command(about = "Distributed k-means over bulk-synchronous rounds")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of clusters, which is also the number of workers
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Maximum number of rounds
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Per-coordinate convergence tolerance
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Seed for the random initial partition
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Input file, one point per line ("-" for stdin)
    pub input: PathBuf,

    /// Output file (default: stdout)
    pub output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = file
        .merge(ConfigFile {
            k: cli.clusters,
            max_iterations: cli.iterations,
            epsilon: cli.epsilon,
            seed: cli.seed,
        })
        .resolve()?;

    let records = read_records(&cli.input)?;
    info!("read {} records from {}", records.len(), cli.input.display());

    let run = LocalCluster::new(config).records(records).run()?;

    match &cli.output {
        Some(path) => {
            let f = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            report::write_rows(BufWriter::new(f), &run.output)?;
        }
        None => report::write_rows(io::stdout().lock(), &run.output)?,
    }

    // Every worker holds the same table; worker 0 speaks for the run.
    if let Some(summary) = run.summaries.first() {
        let text = if cli.json {
            report::render_json(summary)?
        } else {
            report::render(summary)
        };
        // Keep stdout clean for the rows when they are printed there.
        if cli.output.is_some() {
            println!("{}", text.trim_end());
        } else {
            eprintln!("{}", text.trim_end());
        }
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Box::new(BufReader::new(f))
    };
    read_lines(reader, path)
}

/// Collects lines from `reader`. A line that is not valid UTF-8 is logged and
/// skipped; only I/O errors fail.
fn read_lines<R: BufRead>(mut reader: R, path: &Path) -> Result<Vec<String>> {
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut lineno = 0usize;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        lineno += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => records.push(line),
            Err(e) => warn!("{}:{}: skipping undecodable line: {}", path.display(), lineno, e),
        }
    }
    Ok(records)
}
