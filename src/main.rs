use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use strscan::genomics::{parse_locus_table, write_report, ReportOptions};
use strscan::pipeline::{run_pipeline, FastqSequences, SourceChain};
use strscan::{build_index, ScanConfig, DEFAULT_BATCH_SIZE};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "strscan", about = "Genotype short tandem repeats directly from FASTQ reads")]
struct Cli {
    /// Locus table (tab-separated: name, type, forward, reverse, motif, period, offset).
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Maximum substitutions tolerated in an anchor (0-2).
    #[arg(short = 'a', long, default_value_t = 1)]
    anchor_distance: u8,

    /// Maximum substitutions tolerated in a repeat motif (0-1).
    #[arg(short = 'm', long, default_value_t = 0)]
    motif_distance: u8,

    /// Worker threads; 1 scans without spawning threads.
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Stop scanning a read once one strand has a complete anchor pair.
    #[arg(short = 's', long)]
    short_circuit: bool,

    /// Report negative-strand haplotypes as read instead of reverse complemented.
    #[arg(short = 'n', long)]
    no_reverse_complement: bool,

    /// Verbose logging and the per-locus bias table.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Only keep loci whose marker type shares a prefix with this value.
    #[arg(short = 't', long = "type")]
    marker_type: Option<String>,

    /// Write the report here instead of stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Fold haplotypes seen fewer times into a per-locus summary row.
    #[arg(short = 'f', long, default_value_t = 0)]
    min_count: u32,

    /// Reads held in each half of the read buffer.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// FASTQ files, read in order as one stream; stdin when omitted.
    fastq: Vec<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn open_inputs(paths: &[PathBuf]) -> Result<Vec<FastqSequences<Box<dyn Read + Send>>>> {
    if paths.is_empty() {
        let stdin: Box<dyn Read + Send> = Box::new(io::stdin());
        return Ok(vec![FastqSequences::new(stdin)]);
    }
    paths
        .iter()
        .map(|path| {
            let file = File::open(path)
                .with_context(|| format!("failed to open FASTQ file {}", path.display()))?;
            let reader: Box<dyn Read + Send> = Box::new(file);
            Ok(FastqSequences::new(reader))
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let started = Instant::now();

    let table = File::open(&cli.config)
        .with_context(|| format!("failed to open locus table {}", cli.config.display()))?;
    let loci = parse_locus_table(BufReader::new(table), cli.marker_type.as_deref())
        .with_context(|| format!("failed to parse locus table {}", cli.config.display()))?;
    anyhow::ensure!(!loci.is_empty(), "no loci found in {}", cli.config.display());
    info!(loci = loci.len(), "loaded locus table");

    let config = ScanConfig {
        anchor_distance: cli.anchor_distance,
        motif_distance: cli.motif_distance,
        workers: cli.threads,
        short_circuit: cli.short_circuit,
        reverse_complement: !cli.no_reverse_complement,
        batch_size: cli.batch_size,
        diagnostics: cli.verbose,
    };
    let index = build_index(&loci, &config).context("failed to build locus index")?;
    let stats = index.stats();
    info!(nodes = stats.nodes, entries = stats.entries, "built locus index");

    let mut source = SourceChain::new(open_inputs(&cli.fastq)?);
    let output = run_pipeline(&index, &loci, &config, &mut source).context("scan failed")?;
    info!(
        reads = output.reads,
        calls = output.calls,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scan complete"
    );

    let options = ReportOptions {
        min_count: cli.min_count,
        reverse_complement: config.reverse_complement,
        verbose: cli.verbose,
    };
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_report(&mut out, &output.merged, &loci, &options).context("failed to write report")?;
    out.flush().context("failed to flush report")?;
    Ok(())
}
