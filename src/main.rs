use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dagalign::{align, config, graph, io};

#[derive(Parser)]
#[command(name = "dagalign")]
#[command(about = "dagalign - batched SIMD local alignment of DNA reads to acyclic sequence graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align reads to a reference sequence graph
    Align {
        /// Reference graph: binary record stream, or plain-text adjacency
        /// when the extension is .txt
        #[arg(short = 'g', long, value_name = "GRAPH")]
        graph: PathBuf,

        /// Query reads (FASTA/FASTQ, optionally gzipped)
        #[arg(short = 'q', long, value_name = "READS")]
        reads: PathBuf,

        /// Alignment mode (only 'local' is supported)
        #[arg(short = 'm', long, value_name = "MODE", default_value = "local")]
        mode: String,

        /// DP score precision in bits: 8, 16 or 32
        #[arg(short = 'p', long, value_name = "INT", default_value = "16")]
        precision: u32,

        /// Rolling score-column window size (power of two)
        #[arg(long, value_name = "INT", default_value = "8")]
        block_width: usize,

        /// Query rows processed per block (power of two)
        #[arg(long, value_name = "INT", default_value = "16")]
        block_height: usize,

        /// Number of threads (default: all available cores)
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,

        /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Align {
            graph,
            reads,
            mode,
            precision,
            block_width,
            block_height,
            threads,
            verbosity,
        } => {
            let log_level = match verbosity {
                v if v <= 1 => log::LevelFilter::Error,
                2 => log::LevelFilter::Warn,
                3 => log::LevelFilter::Info,
                4 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };
            env_logger::Builder::from_default_env()
                .filter_level(log_level)
                .format_timestamp(None)
                .format_target(false)
                .init();

            if !mode.eq_ignore_ascii_case("local") {
                log::error!("unsupported alignment mode '{}'; only 'local' is available", mode);
                std::process::exit(1);
            }

            let precision = match config::ScorePrecision::parse(precision) {
                Ok(p) => p,
                Err(e) => {
                    log::error!("{}", e);
                    std::process::exit(1);
                }
            };

            let cfg = config::AlignConfig {
                mode: config::AlignMode::Local,
                precision,
                block_width,
                block_height,
                scoring: config::Scoring::default(),
            };
            if let Err(e) = cfg.validate() {
                log::error!("{}", e);
                std::process::exit(1);
            }

            let mut num_threads = threads.unwrap_or_else(num_cpus::get);
            if num_threads < 1 {
                log::warn!("invalid thread count {}, using 1 thread", num_threads);
                num_threads = 1;
            }
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
            {
                log::warn!("failed to configure thread pool: {}", e);
            }
            log::info!(
                "using {} thread{}, {}-bit scores ({} lanes)",
                num_threads,
                if num_threads == 1 { "" } else { "s" },
                precision.bits(),
                precision.lanes()
            );

            if let Err(e) = run_align(&graph, &reads, &cfg) {
                log::error!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_align(
    graph_path: &PathBuf,
    reads_path: &PathBuf,
    cfg: &config::AlignConfig,
) -> Result<(), dagalign::AlignError> {
    let graph = graph::load_graph(graph_path)?;
    let records = io::load_reads(reads_path)?;
    let seqs: Vec<Vec<u8>> = records.iter().map(|r| r.seq.clone()).collect();

    let results = align::align_to_dag(&seqs, &graph, cfg)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    align::write_results(&mut out, &seqs, &results)?;
    Ok(())
}
