//! xtu-build CLI - executes the first pass of XTU analysis.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xtu_build::{
    default_threads, load_compilation_database, ClangToolchain, XtuBuild, XtuConfig, XtuLayout,
};

#[derive(Parser)]
#[command(name = "xtu-build")]
#[command(about = "Executes 1st pass of XTU analysis", long_about = None)]
struct Cli {
    /// Use a JSON Compilation Database
    #[arg(short = 'b', value_name = "build.json")]
    buildlog: PathBuf,

    /// Use directory for reading preanalyzation data
    #[arg(short = 'p', value_name = "preanalyze-dir", default_value = ".xtu")]
    xtu_dir: PathBuf,

    /// Number of threads used (default: 1.5x CPU count)
    #[arg(short = 'j', value_name = "threads")]
    threads: Option<usize>,

    /// Verbose output of every command executed
    #[arg(short = 'v')]
    verbose: bool,

    /// Set path of clang binaries to be used
    #[arg(long, value_name = "clang-path", env = "CLANG_PATH", default_value = ".")]
    clang_path: PathBuf,

    /// TOML config (default: <preanalyze-dir>/config.toml if present)
    #[arg(long, value_name = "config")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Log filter comes from `XTU_LOG`, else `info` when verbose and `warn` otherwise.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("XTU_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = XtuConfig::resolve(cli.config.as_deref(), &cli.xtu_dir)?;

    let toolchain = ClangToolchain::new(&cli.clang_path, config.tools, cli.verbose);
    if cli.verbose {
        println!("XTU uses clang dir: {}", toolchain.bin_dir().display());
    }

    let db = load_compilation_database(&cli.buildlog, &config.sources.extensions)?;
    let threads = cli.threads.unwrap_or_else(default_threads);

    let xtu = XtuBuild::new(
        db,
        XtuLayout::new(&cli.xtu_dir),
        toolchain,
        config.sources.extensions,
        threads,
    );
    let summary = xtu.run()?;

    println!("✓ {}", summary);
    println!("  map: {}", xtu.layout().external_fn_map().display());

    Ok(())
}
