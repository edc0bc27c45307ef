//! hvbench CLI: measure and cross-check the hypervector engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use hyperbits::config::BenchConfig;
use hyperbits::error::{HarnessError, HvError};
use hyperbits::harness::{BenchOp, Harness};
use hyperbits::hv::{BITS, BYTES, WORDS};
use hyperbits::simd::{self, IsaLevel};

#[derive(Parser)]
#[command(name = "hvbench", version, about = "Binary hypervector engine benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the vector width and the kernel tiers this CPU supports.
    Info,

    /// Time every primitive and check it against its reference.
    Run {
        /// TOML harness config; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only run these benchmarks (repeatable).
        #[arg(long)]
        only: Vec<String>,

        /// Force a kernel tier instead of the best detected one.
        #[arg(long)]
        isa: Option<IsaLevel>,

        /// Write every call's result to a fresh buffer instead of one resident buffer.
        #[arg(long)]
        fresh: bool,

        /// Override the config seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Exit with an error if any check fails.
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => {
            println!("hypervector width: {BITS} bits ({WORDS} words, {BYTES} bytes)");
            println!("detected tier:     {}", simd::detect_isa());
            for level in IsaLevel::ALL {
                let mark = if level.is_supported() { "yes" } else { "no" };
                println!("  {:<28} {mark}", level.to_string());
            }
        }

        Commands::Run {
            config,
            only,
            isa,
            fresh,
            seed,
            strict,
        } => {
            let mut config = match config {
                Some(path) => BenchConfig::load(&path).map_err(HvError::from)?,
                None => BenchConfig::default(),
            };
            if fresh {
                config.resident = false;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            let ops: Vec<BenchOp> = if only.is_empty() {
                BenchOp::ALL.to_vec()
            } else {
                only.iter()
                    .map(|name| name.parse::<BenchOp>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(HvError::from)?
            };

            let kernel = match isa {
                Some(level) => simd::kernel_for(level).ok_or_else(|| {
                    HvError::from(HarnessError::UnsupportedIsa {
                        isa: level.to_string(),
                    })
                })?,
                None => simd::best_kernel(),
            };

            let mode = if config.resident { "resident" } else { "fresh" };
            println!("{BITS}-bit vectors, {} kernel, {mode} buffers", kernel.isa_level());

            let mut harness = Harness::new(config, kernel);
            let results = harness.run_all(&ops);
            for m in &results {
                println!("{m}");
            }

            if strict {
                if let Some(failed) = results.iter().find(|m| !m.check.passed()) {
                    return Err(HvError::from(HarnessError::Mismatch {
                        op: format!("{} {}", failed.op, failed.label).trim_end().to_string(),
                    })
                    .into());
                }
            }
        }
    }

    Ok(())
}
