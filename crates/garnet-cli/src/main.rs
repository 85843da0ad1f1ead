//! Garnet runtime driver
//!
//! Boots a runtime with the configured cache and collector options, runs
//! the built-in dispatch scenarios or a dispatch workload, and prints cache
//! and GC statistics.
//!
//! Set `GARNET_LOG` (an `EnvFilter` directive such as `garnet_core=debug`)
//! to see runtime events on stderr.

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use garnet_core::{
    defaults, CacheOptions, GcOptions, InvalidationGranularity, Runtime, VmOptions,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "garnet")]
#[command(about = "Garnet VM runtime core driver", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in dispatch, cache and closure scenarios
    Scenario {
        /// Only run scenarios whose name contains this pattern
        pattern: Option<String>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Dispatch through a class hierarchy and report statistics
    Stress {
        /// Depth of the class hierarchy below the defining class
        #[arg(long, default_value_t = 8)]
        depth: usize,
        /// Number of sends
        #[arg(short, long, default_value_t = 100_000)]
        iterations: usize,
        /// Redefine the target method every N sends (0 = never)
        #[arg(long, default_value_t = 0)]
        redefine_every: usize,
        /// Create and call a block on every send
        #[arg(long)]
        closures: bool,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Print the default configuration
    Info,
}

#[derive(Args, Debug, Clone)]
struct RuntimeArgs {
    /// Method cache slots (rounded up to a power of two)
    #[arg(long, default_value_t = defaults::DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,
    /// Cache invalidation granularity
    #[arg(long, value_enum, default_value_t = Invalidation::Whole)]
    invalidation: Invalidation,
    /// Allocations between collections
    #[arg(long, default_value_t = defaults::DEFAULT_GC_THRESHOLD)]
    gc_threshold: usize,
    /// Disable compaction of promoted scopes
    #[arg(long)]
    no_compact: bool,
    /// Maximum call depth
    #[arg(long, default_value_t = defaults::DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Invalidation {
    /// Clear the whole cache on any method table change
    Whole,
    /// Clear only entries for the changed name
    ByName,
}

impl RuntimeArgs {
    fn options(&self) -> VmOptions {
        VmOptions {
            cache: CacheOptions {
                capacity: self.cache_capacity,
                invalidation: match self.invalidation {
                    Invalidation::Whole => InvalidationGranularity::Whole,
                    Invalidation::ByName => InvalidationGranularity::ByName,
                },
            },
            gc: GcOptions {
                threshold: self.gc_threshold,
                compact: !self.no_compact,
            },
            max_call_depth: self.max_depth,
        }
    }

    fn boot(&self) -> Runtime {
        Runtime::new(self.options())
    }
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("GARNET_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scenario { pattern, runtime } => {
            commands::scenario::execute(&runtime.boot(), pattern.as_deref())
        }
        Commands::Stress {
            depth,
            iterations,
            redefine_every,
            closures,
            runtime,
        } => commands::stress::execute(
            &runtime.boot(),
            &commands::stress::StressOptions {
                depth,
                iterations,
                redefine_every,
                closures,
            },
        ),
        Commands::Info => commands::info::execute(),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
