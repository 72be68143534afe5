//! CLI entrypoint for function block networks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fbnet_runtime::config::{NetworkConfig, RuntimeConfig};
use fbnet_runtime::io::ControllerRegistry;
use fbnet_runtime::library::FbTypeRegistry;
use fbnet_runtime::scheduler::StdClock;
use fbnet_types::{CastLattice, ElementaryType};

#[derive(Debug, Parser)]
#[command(
    name = "fbnet",
    version,
    about = "Event-driven function block network runtime",
    after_help = "Examples:\n  fbnet check --network ./network.toml\n  fbnet run --network ./network.toml --inject START.EI --duration-ms 500\n  fbnet lattice"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a network without executing it.
    Check {
        /// Network description file.
        #[arg(long)]
        network: PathBuf,
    },
    /// Execute a network for a fixed duration.
    Run {
        /// Network description file.
        #[arg(long)]
        network: PathBuf,
        /// Runtime configuration file.
        #[arg(long)]
        runtime: Option<PathBuf>,
        /// Input events to inject after start (INSTANCE.EVENT).
        #[arg(long)]
        inject: Vec<String>,
        /// Ports to print after stop (INSTANCE.PORT).
        #[arg(long)]
        watch: Vec<String>,
        /// Run time in milliseconds.
        #[arg(long, default_value = "1000")]
        duration_ms: u64,
    },
    /// Print the elementary cast lattice.
    Lattice,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { network } => {
            init_logging("warn");
            check(&network)
        }
        Command::Run {
            network,
            runtime,
            inject,
            watch,
            duration_ms,
        } => {
            let config = match runtime {
                Some(path) => RuntimeConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            init_logging(&config.log_level);
            run(
                &network,
                &config,
                &inject,
                &watch,
                std::time::Duration::from_millis(duration_ms),
            )
        }
        Command::Lattice => {
            let scalars = ElementaryType::ALL
                .iter()
                .copied()
                .filter(|ty| ty.is_scalar())
                .collect::<Vec<_>>();
            print!("{}", CastLattice::global().render(&scalars));
            Ok(())
        }
    }
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn check(path: &Path) -> anyhow::Result<()> {
    let library = FbTypeRegistry::standard()?;
    let network = NetworkConfig::load(path)?
        .build(&library)
        .with_context(|| format!("building {}", path.display()))?;
    println!(
        "ok: {} instances, {} contexts, {} event connections, {} data connections",
        network.len(),
        network.context_names().len(),
        network.graph().event_edge_count(),
        network.graph().data_edge_count()
    );
    Ok(())
}

fn run(
    path: &Path,
    config: &RuntimeConfig,
    inject: &[String],
    watch: &[String],
    duration: std::time::Duration,
) -> anyhow::Result<()> {
    let library = FbTypeRegistry::standard()?;
    let network = NetworkConfig::load(path)?
        .build(&library)
        .with_context(|| format!("building {}", path.display()))?;
    let io = Arc::clone(network.io());
    let executor = network.into_executor(&config.scheduler, Arc::new(StdClock::new()));

    let controllers = ControllerRegistry::standard();
    let mut handles = Vec::with_capacity(config.controllers.len());
    for controller in &config.controllers {
        let runner = controllers.build(controller.clone())?;
        handles.push(runner.spawn(Arc::clone(&io))?);
    }

    let running = executor.spawn_with_timer(config.timer)?;
    info!(name = %config.name, "network started");
    for path in inject {
        running
            .inject(path)
            .with_context(|| format!("injecting {path}"))?;
    }
    std::thread::sleep(duration);
    let executor = running.stop();
    for handle in handles {
        handle.stop();
    }

    for event in executor.drain_status() {
        println!("status: {event:?}");
    }
    for path in watch {
        let value = executor
            .output(path)
            .or_else(|_| executor.input(path))
            .with_context(|| format!("reading {path}"))?;
        println!("{path} = {value}");
    }
    Ok(())
}
