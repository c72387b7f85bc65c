use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use nova_debug_observer::replay::{replay, Trace};
use nova_debug_observer::{init_tracing, ObserverConfig};

/// Nova debugger session observer.
///
/// Replays recorded debug sessions through the breakpoint hit-count tracker and
/// the value markup continuity engine.
#[derive(Debug, Parser)]
#[command(name = "nova-debug-observer", version, about)]
struct Cli {
    /// Path to a TOML config file.
    ///
    /// If unset, `NOVA_OBSERVER_CONFIG` is used as a fallback. When neither is
    /// provided the observer uses in-memory defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON session trace and print a JSON report.
    Replay {
        trace: PathBuf,

        /// Pretty-print the report.
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config);
    init_tracing(&config.logging);

    match cli.command {
        Command::Replay { trace: path, pretty } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read trace {}", path.display()))?;
            let trace = Trace::from_json_str(&text)
                .with_context(|| format!("failed to parse trace {}", path.display()))?;

            let report = replay(&trace, &config);
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
    }
    Ok(())
}

fn load_config(cli_path: Option<PathBuf>) -> ObserverConfig {
    let path = cli_path.or_else(|| std::env::var_os("NOVA_OBSERVER_CONFIG").map(PathBuf::from));
    let Some(path) = path else {
        return ObserverConfig::default();
    };

    match ObserverConfig::load_from_path(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "nova-debug-observer: failed to load config from {}: {err}; continuing with defaults",
                path.display()
            );
            ObserverConfig::default()
        }
    }
}
