use std::collections::BTreeMap;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

use cncd::blame::InverseOracle;
use cncd::context::ContextValues;
use cncd::engine::EngineConfig;
use cncd::enumerate::DEFAULT_RANGE_LIMIT;
use cncd::interact::{acquire_context, NonInteractive, Terminal};
use cncd::load::{load_file, LoadError};
use cncd::report::Report;
use cncd::resolve::{resolve, Resolution};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "cncd",
    version,
    about = "Resolves which step invocations and items a step/item graph needs"
)]
struct Cli {
    /// Graph file (JSON)
    graph: PathBuf,

    /// Preset a context parameter instead of prompting (repeatable)
    #[arg(long = "ctx", value_name = "NAME=VALUE", value_parser = parse_preset)]
    ctx: Vec<(String, i64)>,

    /// Never prompt: missing context values and ambiguous demand are errors
    #[arg(long)]
    non_interactive: bool,

    /// Values enumerated per range before truncation
    #[arg(long, default_value_t = DEFAULT_RANGE_LIMIT)]
    range_limit: usize,

    /// Blame rounds before giving up
    #[arg(long, default_value_t = EngineConfig::default().max_iterations)]
    max_iterations: usize,

    /// Step invocations a single propagation may visit
    #[arg(long, default_value_t = EngineConfig::default().max_propagations)]
    max_propagations: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log resolution decisions, including the initial demand set
    #[arg(long)]
    verbose: bool,
}

fn parse_preset(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not an integer", value.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn main() {
    let bin = std::env::var("BIN_NAME").unwrap_or_else(|_| "cncd".to_string());
    let matches = Cli::command().bin_name(bin.clone()).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.format_target(false).init();

    // ── Load graph ──
    let loaded = match load_file(&cli.graph) {
        Ok(loaded) => loaded,
        Err(LoadError::Invalid(diags)) => {
            for diag in &diags {
                eprintln!("{}: {}: {}", bin, cli.graph.display(), diag);
            }
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("{}: error: {}", bin, e);
            std::process::exit(2);
        }
    };
    log::info!(
        "loaded {} ({} items, {} steps)",
        cli.graph.display(),
        loaded.graph.items.len(),
        loaded.graph.steps.len()
    );

    // ── Context ──
    let presets: BTreeMap<String, i64> = cli.ctx.iter().cloned().collect();
    let interactive = !cli.non_interactive && io::stdin().is_terminal();
    let ctx: ContextValues = {
        let result = if interactive {
            let mut terminal = Terminal::new(io::stdin().lock(), io::stderr());
            acquire_context(&loaded.graph.context, &presets, &mut terminal)
        } else {
            acquire_context(&loaded.graph.context, &presets, &mut NonInteractive)
        };
        match result {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("{}: error: {}", bin, e);
                std::process::exit(2);
            }
        }
    };

    // ── Resolve ──
    let config = EngineConfig {
        range_limit: cli.range_limit,
        max_iterations: cli.max_iterations,
        max_propagations: cli.max_propagations,
    };
    let oracle = InverseOracle {
        range_limit: cli.range_limit,
    };
    let result: Result<Resolution, _> = if interactive {
        let terminal = Terminal::new(io::stdin().lock(), io::stderr());
        resolve(&loaded.graph, &ctx, config, oracle, terminal)
    } else {
        resolve(&loaded.graph, &ctx, config, oracle, NonInteractive)
    };
    let resolution = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}: error: {}", bin, e);
            std::process::exit(1);
        }
    };
    for diag in &resolution.diagnostics {
        eprintln!("{}: {}", bin, diag);
    }

    // ── Report ──
    let report = Report::new(loaded.source_sha256, ctx, resolution);
    match cli.format {
        Format::Text => print!("{}", report.render_text()),
        Format::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: error: {}", bin, e);
                std::process::exit(2);
            }
        },
    }
}
