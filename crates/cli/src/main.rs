mod config;
mod error;
mod prompt;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use calendar::AppointmentBook;
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use runtime::{AnthropicBackend, Session, ToolRegistry};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const CONFIG_FILE: &str = "steward.toml";

#[derive(Parser)]
#[command(name = "steward")]
#[command(about = "A scheduling assistant that books appointments through tool calls", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (defaults to ./steward.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model to use, overriding the config file
    #[arg(long, global = true)]
    model: Option<String>,

    /// Tool-call rounds allowed per message, overriding the config file
    #[arg(long, global = true)]
    max_tool_cycles: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Print the tool catalog offered to the model
    Tools,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.backend.model = model;
    }
    if let Some(max) = cli.max_tool_cycles {
        config.agent.max_tool_cycles = max;
    }
    config.validate()?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(config).await,
        Some(Commands::Tools) => cmd_tools(),
    }
}

/// Log to stderr so replies on stdout stay readable. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading config");
        return Ok(Config::load(path)?);
    }

    let default_path = Path::new(CONFIG_FILE);
    if default_path.exists() {
        info!(path = CONFIG_FILE, "loading config");
        Ok(Config::load(default_path)?)
    } else {
        debug!("no config file, using defaults");
        Ok(Config::default())
    }
}

async fn cmd_chat(config: Config) -> Result<()> {
    println!("steward v{}", env!("CARGO_PKG_VERSION"));

    let auth = config.auth()?;
    let mut backend = AnthropicBackend::builder(auth, &config.backend.model)
        .max_tokens(config.backend.max_tokens);
    if let Some(base_url) = &config.backend.base_url {
        backend = backend.base_url(base_url);
    }
    let backend = backend.build();

    let book = Arc::new(AppointmentBook::new(config.calendar.slot()?));
    let mut registry = ToolRegistry::new();
    calendar::register(&mut registry, book)?;

    let now = Utc::now().with_timezone(&config.owner.offset()?);
    let instructions = prompt::build_instructions(&config.owner, now);

    let mut session = Session::builder(backend, Arc::new(registry), instructions)
        .catalog(calendar::catalog())
        .config(config.agent.loop_config())
        .build()?;
    println!("Session ID: {}", session.id());
    println!("Model: {}", config.backend.model);
    println!(
        "Managing appointments for {} ({})",
        config.owner.name, config.owner.timezone_label
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match session.chat(input).await {
            Ok(outcome) if outcome.completed => {
                println!("\n{}\n", outcome.reply);
            }
            Ok(outcome) => {
                println!("\n[request not completed] {}\n", outcome.reply);
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    let usage = session.end();
    println!(
        "\nSession ended ({} input / {} output tokens).",
        usage.input_tokens, usage.output_tokens
    );
    Ok(())
}

fn cmd_tools() -> Result<()> {
    let tools: Vec<_> = calendar::catalog()
        .iter()
        .map(|spec| {
            json!({
                "name": spec.name,
                "description": spec.description,
                "input_schema": spec.input_schema(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}
