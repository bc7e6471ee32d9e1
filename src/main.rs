use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apidoc::cli::CommandContext;
use apidoc::cli::commands::generate::GenerateOptions;
use apidoc::{Config, ConfigLoader};

#[derive(Parser)]
#[command(name = "apidoc")]
#[command(
    version,
    about = "Generate API documentation from captured HTTP traffic with an LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults: ~/.config/apidoc/config.toml, then .apidoc/config.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .apidoc/ with a default config and an empty database
    Init {
        #[arg(long, short, help = "Overwrite an existing config file")]
        force: bool,
    },

    /// Generate documentation from a JSON array of traffic records
    Generate {
        #[arg(long, short, help = "Path to the records JSON file")]
        records: PathBuf,
        #[arg(long, short, help = "What the user did while the traffic was captured")]
        scenario: Option<String>,
        #[arg(long, help = "Existing session to generate into")]
        session: Option<String>,
        #[arg(long, short, help = "Write the document here instead of stdout")]
        output: Option<PathBuf>,
        #[arg(long = "no-cache", help = "Discard cached batch results first")]
        no_cache: bool,
        #[arg(long, help = "Reuse successful cached batches")]
        resume: bool,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Per-batch token budget (0 = no splitting)")]
        max_tokens: Option<usize>,
    },

    /// Show a session and its cached batches
    Status {
        session: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// List sessions
    Sessions {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Remove a session and its cached batches
    Clean {
        session: String,
        #[arg(long, help = "Only clear cached batches, keep the session")]
        cache: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mapidoc encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> apidoc::Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config errors are reported after logging is up
    let config = load_config(cli.config.as_ref());

    let filter = if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "error".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.log.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { force } => {
            apidoc::cli::commands::init::run(force)?;
        }
        Commands::Generate {
            records,
            scenario,
            session,
            output,
            no_cache,
            resume,
            model,
            max_tokens,
        } => {
            let mut config = config?;
            if let Some(model) = model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            config.validate()?;

            let ctx = CommandContext::open(config)?;
            let rt = Runtime::new()?;
            rt.block_on(apidoc::cli::commands::generate::run(
                ctx,
                GenerateOptions {
                    records,
                    scenario,
                    session,
                    output,
                    no_cache,
                    resume,
                },
            ))?;
        }
        Commands::Status { session, format } => {
            let ctx = CommandContext::open(config?)?;
            apidoc::cli::commands::status::run(&ctx, &session, &format)?;
        }
        Commands::Sessions { format } => {
            let ctx = CommandContext::open(config?)?;
            apidoc::cli::commands::sessions::run(&ctx, &format)?;
        }
        Commands::Clean { session, cache } => {
            let ctx = CommandContext::open(config?)?;
            apidoc::cli::commands::clean::run(&ctx, &session, cache)?;
        }
    }

    Ok(())
}
