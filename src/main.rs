use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use compgen::config::Settings;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "compgen")]
#[command(about = "Generate, review, persist and test pipeline components with a chat model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Perform a dry run without executing actions")]
    dry_run: bool,

    #[arg(long, global = true, help = "Settings file (defaults to compgen.yml when present)")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate a component, its unit test and a review from a description")]
    Generate {
        #[arg(help = "What the component should do", conflicts_with = "file")]
        description: Option<String>,

        #[arg(long, help = "Read the description from a file")]
        file: Option<PathBuf>,

        #[arg(long, help = "Skip unit test generation")]
        no_test: bool,

        #[arg(long, help = "Persist the generated component and test")]
        persist: bool,

        #[arg(long, default_value_t = 1, help = "Generate N candidates and keep the best reviewed one")]
        candidates: usize,
    },

    #[command(about = "List sample requests and the example components shown to the model")]
    Examples,

    #[command(about = "Persist a hand-edited component and test")]
    Persist {
        #[arg(long, help = "Component source file")]
        component: PathBuf,

        #[arg(long, help = "Unit test source file")]
        test: Option<PathBuf>,

        #[arg(long, help = "Description the component answers")]
        description: Option<String>,
    },

    #[command(about = "Print a persisted component and its test")]
    Show {
        #[arg(help = "Component name")]
        name: String,
    },

    #[command(about = "List persisted components")]
    List {
        #[arg(long, help = "List test files instead of components")]
        tests: bool,
    },

    #[command(about = "Run persisted unit tests")]
    Test {
        #[arg(help = "Component names", required_unless_present = "all")]
        names: Vec<String>,

        #[arg(long, help = "Test every persisted component")]
        all: bool,
    },

    #[command(about = "Run a component's test and let the model fix failures")]
    Fix {
        #[arg(help = "Component name")]
        name: String,

        #[arg(long, help = "Maximum fix attempts (defaults to max_fix_attempts in settings)")]
        max_attempts: Option<usize>,
    },

    #[command(subcommand, about = "Inspect or replace the review prompt")]
    ReviewPrompt(ReviewPromptCommands),
}

#[derive(Subcommand)]
enum ReviewPromptCommands {
    #[command(about = "Print the review prompt in effect")]
    Show,

    #[command(about = "Use the contents of FILE as the review prompt")]
    Set {
        #[arg(help = "Plain-text prompt file")]
        file: PathBuf,
    },

    #[command(about = "Return to the built-in review prompt")]
    Reset,
}

/// `RUST_LOG` wins, then `LOG_LEVEL`; `--verbose` turns on debug output for
/// this crate on top of either.
fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match std::env::var("LOG_LEVEL").unwrap_or_default().to_lowercase().as_str() {
            "debug" => "debug",
            "warning" | "warn" => "warn",
            "error" => "error",
            _ => "info",
        };
        EnvFilter::new(level)
    });
    if verbose {
        filter = filter.add_directive("compgen=debug".parse().context("Invalid log directive")?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose)?;

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; cancelling");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Generate {
            description,
            file,
            no_test,
            persist,
            candidates,
        } => {
            let source = match file {
                Some(path) => cli::DescriptionSource::File(path),
                None => cli::DescriptionSource::Text(description),
            };
            let options = cli::GenerateOptions {
                also_generate_test: !no_test,
                persist,
                candidates,
            };
            cli::generate(source, options, &settings, &config, &cancel).await?;
        }
        Commands::Examples => {
            cli::examples(&settings)?;
        }
        Commands::Persist {
            component,
            test,
            description,
        } => {
            cli::persist(component, test, description, &settings, &config)?;
        }
        Commands::Show { name } => {
            cli::show(&name, &settings, &config)?;
        }
        Commands::List { tests } => {
            cli::list(tests, &settings, &config)?;
        }
        Commands::Test { names, all } => {
            cli::test(names, all, &settings, &config, &cancel).await?;
        }
        Commands::Fix { name, max_attempts } => {
            cli::fix(&name, max_attempts, &settings, &config, &cancel).await?;
        }
        Commands::ReviewPrompt(review_cmd) => match review_cmd {
            ReviewPromptCommands::Show => {
                cli::review_prompt_show(&settings)?;
            }
            ReviewPromptCommands::Set { file } => {
                cli::review_prompt_set(file, &settings, &config)?;
            }
            ReviewPromptCommands::Reset => {
                cli::review_prompt_reset(&settings, &config)?;
            }
        },
    }

    Ok(())
}
