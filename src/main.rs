use clap::{Parser, Subcommand};
use notebook_pilot::operations::NOT_AUTHENTICATED;
use notebook_pilot::{Config, GuideType, NotebookClient, PilotError, SourceType};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncBufReadExt;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Drive NotebookLM through a signed-in Chrome profile.
#[derive(Parser)]
#[command(name = "notebook-pilot")]
#[command(version)]
struct Cli {
    /// Chrome profile directory holding the signed-in session
    #[arg(long, global = true)]
    profile_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// JSON file overriding selector candidates per slot
    #[arg(long, global = true)]
    selectors: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a visible browser to sign in and store the session in the profile
    Login,
    /// Report configuration without launching a browser
    Health,
    /// List notebooks with their ids
    List,
    /// Create a notebook
    Create { name: String },
    /// Add a website, YouTube or text source to a notebook
    AddSource {
        notebook_id: String,
        /// website, youtube or text
        source_type: SourceType,
        /// URL for website/youtube, raw text for text
        content: String,
    },
    /// Ask a question against a notebook's sources
    Query { notebook_id: String, query: String },
    /// Start generating a study guide
    StudyGuide {
        notebook_id: String,
        /// faq, briefing_doc or table_of_contents
        guide_type: GuideType,
    },
    /// Start generating an audio overview
    Audio { notebook_id: String },
    /// List the sources of a notebook
    Sources { notebook_id: String },
}

#[derive(Serialize)]
struct Answer<'a> {
    notebook_id: &'a str,
    answer: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_authentication() => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), PilotError> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.profile_dir {
        config.browser.profile_dir = dir;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(path) = cli.selectors {
        config.catalog_path = Some(path);
    }

    let client = NotebookClient::new(config)?;

    match cli.command {
        Command::Login => {
            eprintln!("Sign in to NotebookLM in the browser window, then press Enter here.");
            let signed_in = client.login(wait_for_enter()).await?;
            if !signed_in {
                return Err(PilotError::Authentication(NOT_AUTHENTICATED.to_string()));
            }
            eprintln!(
                "Signed in. Session stored in {}",
                client.config().browser.profile_dir.display()
            );
            Ok(())
        }
        Command::Health => print_json(&client.health()),
        Command::List => print_json(&client.list_notebooks().await?),
        Command::Create { name } => print_json(&client.create_notebook(&name).await?),
        Command::AddSource {
            notebook_id,
            source_type,
            content,
        } => print_json(
            &client
                .add_source(&notebook_id, source_type, &content)
                .await?,
        ),
        Command::Query { notebook_id, query } => {
            let answer = client.query_notebook(&notebook_id, &query).await?;
            print_json(&Answer {
                notebook_id: &notebook_id,
                answer,
            })
        }
        Command::StudyGuide {
            notebook_id,
            guide_type,
        } => print_json(
            &client
                .generate_study_guide(&notebook_id, guide_type)
                .await?,
        ),
        Command::Audio { notebook_id } => {
            print_json(&client.generate_audio_overview(&notebook_id).await?)
        }
        Command::Sources { notebook_id } => {
            print_json(&client.get_notebook_sources(&notebook_id).await?)
        }
    }
}

async fn wait_for_enter() {
    let mut line = String::new();
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    if let Err(e) = stdin.read_line(&mut line).await {
        warn!(error = %e, "could not read from stdin, checking sign-in now");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PilotError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
