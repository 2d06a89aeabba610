use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use unbarred_core::config::{Config, StorageMode};
use unbarred_core::{AppState, Jurisdiction, PipelineError, PipelineEvent, Server};

#[derive(Parser)]
#[command(name = "unbarred")]
#[command(about = "Legal research assistant for California local law", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(short, long, help = "Address to bind (host:port), overrides the config")]
        bind: Option<String>,
    },

    #[command(about = "Ask a question and stream the answer")]
    Ask {
        question: String,

        #[arg(long, help = "Jurisdiction key or name (e.g. 'alameda', 'Sierra Madre')")]
        county: Option<String>,
    },

    #[command(about = "Export the documents matching a query as CSV")]
    Export {
        #[arg(short, long)]
        query: String,

        #[arg(long)]
        county: Option<String>,

        #[arg(short, long, help = "Output file (stdout when omitted)")]
        out: Option<PathBuf>,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(about = "List supported jurisdictions")]
    Jurisdictions,
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show the effective configuration")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => serve(&cli.config, bind).await,
        Commands::Ask { question, county } => ask(&cli.config, &question, county.as_deref()).await,
        Commands::Export { query, county, out } => {
            export(&cli.config, &query, county.as_deref(), out.as_deref()).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(&cli.config),
        },
        Commands::Jurisdictions => {
            list_jurisdictions();
            Ok(())
        }
    }
}

/// Reads the config file when present, then applies the environment.
fn read_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        Config::default()
    };
    Ok(config)
}

fn load_config(path: &Path) -> Result<Config> {
    read_config(path)?
        .with_env_overrides()
        .context("Invalid configuration")
}

async fn serve(config_path: &Path, bind: Option<String>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    println!("{} Serving on {}", "→".blue(), config.server.bind.bold());
    let server = Server::new(config).await.context("Failed to start server")?;
    server.start().await.context("Server error")?;
    Ok(())
}

async fn ask(config_path: &Path, question: &str, county: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let jurisdiction = parse_county(county)?;
    let state = AppState::from_config(&config).await?;

    let (mut events, _task) = state.pipeline.spawn(question.to_string(), jurisdiction);
    let mut stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::Chunk(text) => {
                write!(stdout, "{}", text)?;
                stdout.flush()?;
            }
            PipelineEvent::Done => {
                writeln!(stdout)?;
                break;
            }
            PipelineEvent::Failed(PipelineError::NoDocumentsForJurisdiction) => {
                println!(
                    "{}",
                    "No documents are indexed for that jurisdiction.".yellow()
                );
                break;
            }
            PipelineEvent::Failed(e) => {
                writeln!(stdout)?;
                anyhow::bail!("Failed to answer: {}", e);
            }
        }
    }

    Ok(())
}

async fn export(
    config_path: &Path,
    query: &str,
    county: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let jurisdiction = parse_county(county)?;
    let state = AppState::from_config(&config).await?;

    let csv = match state.exporter.export(query, jurisdiction).await {
        Ok(csv) => csv,
        Err(PipelineError::NoDocumentsForJurisdiction) => {
            eprintln!("{}", "No matching documents.".yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context("Export failed"),
    };

    match out {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

fn parse_county(county: Option<&str>) -> Result<Option<Jurisdiction>> {
    match county {
        None => Ok(None),
        Some(name) => Jurisdiction::parse(name).map(Some).with_context(|| {
            format!(
                "Unsupported jurisdiction '{}'. Run 'unbarred jurisdictions' for the list",
                name
            )
        }),
    }
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = read_config(config_path)?.merge_env();

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "Server:".bold());
    println!("  Bind:            {}", config.server.bind);
    println!(
        "  Public Base URL: {}",
        config.server.public_base_url.as_deref().unwrap_or("(any origin)")
    );
    println!();
    println!("{}", "Store:".bold());
    println!("  URL:             {}", or_unset(&config.store.url));
    println!("  API Key:         {}", mask(&config.store.api_key));
    match &config.store.storage_mode {
        StorageMode::Remote => println!("  Mode:            remote"),
        StorageMode::Memory { seed_path } => println!(
            "  Mode:            memory ({})",
            seed_path.as_deref().unwrap_or("empty")
        ),
    }
    println!("  Match Function:  {}", config.store.match_function);
    println!("  Embedding Fn:    {}", config.store.embedding_function);
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  API Key:         {}", mask(&config.llm.api_key));
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Max Tokens:      {}", config.llm.max_tokens);
    println!();
    println!("{}", "Pipeline:".bold());
    println!("  Match Threshold: {}", config.pipeline.match_threshold);
    println!("  Match Count:     {}", config.pipeline.match_count);
    println!("  Context Budget:  {} chars", config.pipeline.max_context_chars);
    println!("  Filter Mode:     {:?}", config.pipeline.filter_mode);
    println!("  Response Mode:   {:?}", config.pipeline.response_mode);
    println!("  Answer Format:   {:?}", config.pipeline.answer_format);
    println!("  Pre-flight:      {}", config.pipeline.preflight);
    println!("  Clarify First:   {}", config.pipeline.clarify_first);
    println!();
    println!("{}", "Export:".bold());
    println!("  Match Threshold: {}", config.export.match_threshold);
    println!("  Match Count:     {}", config.export.match_count);
    println!("  Filename:        {}", config.export.filename);

    Ok(())
}

fn list_jurisdictions() {
    println!("{}", "Supported jurisdictions:".bold().green());
    println!();
    for jurisdiction in Jurisdiction::ALL {
        println!(
            "  {} {:<18} {} ({})",
            "•".cyan(),
            jurisdiction.label().bold(),
            jurisdiction.key(),
            jurisdiction.kind()
        );
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

fn mask(secret: &str) -> String {
    match secret.char_indices().nth(4) {
        Some((end, _)) => format!("{}…", &secret[..end]),
        None if secret.is_empty() => "(unset)".to_string(),
        None => "****".to_string(),
    }
}
