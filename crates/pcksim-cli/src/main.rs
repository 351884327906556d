use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use pcksim_core::{expand_home, load_config, LlmRouter, PckGrader, Registry, SessionConfig};
use pcksim_memory::{FileSessionStore, SessionStore};
use pcksim_provider::{
    create_provider, register_stub_providers, ProviderRegistry, ProviderType,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod repl;
mod sessions;

#[derive(Parser)]
#[command(
    name = "pcksim",
    version,
    about = "Classroom roleplay simulator for practising geometry teaching"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "~/.pcksim",
        help = "Data root (contains config.yaml, sessions/ and logs/)"
    )]
    data_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Teach an interactive session")]
    Chat {
        #[arg(long, help = "Scenario id (random when omitted)")]
        scenario: Option<String>,
        #[arg(
            long,
            value_delimiter = ',',
            help = "Comma-separated student names (defaults to the first num_students personas)"
        )]
        students: Vec<String>,
        #[arg(long, help = "Seed for the random scenario choice")]
        seed: Option<u64>,
    },
    #[command(subcommand, about = "Inspect stored session logs")]
    Sessions(SessionCommands),
    #[command(about = "Write the end-of-session analysis for a stored session")]
    Summary {
        #[arg(help = "Session id")]
        id: String,
    },
    #[command(about = "List personas, scenarios and PCK skills")]
    Catalog,
    #[command(about = "Validate config and catalog")]
    Validate,
}

#[derive(Subcommand)]
enum SessionCommands {
    #[command(about = "List stored sessions, newest first")]
    List,
    #[command(about = "Print a session transcript")]
    Show {
        id: String,
        #[arg(long, help = "Print the raw session log as JSON")]
        json: bool,
    },
    #[command(about = "Delete a stored session")]
    Delete { id: String },
    #[command(about = "Export a session log to a directory")]
    Export {
        id: String,
        #[arg(long, default_value = ".", help = "Output directory")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_root = resolve_data_root(&cli.data_root);

    let log_dir = data_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pcksim.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&data_root)?;
            let registry = Registry::from_config(&config)?;
            let warnings = registry.validate()?;
            println!(
                "Config valid. {} providers, {} personas, {} scenarios, {} skills.",
                config.providers.len(),
                registry.personas().len(),
                registry.scenarios().len(),
                registry.skills().len()
            );
            for warning in warnings {
                println!("  warning: {warning}");
            }
        }
        Commands::Catalog => {
            let config = load_config(&data_root)?;
            print_catalog(&Registry::from_config(&config)?);
        }
        Commands::Chat {
            scenario,
            students,
            seed,
        } => {
            let app = App::bootstrap(&data_root)?;
            repl::run_chat(app, scenario.as_deref(), &students, seed).await?;
        }
        Commands::Sessions(cmd) => {
            let config = load_config(&data_root)?;
            let store = FileSessionStore::new(config.sessions_dir());
            sessions::handle_sessions_command(&store, cmd).await?;
        }
        Commands::Summary { id } => {
            let app = App::bootstrap(&data_root)?;
            run_summary(&app, &id).await?;
        }
    }

    Ok(())
}

fn resolve_data_root(raw: &Path) -> PathBuf {
    match raw.to_str() {
        Some(s) => expand_home(s),
        None => raw.to_path_buf(),
    }
}

/// Everything a model-backed command needs.
pub(crate) struct App {
    pub config: Arc<SessionConfig>,
    pub registry: Arc<Registry>,
    pub router: Arc<LlmRouter>,
    pub store: Arc<FileSessionStore>,
}

impl App {
    fn bootstrap(data_root: &Path) -> Result<Self> {
        let config = load_config(data_root)?;
        let registry = Registry::from_config(&config)?;
        let providers = build_provider_registry(&config)?;
        let store = FileSessionStore::new(config.sessions_dir());
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            router: Arc::new(LlmRouter::new(providers)),
            store: Arc::new(store),
        })
    }
}

/// Real providers where a key is configured; the offline stub everywhere else.
fn build_provider_registry(config: &SessionConfig) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        if provider.provider_type != ProviderType::Stub && !provider.has_api_key() {
            tracing::warn!(
                provider = %provider.id,
                "no API key configured, using the offline stub; students will only stall"
            );
            register_stub_providers(&mut registry, [provider.id.as_str()]);
            continue;
        }
        registry.register(&provider.id, create_provider(provider)?);
        tracing::info!("Registered provider: {} ({:?})", provider.id, provider.provider_type);
    }
    Ok(registry)
}

async fn run_summary(app: &App, id: &str) -> Result<()> {
    let session = app
        .store
        .load_session(id)
        .await?
        .ok_or_else(|| anyhow!("session not found: {id}"))?;
    if session.turns.is_empty() {
        return Err(anyhow!("session {id} has no teacher turns to summarize"));
    }

    let grader = PckGrader::new(
        app.router.clone(),
        app.config.grader_model.clone(),
        app.config.summary_model.clone(),
    );
    let summary = grader.summarize(&session, &app.registry).await?;
    app.store.save_summary(id, &summary).await?;
    println!("{summary}");
    Ok(())
}

fn print_catalog(registry: &Registry) {
    println!("Personas:");
    for persona in registry.personas() {
        println!(
            "  {:<10} [{}] {}",
            persona.name,
            persona.participation.baseline.as_str(),
            first_line(&persona.description)
        );
    }
    println!();
    println!("Scenarios:");
    for scenario in registry.scenarios() {
        let title = scenario
            .name
            .as_deref()
            .unwrap_or_else(|| first_line(&scenario.text));
        println!(
            "  {:<28} opened by {:<8} {}",
            scenario.id,
            scenario.initiated_by.as_str(),
            title
        );
    }
    println!();
    println!("PCK skills:");
    for skill in registry.skills() {
        println!("  {:<40} {}", skill.skill_id, skill.skill_name.preferred());
    }
}

pub(crate) fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
