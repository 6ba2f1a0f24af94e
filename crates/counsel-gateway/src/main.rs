//! Counsel: supervisor-routed multi-agent assistant service

use counsel_agent::{AppBuilder, FileSettingsStore, InMemorySessionStore, RunDriver, SettingsManager};
use counsel_gateway::{start_server, AppState, CounselConfig};
use counsel_llm::{AnthropicProvider, FilePromptStore, LlmProvider};
use counsel_tools::{CapabilityRegistry, SearchProvider, SerperSearch, ToolContext, UnconfiguredSearch};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "counsel", about = "Counsel multi-agent assistant service")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "counsel.toml", global = true)]
    config: PathBuf,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
    /// List tool registry keys usable from settings
    Tools,
    /// Show version
    Version,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "counsel=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);
    let mut config = CounselConfig::load(&cli.config);

    match cli.command.unwrap_or(Commands::Serve { port: None, bind: None }) {
        Commands::Serve { port, bind } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config).await?;
        }
        Commands::Config => print!("{}", config.to_toml()),
        Commands::Tools => {
            for key in CapabilityRegistry::builtin().keys() {
                println!("{}", key);
            }
        }
        Commands::Version => println!("counsel v{}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}

async fn serve(config: CounselConfig) -> anyhow::Result<()> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;
    let mut anthropic = AnthropicProvider::new(&api_key);
    if let Some(url) = &config.model.base_url {
        info!("Using custom API URL: {}", url);
        anthropic = anthropic.with_base_url(url.clone());
    }
    let provider: Arc<dyn LlmProvider> = Arc::new(anthropic);

    let search: Arc<dyn SearchProvider> = match std::env::var("SERPER_API_KEY") {
        Ok(key) => {
            let mut serper = SerperSearch::new(key);
            if let Some(endpoint) = &config.search.endpoint {
                serper = serper.with_endpoint(endpoint.clone());
            }
            Arc::new(serper)
        }
        Err(_) => {
            warn!("SERPER_API_KEY not set, web search is disabled");
            Arc::new(UnconfiguredSearch)
        }
    };

    let tools = ToolContext::new(provider, Arc::new(FilePromptStore::new(&config.prompts.dir)))
        .with_model(config.model_settings())
        .with_search(search);
    let registry = Arc::new(CapabilityRegistry::builtin());
    info!("Registered tools: {:?}", registry.keys());

    let builder = AppBuilder::new(registry, tools).with_config(config.graph);
    let memory = Arc::new(InMemorySessionStore::new(config.session_ttl()));
    spawn_purge(memory.clone(), config.memory.purge_interval_secs);

    let driver = RunDriver::new(builder, memory);
    let settings = SettingsManager::new(Arc::new(FileSettingsStore::new(&config.settings.dir)));

    start_server(&config, Arc::new(AppState::new(driver, settings))).await
}

fn spawn_purge(memory: Arc<InMemorySessionStore>, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let removed = memory.purge_expired();
            if removed > 0 {
                info!(removed, "Expired sessions purged");
            }
        }
    });
}
