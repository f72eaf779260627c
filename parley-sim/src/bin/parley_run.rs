//! `parley-run` — run one conversation among a handful of agents.
//!
//! ```text
//! parley-run --agent Lucky --agent Bob --db parley.sqlite
//! RUST_LOG=parley_sim=debug parley-run --config parley.toml --json-logs
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parley_core::config::ParleyConfig;
use parley_core::memory::VolatileMemoryStore;
use parley_core::persistence::ConversationLog;
use parley_core::world::InMemoryWorld;
use parley_core::{AgentId, MemoryStore};
use parley_llm::LlmDecider;
use parley_sim::{TurnScheduler, run_conversation};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "parley-run")]
#[command(version)]
#[command(about = "Drive a turn-based conversation between simulated agents", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent name, in turn order (repeatable)
    #[arg(short, long = "agent", default_values_t = ["Lucky".to_string(), "Bob".to_string()])]
    agents: Vec<String>,

    /// SQLite file for conversation memories (overrides the config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Built-in personas for the default cast; anyone else gets a plain one.
fn persona(name: &str) -> (String, String) {
    match name {
        "Lucky" => (
            "Lucky is always happy and curious, and he loves cheese. \
             He spends most of his time reading about the history of science."
                .into(),
            "You want to hear all the gossip.".into(),
        ),
        "Bob" => (
            "Bob is always grumpy and he loves trees. He spends most of his \
             time gardening by himself."
                .into(),
            "You don't like people. Avoid them.".into(),
        ),
        "Stella" => (
            "Stella can never be trusted. She tries to trick people all the \
             time, and she is incredibly charming."
                .into(),
            "You want to get rich.".into(),
        ),
        other => (
            format!("{other} lives in town and likes meeting new people."),
            "You want to get to know whoever is around.".into(),
        ),
    }
}

fn init_tracing(config: &ParleyConfig, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn memory_store(config: &ParleyConfig) -> anyhow::Result<Arc<dyn MemoryStore>> {
    match &config.persistence.path {
        Some(path) => {
            let log = ConversationLog::open(path, &config.persistence)
                .with_context(|| format!("opening conversation log at {}", path.display()))?;
            Ok(Arc::new(log))
        }
        None => Ok(Arc::new(VolatileMemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ParleyConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ParleyConfig::default(),
    };
    if let Some(db) = cli.db {
        config.persistence.path = Some(db);
    }
    init_tracing(&config, cli.json_logs || config.general.json_logs);

    let world = Arc::new(InMemoryWorld::new());
    let agents: Vec<AgentId> = cli
        .agents
        .iter()
        .map(|name| {
            let (identity, plan) = persona(name);
            world.register_agent(name.as_str(), identity, plan)
        })
        .collect();

    let decider = match LlmDecider::from_config(&config) {
        Ok(decider) => decider,
        Err(e) => {
            warn!(error = %e, "LLM unavailable, using conversation templates");
            LlmDecider::templates_only(config.conversation.clone())
        }
    };
    let memory = memory_store(&config)?;

    info!(
        agents = ?cli.agents,
        provider = %config.llm.provider,
        db = ?config.persistence.path,
        "Starting conversation run"
    );

    let scheduler = TurnScheduler::new(world.clone(), Arc::new(decider), world.clone(), memory)
        .with_config(config.scheduler.clone());
    let report = run_conversation(&scheduler, &agents).await?;

    if let Some(conversation) = world.conversation(report.conversation_id) {
        for message in &conversation.messages {
            println!("{}", message.render());
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
