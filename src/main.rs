// src/main.rs
// CLI entrypoint: `sync` runs the background scheduler against the
// upstream workspace, `chat` starts an interactive REPL driving the agent.

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use attendant::agent::Agent;
use attendant::agent::prompt::RESUME_STATUS_PROMPT;
use attendant::agent::state::AgentState;
use attendant::config::CONFIG;
use attendant::embeddings::HttpEmbeddingProvider;
use attendant::formatting::EntityResolver;
use attendant::llm::build_provider;
use attendant::persistence::{PreferenceStorage, SessionStorage, default_storage_dir};
use attendant::rate_gate::RateGate;
use attendant::scheduler::Scheduler;
use attendant::store::Store;
use attendant::sync_worker::SyncWorker;
use attendant::upstream::{HttpUpstreamClient, UpstreamApi};

const ENTITY_CACHE_TTL_SECONDS: u64 = 300;

#[derive(Parser)]
#[command(name = "attendant", about = "A personal workspace assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background sync loop against the upstream workspace.
    Sync,
    /// Start an interactive chat session with the agent.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(CONFIG.logging.filter.clone()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Sync => run_sync().await,
        Command::Chat => run_chat().await,
    }
}

fn build_upstream_client() -> anyhow::Result<HttpUpstreamClient> {
    HttpUpstreamClient::new(
        CONFIG.upstream.base_url.clone(),
        CONFIG.upstream.api_token.clone(),
        CONFIG.upstream.link_host.clone(),
    )
}

async fn run_sync() -> anyhow::Result<()> {
    let store = Arc::new(Store::connect(&CONFIG).await?);
    let upstream = Arc::new(build_upstream_client()?);
    let rate_gate = Arc::new(RateGate::new());
    let self_user_id = upstream.auth_test().await?;

    let sync_worker = Arc::new(SyncWorker::new(upstream.clone(), store.clone(), rate_gate));
    let mut scheduler = Scheduler::new(upstream, store, sync_worker, CONFIG.scheduler.clone(), self_user_id);
    scheduler.run().await;
    Ok(())
}

async fn run_chat() -> anyhow::Result<()> {
    let store = Arc::new(Store::connect(&CONFIG).await?);
    let upstream = Arc::new(build_upstream_client()?);
    let rate_gate = Arc::new(RateGate::new());
    let self_user_id = upstream.auth_test().await?;
    let upstream: Arc<dyn UpstreamApi> = upstream;

    let resolver = Arc::new(EntityResolver::new(store.clone(), ENTITY_CACHE_TTL_SECONDS));
    let embeddings = Arc::new(HttpEmbeddingProvider::new(&CONFIG.embedding));
    let llm = build_provider(&CONFIG.llm);

    let storage_dir = default_storage_dir();
    let pref_storage = PreferenceStorage::new(&storage_dir);
    let prefs = pref_storage.load();
    let session_storage = SessionStorage::new(&storage_dir);
    let (session, resumed) = session_storage.get_or_create()?;

    let state = Arc::new(AgentState {
        store,
        resolver,
        upstream,
        rate_gate,
        embeddings,
        user_id: self_user_id,
        prefs: Mutex::new(prefs),
        pref_storage,
        session: Mutex::new(session),
        session_storage,
    });

    let mut agent = Agent::new(llm, state, CONFIG.context.clone());

    println!("attendant is ready. Type a message, or 'exit' to quit.");
    let opening = if resumed {
        agent.process_message(RESUME_STATUS_PROMPT).await?
    } else {
        agent.initialize().await?
    };
    println!("{}", opening.text);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let response = agent.process_message(line).await?;
        println!("{}", response.text);
    }

    Ok(())
}
