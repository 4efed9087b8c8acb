//! swarm - CLI entry point.
//!
//! Exposes the swarm operations as subcommands. Exit codes distinguish the
//! three outcomes: 0 for success, 1 for failure, 2 for a degraded result
//! (monitoring window elapsed with agents still running).

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use swarmthink::supervisor::ProcessSupervisor;
use swarmthink::{AgentRegistry, Config, Role, SwarmOrchestrator, WorkspaceStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "swarm", about = "Sequential thinking & ultrathink agent swarm")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the swarm and announce every agent
    Init,
    /// Run the full two-phase thinking protocol on a problem
    Think { problem: String },
    /// Show the current swarm status snapshot
    Status,
    /// List the capabilities of every registered role
    Capabilities,
    /// Launch a single agent process for a role
    Launch {
        role: Role,
        #[arg(default_value = "Individual agent thinking task")]
        task: String,
    },
    /// Launch a full process swarm, monitor it, and clean it up
    SwarmRun {
        task: String,
        /// Monitoring window in seconds (defaults to the configured window)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Monitor previously launched agents until exit or timeout
    Monitor {
        #[arg(required = true)]
        agent_ids: Vec<String>,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Terminate agents and forget their handles
    Cleanup {
        #[arg(required = true)]
        agent_ids: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swarmthink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = Arc::new(WorkspaceStore::new(config.workspace_root.clone()));
    store.initialize().await?;
    let registry = AgentRegistry::standard();

    match cli.command {
        Command::Init => {
            let mut orchestrator = SwarmOrchestrator::new(registry, store);
            let init = orchestrator.initialize_swarm().await?;
            print_json(&init)?;
        }
        Command::Think { problem } => {
            info!("starting swarm sequential thinking");
            let mut orchestrator = SwarmOrchestrator::new(registry, store);
            let result = orchestrator.execute_sequential_swarm_thinking(&problem).await?;
            print_json(&result)?;
        }
        Command::Status => {
            let orchestrator = SwarmOrchestrator::new(registry, store);
            let status = orchestrator.get_swarm_status().await;
            print_json(&status)?;
        }
        Command::Capabilities => {
            let supervisor = ProcessSupervisor::new(config, registry, store);
            print_json(&supervisor.capabilities())?;
        }
        Command::Launch { role, task } => {
            let supervisor = ProcessSupervisor::new(config, registry, store);
            let agent_id = supervisor.launch(role, &task).await?;
            println!("{agent_id}");
        }
        Command::SwarmRun { task, timeout } => {
            let window = timeout
                .map(Duration::from_secs)
                .unwrap_or(config.monitor_timeout);
            let supervisor = ProcessSupervisor::new(config, registry.clone(), store);
            let agent_ids = supervisor
                .launch_swarm(&task, &registry.list_roles())
                .await?;
            let report = supervisor.monitor(&agent_ids, window).await;
            let degraded = !report.all_exited();
            print_json(&report)?;
            supervisor.cleanup(&agent_ids).await;
            if degraded {
                std::process::exit(2);
            }
        }
        Command::Monitor { agent_ids, timeout } => {
            let window = timeout
                .map(Duration::from_secs)
                .unwrap_or(config.monitor_timeout);
            let supervisor = ProcessSupervisor::new(config, registry, store);
            let report = supervisor.monitor(&agent_ids, window).await;
            let degraded = !report.all_exited();
            print_json(&report)?;
            if degraded {
                std::process::exit(2);
            }
        }
        Command::Cleanup { agent_ids } => {
            let supervisor = ProcessSupervisor::new(config, registry, store);
            let outcomes = supervisor.cleanup(&agent_ids).await;
            print_json(&outcomes)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
