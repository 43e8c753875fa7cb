use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{utils::*, EventLog, ServiceClient};
use election_core::projector::Projection;
use election_core::state::{Address, ElectionId, Timestamp};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::runtime::Builder;

#[derive(Clone, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, env, default_value = "http://localhost:3000")]
    pub service_url: String,

    #[arg(long, env)]
    pub ingest_auth_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Clone)]
pub enum Commands {
    /// Replay an event log locally and print a view of the result
    Replay {
        #[arg(long, env, help = "Path to the event log, or - for stdin")]
        read_path: PathBuf,

        #[arg(long, help = "Force gzip on or off; defaults to a .gz extension check")]
        is_compressed: Option<bool>,

        #[arg(long, help = "Election to print")]
        election_id: Option<ElectionId>,

        #[arg(long, value_parser = parse_view, default_value = "ranking", help = "View: candidates | ranking | winner | warnings")]
        view: View,
    },
    /// Replay an event log locally and check one actor's eligibility
    ReplayCanVote {
        #[arg(long, env)]
        read_path: PathBuf,

        #[arg(long)]
        is_compressed: Option<bool>,

        #[arg(long)]
        election_id: ElectionId,

        #[arg(long, value_parser = parse_address)]
        actor: Address,

        #[arg(long, help = "Unix seconds")]
        now: Timestamp,
    },
    /// Push an event log to the indexer service in batches
    PushEvents {
        #[arg(long, env)]
        read_path: PathBuf,

        #[arg(long)]
        is_compressed: Option<bool>,

        #[arg(long, default_value = "500")]
        batch_size: usize,
    },
    Meta {},
    Candidates {
        #[arg(long)]
        election_id: ElectionId,
    },
    Ranking {
        #[arg(long)]
        election_id: ElectionId,
    },
    Winner {
        #[arg(long)]
        election_id: ElectionId,
    },
    CanVote {
        #[arg(long)]
        election_id: ElectionId,

        #[arg(long, value_parser = parse_address)]
        actor: Address,

        #[arg(long, help = "Unix seconds; the service clock when omitted")]
        now: Option<Timestamp>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Without `--election-id` the log must hold exactly one election.
fn replay_view(projection: &Projection, election_id: Option<ElectionId>, view: View) -> Result<Value> {
    let resolve = || -> Result<ElectionId> {
        if let Some(id) = election_id {
            return Ok(id);
        }
        let ids: Vec<ElectionId> = projection.elections().map(|p| p.election().id).collect();
        match ids.as_slice() {
            [only] => Ok(*only),
            _ => Err(anyhow!(
                "Log contains elections {:?}; pass --election-id",
                ids
            )),
        }
    };
    let missing = |id: ElectionId| anyhow!("Election {} not in log", id);

    let value = match view {
        View::Warnings => serde_json::to_value(projection.warnings())?,
        View::Candidates => {
            let id = resolve()?;
            serde_json::to_value(projection.active_candidates(id).ok_or_else(|| missing(id))?)?
        }
        View::Ranking => {
            let id = resolve()?;
            serde_json::to_value(projection.ranking(id).ok_or_else(|| missing(id))?)?
        }
        View::Winner => {
            let id = resolve()?;
            serde_json::to_value(projection.winner(id).ok_or_else(|| missing(id))?)?
        }
    };
    Ok(value)
}

fn load_log(read_path: &Path, is_compressed: Option<bool>) -> Result<EventLog> {
    let log = if read_path.as_os_str() == "-" {
        EventLog::from_reader(std::io::stdin().lock())?
    } else {
        EventLog::read(read_path, is_compressed)?
    };
    info!("Loaded {} events from {}", log.events.len(), read_path.display());
    Ok(log)
}

fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(false)
        .try_init();

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let cli = Cli::parse();
    let client = ServiceClient::new(&cli.service_url, cli.ingest_auth_token.clone());

    match cli.command {
        // === Offline ===
        Commands::Replay {
            read_path,
            is_compressed,
            election_id,
            view,
        } => {
            let log = load_log(&read_path, is_compressed)?;
            let (projection, report) = log.replay();
            info!(
                "Replayed: applied={} duplicates={} skipped={} reordered={}",
                report.applied,
                report.duplicates,
                report.skipped.len(),
                report.reordered
            );

            print_json(&replay_view(&projection, election_id, view)?)?;
        }
        Commands::ReplayCanVote {
            read_path,
            is_compressed,
            election_id,
            actor,
            now,
        } => {
            let (projection, _) = load_log(&read_path, is_compressed)?.replay();
            if projection.election(election_id).is_none() {
                warn!("Election {} not in log", election_id);
            }
            let eligible = projection.can_actor_vote(election_id, &actor, now);
            print_json(&serde_json::json!({
                "election_id": election_id,
                "actor": actor,
                "now": now,
                "eligible": eligible,
            }))?;
        }

        // === Service ===
        Commands::PushEvents {
            read_path,
            is_compressed,
            batch_size,
        } => {
            let log = load_log(&read_path, is_compressed)?;
            runtime.block_on(async {
                for (i, batch) in log.batches(batch_size).enumerate() {
                    let report = client.push_events(batch).await?;
                    info!("Batch {}: {}", i, report);
                }
                Ok::<_, anyhow::Error>(())
            })?;
        }
        Commands::Meta {} => print_json(&runtime.block_on(client.meta())?)?,
        Commands::Candidates { election_id } => {
            print_json(&runtime.block_on(client.candidates(election_id))?)?
        }
        Commands::Ranking { election_id } => {
            print_json(&runtime.block_on(client.ranking(election_id))?)?
        }
        Commands::Winner { election_id } => {
            print_json(&runtime.block_on(client.winner(election_id))?)?
        }
        Commands::CanVote {
            election_id,
            actor,
            now,
        } => print_json(&runtime.block_on(client.eligibility(election_id, &actor, now))?)?,
    }

    Ok(())
}
