use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use map_reduce_rs::mr::error::MrError;
use map_reduce_rs::mr::function::wc;
use map_reduce_rs::mr::rpc::{default_socket_path, ServerClient};
use map_reduce_rs::mr::worker::{worker_identity, Worker};
use tarpc::{client, context, tokio_serde::formats::Json};
use tokio::time::sleep;
use tracing::{info, warn};

/// Runs the worker loop from `spec.md` §4.4: poll the coordinator for a
/// task, execute it locally, report completion, repeat.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Local transport path. Defaults to `/var/tmp/824-mr-<uid>`.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// How long to sleep between polls when no task is available.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let socket_path = args.socket.unwrap_or_else(|| PathBuf::from(default_socket_path()));
    let poll_interval = Duration::from_millis(args.poll_interval_ms);

    let client_transport = tarpc::serde_transport::unix::connect(&socket_path, Json::default)
        .await
        .with_context(|| format!("connecting to coordinator at {}", socket_path.display()))?;
    let client = ServerClient::new(client::Config::default(), client_transport).spawn();

    let worker_id = worker_identity();
    let worker = Worker::new(wc::map, wc::reduce);
    info!(worker_id, "worker starting");

    loop {
        let task = match client.get_task(context::current(), worker_id.clone()).await {
            Ok(Ok(task)) => task,
            Ok(Err(MrError::NoTaskAvailable)) => {
                sleep(poll_interval).await;
                continue;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "coordinator rejected request, exiting");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "unreachable coordinator, exiting");
                return Ok(());
            }
        };

        info!(?task, "executing task");
        if let Err(e) = worker.execute(&task) {
            // Local I/O or user-function failure: abandon the task and let
            // the coordinator reclaim it after T_reclaim (spec.md §7).
            warn!(error = %e, handle = task.handle, "task failed locally, abandoning");
            continue;
        }

        match client
            .finish(context::current(), task.task_type, task.handle)
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "finish reported a protocol error"),
            Err(e) => warn!(error = %e, "finish call failed to deliver"),
        }
    }
}
