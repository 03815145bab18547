use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use map_reduce_rs::mr::coordinator::Coordinator;
use map_reduce_rs::mr::rpc::{default_socket_path, Server};
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};
use tokio::time::sleep;
use tracing::info;

/// Launches the MapReduce coordinator: registers one map task per input
/// file, serves the RPC surface, and exits once every task has finished.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input files, one map task per file.
    #[arg(required = true)]
    files: Vec<String>,

    /// Number of reduce tasks (R).
    #[arg(long, short = 'r')]
    n_reduce: usize,

    /// Seconds a task may run before the coordinator reclaims it.
    #[arg(long, default_value_t = 10)]
    reclaim_timeout_secs: u64,

    /// Local transport path. Defaults to `/var/tmp/824-mr-<uid>`.
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let socket_path = args.socket.unwrap_or_else(|| PathBuf::from(default_socket_path()));
    // The socket file is removed before binding, per spec.md §6.
    let _ = std::fs::remove_file(&socket_path);

    info!(
        n_map = args.files.len(),
        n_reduce = args.n_reduce,
        socket = %socket_path.display(),
        "starting coordinator"
    );

    let coordinator = Coordinator::new(
        args.files,
        args.n_reduce,
        Duration::from_secs(args.reclaim_timeout_secs),
    );

    let server_transport = tarpc::serde_transport::unix::listen(&socket_path, Json::default)
        .await
        .with_context(|| format!("binding local socket at {}", socket_path.display()))?;

    let coordinator_for_server = coordinator.clone();
    tokio::spawn(
        server_transport
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(coordinator_for_server.serve()),
    );

    info!("coordinator listening, waiting for workers");

    while !coordinator.done() {
        sleep(Duration::from_secs(1)).await;
    }

    info!("all tasks finished, coordinator exiting");
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
