use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use mapscrape::app::job_store::{JobStore, LocalFsJobStore};
use mapscrape::app::queue::InProcessQueue;
use mapscrape::app::routes::{AppState, router};
use mapscrape::app::runner::{BrowserExecutor, JobRunner};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Job status directory.
    #[arg(long, default_value = "workspace-app")]
    data_dir: PathBuf,

    /// Output directory for links files and record logs.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    mapscrape::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting mapscrape-app");

    let job_store: Arc<dyn JobStore> = Arc::new(LocalFsJobStore::new(&args.data_dir));
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&job_store),
        Arc::new(BrowserExecutor),
    ));
    let app = router(AppState {
        out_dir: args.out_dir,
        job_store,
        // One browser session at a time.
        queue: InProcessQueue::new(1),
        runner,
    });

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
