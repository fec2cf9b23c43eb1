use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    mapscrape::logging::init().context("init logging")?;

    let cli = mapscrape::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        mapscrape::cli::Command::Run(args) => {
            let summary = mapscrape::pipeline::run(args).await.context("run")?;
            if let Some(cleaned) = summary.cleaned_path {
                println!("{}", cleaned.display());
            }
        }
        mapscrape::cli::Command::Collect(args) => {
            let path = mapscrape::pipeline::collect(args).await.context("collect")?;
            println!("{}", path.display());
        }
        mapscrape::cli::Command::Details(args) => {
            let report = mapscrape::pipeline::details(args).await.context("details")?;
            tracing::info!(
                scraped = report.scraped,
                skipped = report.skipped,
                failed = report.failed.len(),
                "details done"
            );
        }
        mapscrape::cli::Command::Normalize(args) => {
            mapscrape::pipeline::normalize(args).context("normalize")?;
        }
    }

    Ok(())
}
