mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use hoard_blob::ProcessStatus;
use hoard_classify::{Classifier, FileCommand};
use hoard_config::Config;
use hoard_index::{Database, Repository};
use hoard_library::{Context, OrganizeEvent};
use hoard_storage::FileSystem;
use std::process::ExitCode;
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return ExitCode::FAILURE;
        },
    };
    if let Err(err) = logging::init(&config.log) {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    tokio::select! {
        result = run(cli.command, &config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = ?err, "Command failed");
                ExitCode::FAILURE
            },
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            ExitCode::from(130)
        },
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Load { source } => {
            let status = filesystem(config)?.load(source);
            drain(&status).await;
            report(&status)
        },
        Command::Store { source } => {
            let fs = filesystem(config)?;
            let loaded = fs.load(source);
            let stored = fs.store(loaded.blobs());
            drain(&stored).await;
            loaded.wait().await;
            report(&loaded)?;
            report(&stored)
        },
        Command::Classify { source } => {
            let loaded = filesystem(config)?.load(source);
            let classified = classifier(config)?.classify(loaded.blobs());
            while let Ok(meta) = classified.recv().await {
                println!("{}", serde_json::to_string(&meta).or_raise(|| ErrorKind::Report)?);
            }
            loaded.wait().await;
            report(&loaded)
        },
        Command::Index { source } => {
            let fs = filesystem(config)?;
            let classifier = classifier(config)?;
            let db = database(config).await?;
            let report = hoard_library::index(&fs, &classifier, &db, config.index.batch_size, source)
                .await
                .or_raise(|| ErrorKind::Run)?;
            db.close().await;
            println!("{}", serde_json::to_string(&report.load).or_raise(|| ErrorKind::Report)?);
            Ok(())
        },
        Command::Organize { target, limit_gb } => {
            let db = database(config).await?;
            let repo = Repository::from(&db);
            let size_limit = limit_gb.map_or(config.organize.size_limit, |gb| gb.saturating_mul(GIB));
            let ctx = Context::new(target, size_limit);
            let mut events = std::pin::pin!(hoard_library::organize(&repo, &ctx));
            let mut failed = 0u64;
            while let Some(event) = events.next().await {
                match event {
                    Ok(OrganizeEvent::DiscoveryComplete(pending)) => tracing::info!(pending, "Organizing"),
                    Ok(OrganizeEvent::Organized(action)) => tracing::debug!(link = %action.link().display(), "Organized"),
                    Ok(OrganizeEvent::Complete { linked, size }) => {
                        println!(r#"{{"linked":{linked},"size":{size},"failed":{failed}}}"#);
                    },
                    Ok(_) => {},
                    Err(err) => {
                        failed += 1;
                        tracing::warn!(error = ?err, "Entry not linked");
                    },
                }
            }
            db.close().await;
            Ok(())
        },
    }
}

fn filesystem(config: &Config) -> Result<FileSystem> {
    let fs = FileSystem::new(&config.store.root, config.store.max_saver, config.load.max_loader)
        .or_raise(|| ErrorKind::Storage)?;
    Ok(fs.with_skip(config.load.skip()).with_verify_existing(config.store.verify_existing))
}

fn classifier(config: &Config) -> Result<Classifier> {
    let detector = match &config.classify.command {
        Some(path) => FileCommand::at(path),
        None => FileCommand::discover(),
    }
    .or_raise(|| ErrorKind::Classify)?;
    let classifier = Classifier::new(Arc::new(detector))
        .with_batch_size(config.classify.batch_size)
        .or_raise(|| ErrorKind::Classify)?
        .with_max_in_flight(config.classify.max_in_flight)
        .or_raise(|| ErrorKind::Classify)?;
    Ok(match &config.classify.work_dir {
        Some(dir) => classifier.with_work_dir(dir),
        None => classifier,
    })
}

async fn database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.index.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Index)?;
    }
    Database::connect(&config.index.database).await.or_raise(|| ErrorKind::Index)
}

/// Consume the output of a run until it is done.
async fn drain(status: &ProcessStatus) {
    let blobs = status.blobs();
    while blobs.recv().await.is_ok() {}
    status.wait().await;
}

fn report(status: &ProcessStatus) -> Result<()> {
    println!("{}", status.to_json().or_raise(|| ErrorKind::Report)?);
    Ok(())
}
