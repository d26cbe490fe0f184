use anyhow::{Result, anyhow};
use atomidx::cli::{self, RepoArgs, TuningArgs};
use atomidx::config::Config;
use atomidx::db::{AtomFilter, Db};
use atomidx::indexer::{self, scan::ScanOptions};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn default_db_path(repo: &Path) -> PathBuf {
    repo.join(".atomidx").join("atoms.sqlite")
}

fn db_path(repo: &RepoArgs) -> PathBuf {
    repo.db.clone().unwrap_or_else(|| default_db_path(&repo.repo))
}

fn open_indexer(repo: &RepoArgs, tuning: &TuningArgs) -> Result<indexer::Indexer> {
    let mut config = Config::from_env();
    if let Some(workers) = tuning.workers {
        config.workers = workers;
    }
    if let Some(batch_rows) = tuning.batch_rows {
        config.batch_rows = batch_rows.max(1);
    }
    let scan_options = ScanOptions::new(tuning.no_ignore, config.max_file_size_bytes());
    let indexer = indexer::Indexer::new_with_config(repo.repo.clone(), db_path(repo), config)?;
    Ok(indexer.with_scan_options(scan_options))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("atomidx=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Reindex { repo, tuning } => {
            let mut indexer = open_indexer(&repo, &tuning)?;
            print_json(&indexer.reindex()?)
        }
        cli::Command::Sync {
            repo,
            tuning,
            paths,
        } => {
            let mut indexer = open_indexer(&repo, &tuning)?;
            print_json(&indexer.sync(&paths)?)
        }
        cli::Command::Relink { repo } => {
            let mut indexer = open_indexer(&repo, &TuningArgs::default())?;
            print_json(&indexer.relink()?)
        }
        cli::Command::ChangedFiles { repo, no_ignore } => {
            let tuning = TuningArgs {
                no_ignore,
                ..TuningArgs::default()
            };
            let indexer = open_indexer(&repo, &tuning)?;
            print_json(&indexer.changed_files()?)
        }
        cli::Command::Overview { repo } => {
            let db = Db::new(&db_path(&repo))?;
            let root = std::fs::canonicalize(&repo.repo).unwrap_or(repo.repo.clone());
            print_json(&db.overview(&root)?)
        }
        cli::Command::Atoms {
            repo,
            file,
            archetype,
            purpose,
            removed,
            limit,
        } => {
            let db = Db::new(&db_path(&repo))?;
            let atoms = db.list_atoms(&AtomFilter {
                file_path: file,
                archetype,
                purpose,
                include_removed: removed,
                limit,
            })?;
            print_json(&atoms)
        }
        cli::Command::Atom { repo, id } => {
            let db = Db::new(&db_path(&repo))?;
            let atom = db
                .get_atom(&id)?
                .ok_or_else(|| anyhow!("no atom with id {id}"))?;
            let outgoing = db.relations_from(&id)?;
            let incoming = db.relations_to(&id)?;
            print_json(&json!({
                "atom": atom,
                "relations": { "outgoing": outgoing, "incoming": incoming },
            }))
        }
    }
}
