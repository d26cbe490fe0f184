use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "atomidx",
    version,
    about = "Function-level knowledge graph for JavaScript and TypeScript repositories",
    after_help = r#"Examples:
  atomidx reindex --repo .
  atomidx sync --repo . src/api.js src/store.ts
  atomidx changed-files --repo .
  atomidx atoms --archetype god-function --limit 20
  atomidx atom "src/api.js::fetchUser"
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Repository and database location shared by every command.
#[derive(ClapArgs, Debug, Clone)]
pub struct RepoArgs {
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
    /// Database path; defaults to .atomidx/atoms.sqlite inside the repository.
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Overrides for the ATOMIDX_* environment configuration.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Include files ignored by .gitignore.
    #[arg(long)]
    pub no_ignore: bool,
    /// Upper bound on worker threads.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Rows per multi-row insert statement.
    #[arg(long)]
    pub batch_rows: Option<usize>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index the whole repository, skipping files whose hash is unchanged.
    Reindex {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Re-process the given files and relink the project.
    Sync {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Link and score stored atoms again without extracting.
    Relink {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Show changed files compared to DB state.
    ChangedFiles {
        #[command(flatten)]
        repo: RepoArgs,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Print a repository overview.
    Overview {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// List atoms, optionally filtered.
    Atoms {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        archetype: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        /// Include soft-removed atoms.
        #[arg(long)]
        removed: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one atom with its relation rows.
    Atom {
        #[command(flatten)]
        repo: RepoArgs,
        /// Atom id, `path::name` or `path::Owner.method`.
        id: String,
    },
}
