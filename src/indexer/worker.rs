//! Worker threads that extract disjoint slices of the repository.
//!
//! Each worker owns its `Db` handle, parsers and extractor registry, writes
//! its slice in one transaction and reports back over a channel. The
//! coordinator waits for every worker before linking.

use crate::config::Config;
use crate::db::Db;
use crate::error::IndexError;
use crate::indexer::atom_builder::{build_atoms, prune_to_lite};
use crate::indexer::batch::{BatchWriter, FileResult, relation_rows};
use crate::indexer::call_graph::link_intra_file;
use crate::indexer::differ::apply_lineage;
use crate::indexer::javascript::ParserSet;
use crate::indexer::registry::{ExtractorLevel, ExtractorRegistry};
use crate::indexer::scan::ScannedFile;
use crate::model::{Atom, FileRecord};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;

/// Everything a worker needs besides its slice.
#[derive(Debug, Clone)]
pub struct WorkerShared {
    pub db_path: PathBuf,
    pub config: Config,
    /// `path → hash` as stored before this run.
    pub stored_hashes: Arc<HashMap<String, String>>,
    pub now: i64,
}

/// What one worker produced for its slice.
#[derive(Debug, Default)]
pub struct WorkerOutput {
    pub worker: usize,
    /// Hash records of the files that were re-extracted.
    pub records: Vec<FileRecord>,
    /// Every atom of the slice: fresh, reloaded and newly soft-removed.
    pub atoms: Vec<Atom>,
    /// Ids of atoms this worker wrote; they must be persisted again after
    /// linking.
    pub written: Vec<String>,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed_atoms: usize,
    pub extractor_runs: usize,
    pub atoms_saved: usize,
    pub relations_saved: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub enum WorkerMessage {
    Progress { worker: usize, path: String },
    Done(Box<WorkerOutput>),
    Error { worker: usize, message: String },
}

/// Splits `files` into at most `workers` contiguous slices.
pub fn partition(files: Vec<ScannedFile>, workers: usize) -> Vec<Vec<ScannedFile>> {
    if files.is_empty() {
        return Vec::new();
    }
    let per_worker = files.len().div_ceil(workers.max(1));
    let mut slices = Vec::new();
    let mut rest = files;
    while !rest.is_empty() {
        let tail = rest.split_off(per_worker.min(rest.len()));
        slices.push(rest);
        rest = tail;
    }
    slices
}

/// Runs one thread per slice and blocks until all of them finished.
///
/// A worker that reports an error or panics aborts the whole run.
pub fn run_workers(shared: &WorkerShared, slices: Vec<Vec<ScannedFile>>) -> Result<Vec<WorkerOutput>> {
    let (tx, rx) = mpsc::channel::<WorkerMessage>();
    let mut handles = Vec::with_capacity(slices.len());
    for (worker, files) in slices.into_iter().enumerate() {
        let shared = shared.clone();
        let tx = tx.clone();
        let handle = thread::Builder::new()
            .name(format!("atomidx-worker-{worker}"))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    run_worker(worker, &shared, &files, &tx)
                }));
                let message = match outcome {
                    Ok(Ok(output)) => WorkerMessage::Done(Box::new(output)),
                    Ok(Err(err)) => WorkerMessage::Error {
                        worker,
                        message: format!("{err:#}"),
                    },
                    Err(_) => WorkerMessage::Error {
                        worker,
                        message: "worker panicked".to_string(),
                    },
                };
                let _ = tx.send(message);
            })
            .context("spawn worker thread")?;
        handles.push(handle);
    }
    drop(tx);

    let mut outputs = Vec::with_capacity(handles.len());
    let mut failure: Option<IndexError> = None;
    for message in rx {
        match message {
            WorkerMessage::Progress { worker, path } => {
                tracing::debug!("worker {worker}: {path}");
            }
            WorkerMessage::Done(output) => {
                tracing::debug!(
                    "worker {} done: {} extracted, {} skipped",
                    output.worker,
                    output.extracted,
                    output.skipped
                );
                outputs.push(*output);
            }
            WorkerMessage::Error { worker, message } => {
                failure.get_or_insert(IndexError::WorkerCrash { worker, message });
            }
        }
    }
    for (worker, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() {
            failure.get_or_insert(IndexError::WorkerCrash {
                worker,
                message: "thread panicked".to_string(),
            });
        }
    }
    if let Some(err) = failure {
        return Err(err.into());
    }
    outputs.sort_by_key(|output| output.worker);
    Ok(outputs)
}

struct WorkerContext {
    db: Db,
    parsers: ParserSet,
    registry: ExtractorRegistry,
    writer: BatchWriter,
}

fn run_worker(
    worker: usize,
    shared: &WorkerShared,
    files: &[ScannedFile],
    tx: &Sender<WorkerMessage>,
) -> Result<WorkerOutput> {
    let mut ctx = WorkerContext {
        db: Db::open(&shared.db_path, &shared.config)
            .with_context(|| format!("worker {worker}: open db"))?,
        parsers: ParserSet::new()?,
        registry: ExtractorRegistry::standard(),
        writer: BatchWriter::with_defaults(),
    };
    let mut output = WorkerOutput {
        worker,
        ..WorkerOutput::default()
    };

    for file in files {
        let _ = tx.send(WorkerMessage::Progress {
            worker,
            path: file.rel_path.clone(),
        });
        process_file(&mut ctx, shared, file, &mut output)?;
        if ctx.writer.should_flush() {
            flush(&mut ctx, &mut output)?;
        }
    }
    flush(&mut ctx, &mut output)?;
    Ok(output)
}

/// Extracts one file, or reloads its atoms when the digest is unchanged.
///
/// Storage errors propagate; read and parse failures degrade to a warning
/// and an empty extraction.
fn process_file(
    ctx: &mut WorkerContext,
    shared: &WorkerShared,
    file: &ScannedFile,
    output: &mut WorkerOutput,
) -> Result<()> {
    let path = file.rel_path.as_str();
    if shared.stored_hashes.get(path) == Some(&file.hash) {
        let atoms = ctx
            .db
            .get_by_file(path)
            .with_context(|| format!("reload atoms of {path}"))?;
        output.skipped += 1;
        ctx.writer.add(FileResult {
            record: record(file, &atoms, shared.now),
            atoms,
            relations: Vec::new(),
            skipped: true,
        });
        return Ok(());
    }

    let previous = ctx
        .db
        .get_by_file(path)
        .with_context(|| format!("load stored atoms of {path}"))?;
    let source = match crate::util::read_to_string(&file.abs_path) {
        Ok(source) => source,
        Err(err) => {
            degrade(ctx, shared, file, output, format!("{err:#}"), &previous);
            return Ok(());
        }
    };
    let parsed = match ctx.parsers.parse(&file.language, path, &source) {
        Ok(parsed) => parsed,
        Err(err) => {
            degrade(ctx, shared, file, output, format!("{err:#}"), &previous);
            return Ok(());
        }
    };

    let (file_context, file_warnings) = ctx.registry.run_file_level(&source, path);
    output.extractor_runs += ctx.registry.names(ExtractorLevel::File).len();
    output.warnings.extend(file_warnings);
    let built = build_atoms(path, &source, &parsed, &ctx.registry, &file_context, shared.now);
    output.extractor_runs += built.extractor_runs;
    output.warnings.extend(built.warnings);

    let mut atoms = built.atoms;
    link_intra_file(&mut atoms);
    let diff = apply_lineage(&previous, &mut atoms, shared.now);
    for atom in atoms.iter_mut() {
        prune_to_lite(atom);
    }
    output.removed_atoms += diff.removed.len();
    atoms.extend(diff.removed);

    let relations = atoms.iter().flat_map(relation_rows).collect();
    tracing::debug!("extracted {path}: {} atoms", atoms.len());
    output.extracted += 1;
    ctx.writer.add(FileResult {
        record: record(file, &atoms, shared.now),
        atoms,
        relations,
        skipped: false,
    });
    Ok(())
}

/// A file that could not be read or parsed extracts to nothing: its stored
/// live atoms are soft-removed and the new digest is recorded.
fn degrade(
    ctx: &mut WorkerContext,
    shared: &WorkerShared,
    file: &ScannedFile,
    output: &mut WorkerOutput,
    warning: String,
    previous: &[Atom],
) {
    let warning = format!("{}: {warning}", file.rel_path);
    tracing::warn!("{warning}");
    output.failed += 1;
    output.warnings.push(warning);

    let diff = apply_lineage(previous, &mut [], shared.now);
    let removed_ids: HashSet<&str> =
        diff.removed.iter().map(|atom| atom.id.as_str()).collect();
    let mut atoms: Vec<Atom> = previous
        .iter()
        .filter(|atom| !removed_ids.contains(atom.id.as_str()))
        .cloned()
        .collect();
    output.removed_atoms += diff.removed.len();
    atoms.extend(diff.removed);
    ctx.writer.add(FileResult {
        record: record(file, &atoms, shared.now),
        atoms,
        relations: Vec::new(),
        skipped: false,
    });
}

fn record(file: &ScannedFile, atoms: &[Atom], now: i64) -> FileRecord {
    FileRecord {
        path: file.rel_path.clone(),
        hash: file.hash.clone(),
        last_analyzed: now,
        atom_count: atoms.iter().filter(|atom| !atom.is_removed()).count() as i64,
    }
}

/// Writes buffered extractions in one transaction and hands every atom to
/// the output.
fn flush(ctx: &mut WorkerContext, output: &mut WorkerOutput) -> Result<()> {
    let pending = ctx.writer.take();
    if pending.is_empty() {
        return Ok(());
    }
    let mut atoms = Vec::new();
    let mut files = Vec::new();
    let mut rows = Vec::new();
    for result in pending.iter().filter(|result| !result.skipped) {
        atoms.extend(result.atoms.iter().cloned());
        files.push(result.record.path.clone());
        rows.extend(result.relations.iter().cloned());
    }
    if !files.is_empty() {
        let (atoms_saved, relations_saved) = ctx
            .db
            .write_extracted(&atoms, &files, &rows)
            .context("write worker batch")?;
        output.atoms_saved += atoms_saved;
        output.relations_saved += relations_saved;
    }
    for result in pending {
        if !result.skipped {
            output
                .written
                .extend(result.atoms.iter().map(|atom| atom.id.clone()));
            output.records.push(result.record);
        }
        output.atoms.extend(result.atoms);
    }
    Ok(())
}
