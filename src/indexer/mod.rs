use crate::config::Config;
use crate::db::{AtomFilter, Db};
use crate::indexer::differ::soft_remove;
use crate::indexer::scan::ScannedFile;
use crate::indexer::worker::{WorkerShared, partition, run_workers};
use crate::linker::{self, AtomGraph, DiskSource, ProjectFacts};
use crate::model::{Atom, ChangedFilesResult, IndexStats};
use crate::vectors;
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub mod atom_builder;
pub mod batch;
pub mod call_graph;
pub mod detectors;
pub mod differ;
pub mod extract;
pub mod javascript;
pub mod registry;
pub mod scan;
pub mod stable_id;
pub mod worker;

pub const LAST_INDEXED_KEY: &str = "last_indexed";

pub struct Indexer {
    repo_root: PathBuf,
    db: Db,
    config: Config,
    scan_options: scan::ScanOptions,
}

impl Indexer {
    pub fn new(repo_root: PathBuf, db_path: PathBuf) -> Result<Self> {
        Self::new_with_config(repo_root, db_path, Config::from_env())
    }

    pub fn new_with_config(repo_root: PathBuf, db_path: PathBuf, config: Config) -> Result<Self> {
        let repo_root = std::fs::canonicalize(&repo_root).unwrap_or(repo_root);
        let db = Db::open(&db_path, &config)?;
        let scan_options = scan::ScanOptions::new(false, config.max_file_size_bytes());
        Ok(Self {
            repo_root,
            db,
            config,
            scan_options,
        })
    }

    pub fn with_scan_options(mut self, scan_options: scan::ScanOptions) -> Self {
        self.scan_options = scan_options;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn changed_files(&self) -> Result<ChangedFilesResult> {
        let scanned = scan::scan_repo_with_options(&self.repo_root, self.scan_options)?;
        let existing_map = self.db.get_all_file_hashes()?;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut seen = HashSet::new();
        for file in scanned {
            seen.insert(file.rel_path.clone());
            match existing_map.get(&file.rel_path) {
                None => added.push(file.rel_path),
                Some(hash) if hash != &file.hash => modified.push(file.rel_path),
                _ => {}
            }
        }
        let mut deleted: Vec<String> = existing_map
            .keys()
            .filter(|path| !seen.contains(*path))
            .cloned()
            .collect();

        added.sort();
        modified.sort();
        deleted.sort();
        Ok(ChangedFilesResult {
            added,
            modified,
            deleted,
        })
    }

    /// Full run: every file of the repository, unchanged ones reloaded.
    pub fn reindex(&mut self) -> Result<IndexStats> {
        let started = Instant::now();
        let scanned = scan::scan_repo_with_options(&self.repo_root, self.scan_options)?;
        let stored = self.db.get_all_file_hashes()?;
        let seen: HashSet<&str> = scanned.iter().map(|file| file.rel_path.as_str()).collect();
        let mut deleted: Vec<String> = stored
            .keys()
            .filter(|path| !seen.contains(path.as_str()))
            .cloned()
            .collect();
        deleted.sort();

        tracing::info!(
            "reindexing {} files ({} deleted)",
            scanned.len(),
            deleted.len()
        );
        let mut stats = self.run_pipeline(scanned, deleted, stored, false)?;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "reindex done: {} extracted, {} skipped, {} edges in {}ms",
            stats.extracted,
            stats.skipped,
            stats.edges_added,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Re-processes only `paths`; the rest of the project is loaded from
    /// storage so linking still sees every atom.
    pub fn sync(&mut self, paths: &[PathBuf]) -> Result<IndexStats> {
        let started = Instant::now();
        let stored = self.db.get_all_file_hashes()?;
        let mut files = Vec::new();
        let mut deleted = Vec::new();
        let mut seen = HashSet::new();
        for path in paths {
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                self.repo_root.join(path)
            };
            let abs = std::fs::canonicalize(&abs).unwrap_or(abs);
            let Ok(rel_path) = crate::util::normalize_rel_path(&self.repo_root, &abs) else {
                tracing::warn!("{} is outside the repository", path.display());
                continue;
            };
            if !seen.insert(rel_path.clone()) {
                continue;
            }
            match scan::scan_path_with_options(&self.repo_root, &abs, self.scan_options)? {
                Some(file) => files.push(file),
                None if !abs.exists() && stored.contains_key(&rel_path) => deleted.push(rel_path),
                None => tracing::debug!("sync: ignoring {rel_path}"),
            }
        }
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        tracing::info!("syncing {} files ({} deleted)", files.len(), deleted.len());
        let mut stats = self.run_pipeline(files, deleted, stored, true)?;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Links and scores the stored atoms again without extracting anything.
    pub fn relink(&mut self) -> Result<IndexStats> {
        let started = Instant::now();
        let now = crate::util::now_secs();
        let atoms = self.db.list_atoms(&AtomFilter::default())?;
        let mut stats = IndexStats::default();
        self.link_and_persist(atoms, &HashSet::new(), now, &mut stats)?;
        self.db.set_meta_i64(LAST_INDEXED_KEY, now)?;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "relink done: {} edges, {} atoms saved",
            stats.edges_added,
            stats.atoms_saved
        );
        Ok(stats)
    }

    fn run_pipeline(
        &mut self,
        files: Vec<ScannedFile>,
        deleted: Vec<String>,
        stored: HashMap<String, String>,
        partial: bool,
    ) -> Result<IndexStats> {
        let now = crate::util::now_secs();
        let mut stats = IndexStats {
            scanned: files.len(),
            ..IndexStats::default()
        };
        let mut touched: HashSet<String> = files.iter().map(|file| file.rel_path.clone()).collect();
        touched.extend(deleted.iter().cloned());

        let cores = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        let workers = self.config.worker_count(files.len(), cores);
        let slices = partition(files, workers);
        stats.workers = slices.len();
        let shared = WorkerShared {
            db_path: self.db.db_path().to_path_buf(),
            config: self.config.clone(),
            stored_hashes: Arc::new(stored),
            now,
        };
        let outputs = run_workers(&shared, slices)?;

        let mut atoms: Vec<Atom> = Vec::new();
        let mut forced: HashSet<String> = HashSet::new();
        for output in outputs {
            self.db
                .upsert_file_hashes(&output.records)
                .with_context(|| format!("record hashes of worker {}", output.worker))?;
            stats.extracted += output.extracted;
            stats.skipped += output.skipped;
            stats.failed += output.failed;
            stats.removed_atoms += output.removed_atoms;
            stats.extractor_runs += output.extractor_runs;
            stats.atoms_saved += output.atoms_saved;
            stats.warnings.extend(output.warnings);
            forced.extend(output.written);
            atoms.extend(output.atoms);
        }

        for path in &deleted {
            let mut gone = self.db.get_by_file(path)?;
            for atom in gone.iter_mut().filter(|atom| !atom.is_removed()) {
                soft_remove(atom, now);
                forced.insert(atom.id.clone());
                stats.removed_atoms += 1;
            }
            self.db
                .delete_file(path)
                .with_context(|| format!("delete file row {path}"))?;
            stats.deleted_files += 1;
            atoms.extend(gone);
        }

        if partial {
            let others = self.db.list_atoms(&AtomFilter::default())?;
            atoms.extend(
                others
                    .into_iter()
                    .filter(|atom| !touched.contains(&atom.file_path)),
            );
        }

        self.link_and_persist(atoms, &forced, now, &mut stats)?;
        self.db.set_meta_i64(LAST_INDEXED_KEY, now)?;
        Ok(stats)
    }

    /// Links the complete arena, recomputes vectors and writes back every
    /// atom that changed plus all relation rows.
    fn link_and_persist(
        &self,
        atoms: Vec<Atom>,
        forced: &HashSet<String>,
        now: i64,
        stats: &mut IndexStats,
    ) -> Result<()> {
        let mut known: BTreeSet<String> = self.db.get_all_file_hashes()?.into_keys().collect();
        known.extend(
            atoms
                .iter()
                .filter(|atom| !atom.is_removed())
                .map(|atom| atom.file_path.clone()),
        );
        let known: Vec<String> = known.into_iter().collect();
        let facts = ProjectFacts::build(&known, &DiskSource::new(self.repo_root.clone()));

        let mut graph = AtomGraph::new(atoms);
        let before = graph.atoms().to_vec();
        let report = linker::link(&mut graph, &facts);
        vectors::compute_all(graph.atoms_mut());

        let mut modified = Vec::new();
        for (atom, previous) in graph.atoms_mut().iter_mut().zip(&before) {
            if atom != previous || forced.contains(&atom.id) {
                atom.updated_at = now;
                modified.push(atom.clone());
            }
        }
        tracing::debug!("{} atoms modified by linking", modified.len());

        stats.atoms_saved += self.db.save_many(&modified).context("persist modified atoms")?;
        stats.relations_saved = self
            .db
            .save_relations_bulk(&graph.files(), &graph.relation_rows())
            .context("persist relation rows")?;
        stats.edges_added = report.edges_added;
        stats.passes = report.passes;
        stats.warnings.extend(report.warnings);
        stats.atoms = graph.atoms().iter().filter(|atom| !atom.is_removed()).count();
        Ok(())
    }
}
