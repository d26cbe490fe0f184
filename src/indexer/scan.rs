use crate::indexer::stable_id::content_hash;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub hash: String,
    pub size: i64,
    pub modified: i64,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub no_ignore: bool,
    pub max_file_size: u64,
}

impl ScanOptions {
    pub fn new(no_ignore: bool, max_file_size: u64) -> Self {
        Self {
            no_ignore,
            max_file_size,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            no_ignore: false,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageSpec {
        name: "typescript",
        extensions: &["ts", "mts", "cts"],
    },
    LanguageSpec {
        name: "tsx",
        extensions: &["tsx"],
    },
];

/// Extensions tried, in order, when resolving an extensionless import.
pub const JS_TS_EXTENSIONS: &[&str] = &["js", "ts", "tsx", "jsx", "mjs", "cjs", "mts", "cts"];

pub fn scan_repo(repo_root: &Path) -> Result<Vec<ScannedFile>> {
    scan_repo_with_options(repo_root, ScanOptions::default())
}

pub fn scan_repo_with_options(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_ignored_entry(entry))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(file) = scan_path_with_options(repo_root, entry.path(), options)? {
            files.push(file);
        }
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn is_ignored_entry(entry: &ignore::DirEntry) -> bool {
    match entry.file_name() {
        name if name == OsStr::new(".atomidx") => true,
        name if name == OsStr::new(".git") => true,
        name if name == OsStr::new("node_modules") => true,
        _ => false,
    }
}

pub fn scan_path(repo_root: &Path, path: &Path) -> Result<Option<ScannedFile>> {
    scan_path_with_options(repo_root, path, ScanOptions::default())
}

/// Scans one file; `None` for non-JS/TS files, oversized files and paths
/// outside the repository.
pub fn scan_path_with_options(
    repo_root: &Path,
    path: &Path,
    options: ScanOptions,
) -> Result<Option<ScannedFile>> {
    if !path.is_file() {
        return Ok(None);
    }
    let language = match detect_language(path) {
        Some(value) => value,
        None => return Ok(None),
    };
    let rel_path = match crate::util::normalize_rel_path(repo_root, path) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let metadata = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if options.max_file_size > 0 && metadata.len() > options.max_file_size {
        tracing::debug!("skipping {rel_path}: {} bytes", metadata.len());
        return Ok(None);
    }
    let modified = metadata
        .modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let size = metadata.len() as i64;
    let hash = hash_file(path).with_context(|| format!("hash {}", path.display()))?;
    Ok(Some(ScannedFile {
        rel_path,
        abs_path: path.to_path_buf(),
        hash,
        size,
        modified,
        language: language.to_string(),
    }))
}

fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    if path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".d.ts"))
    {
        return None;
    }
    for spec in LANGUAGE_SPECS {
        if spec.extensions.iter().any(|candidate| *candidate == ext) {
            return Some(spec.name);
        }
    }
    None
}

pub fn hash_file(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    Ok(content_hash(&data))
}
