#![allow(dead_code)]

use atomidx::indexer::Indexer;
use atomidx::model::Atom;
use std::path::Path;
use tempfile::TempDir;

pub fn write_repo(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, text) in files {
        write_file(dir.path(), path, text);
    }
    dir
}

pub fn write_file(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

pub fn indexer(root: &Path) -> Indexer {
    Indexer::new(root.to_path_buf(), root.join(".atomidx").join("atoms.sqlite")).unwrap()
}

pub fn atom(indexer: &Indexer, id: &str) -> Atom {
    indexer
        .db()
        .get_atom(id)
        .unwrap()
        .unwrap_or_else(|| panic!("missing atom {id}"))
}
