use crate::config::Config;
use crate::error::IndexError;
use crate::model::{Atom, CallType, FileRecord, RelationRow, RepoOverview};
use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

mod migrations;

pub use migrations::SCHEMA_VERSION;

const ATOM_COLUMNS: &[&str] = &[
    "id",
    "file_path",
    "name",
    "class_name",
    "kind",
    "line",
    "end_line",
    "complexity",
    "lines_of_code",
    "is_exported",
    "is_async",
    "archetype",
    "purpose",
    "importance_score",
    "is_removed",
    "created_at",
    "extracted_at",
    "updated_at",
    "payload",
];

const RELATION_COLUMNS: &[&str] = &[
    "source_atom_id",
    "source_file",
    "call_name",
    "call_type",
    "line",
    "target_atom_id",
];

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

/// Query filter for `list_atoms`.
#[derive(Debug, Clone, Default)]
pub struct AtomFilter {
    pub file_path: Option<String>,
    pub archetype: Option<String>,
    pub purpose: Option<String>,
    pub include_removed: bool,
    pub limit: Option<usize>,
}

pub struct Db {
    db_path: PathBuf,
    rows_per_statement: usize,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::open(db_path, &Config::from_env())
    }

    pub fn open(db_path: &Path, config: &Config) -> Result<Self> {
        crate::util::ensure_parent_dir(db_path)?;

        tracing::debug!(
            "initializing connection pool (size: {}, min_idle: {})",
            config.pool_size,
            config.pool_min_idle
        );

        // Open write connection first and run migrations
        let write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        migrations::migrate(&write_conn).context("migrate schema")?;

        let write_conn = Arc::new(Mutex::new(write_conn));

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .min_idle(Some(config.pool_min_idle.min(config.pool_size)))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create connection pool")?;

        Ok(Self {
            db_path: db_path.to_path_buf(),
            rows_per_statement: config.batch_rows.max(1),
            write_conn,
            read_pool,
        })
    }

    /// Get the database file path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .with_context(|| "get read connection from pool")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.write_conn
            .lock()
            .map_err(|_| IndexError::StorageFailure("write connection lock poisoned".into()).into())
    }

    /// Upserts atoms with size-capped multi-row statements in one transaction.
    pub fn save_many(&self, atoms: &[Atom]) -> Result<usize> {
        if atoms.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let saved = upsert_atoms_tx(&tx, atoms, self.rows_per_statement)?;
        tx.commit().context("commit atom upsert")?;
        Ok(saved)
    }

    /// Replaces the relation rows of `source_files` with `rows` in one
    /// transaction.
    pub fn save_relations_bulk(&self, source_files: &[String], rows: &[RelationRow]) -> Result<usize> {
        if source_files.is_empty() && rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        delete_relations_for_files_tx(&tx, source_files)?;
        let saved = insert_relations_tx(&tx, rows, self.rows_per_statement)?;
        tx.commit().context("commit relation insert")?;
        Ok(saved)
    }

    /// One worker's slice: atoms and relations of the extracted files.
    pub fn write_extracted(
        &self,
        atoms: &[Atom],
        source_files: &[String],
        rows: &[RelationRow],
    ) -> Result<(usize, usize)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let atoms_saved = upsert_atoms_tx(&tx, atoms, self.rows_per_statement)?;
        delete_relations_for_files_tx(&tx, source_files)?;
        let rows_saved = insert_relations_tx(&tx, rows, self.rows_per_statement)?;
        tx.commit().context("commit worker batch")?;
        Ok((atoms_saved, rows_saved))
    }

    pub fn get_by_file(&self, path: &str) -> Result<Vec<Atom>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM atoms WHERE file_path = ? ORDER BY line, id",
        )?;
        let rows = stmt.query_map(params![path], |row| row.get::<_, String>(0))?;
        let mut atoms = Vec::new();
        for row in rows {
            atoms.push(decode_atom(&row?)?);
        }
        Ok(atoms)
    }

    pub fn get_atom(&self, id: &str) -> Result<Option<Atom>> {
        let payload: Option<String> = self
            .read_conn()?
            .query_row("SELECT payload FROM atoms WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        payload.map(|payload| decode_atom(&payload)).transpose()
    }

    pub fn list_atoms(&self, filter: &AtomFilter) -> Result<Vec<Atom>> {
        let mut sql = String::from("SELECT payload FROM atoms WHERE 1 = 1");
        let mut values: Vec<SqlValue> = Vec::new();
        if !filter.include_removed {
            sql.push_str(" AND is_removed = 0");
        }
        if let Some(path) = &filter.file_path {
            sql.push_str(" AND file_path = ?");
            values.push(SqlValue::Text(path.clone()));
        }
        if let Some(archetype) = &filter.archetype {
            sql.push_str(" AND archetype = ?");
            values.push(SqlValue::Text(archetype.clone()));
        }
        if let Some(purpose) = &filter.purpose {
            sql.push_str(" AND purpose = ?");
            values.push(SqlValue::Text(purpose.clone()));
        }
        sql.push_str(" ORDER BY file_path, line, id");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(limit as i64));
        }
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
        let mut atoms = Vec::new();
        for row in rows {
            atoms.push(decode_atom(&row?)?);
        }
        Ok(atoms)
    }

    /// Every stored atom, soft-removed ones included.
    pub fn all_atoms(&self) -> Result<Vec<Atom>> {
        self.list_atoms(&AtomFilter {
            include_removed: true,
            ..AtomFilter::default()
        })
    }

    pub fn get_all_file_hashes(&self) -> Result<HashMap<String, String>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare("SELECT path, hash FROM files")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut map = HashMap::new();
        for row in rows {
            let (path, hash): (String, String) = row?;
            map.insert(path, hash);
        }
        Ok(map)
    }

    pub fn upsert_file_hashes(&self, records: &[FileRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO files (path, hash, last_analyzed, atom_count) VALUES (?, ?, ?, ?)
                 ON CONFLICT(path) DO UPDATE SET
                    hash = excluded.hash,
                    last_analyzed = excluded.last_analyzed,
                    atom_count = excluded.atom_count",
            )?;
            for record in records {
                stmt.execute(params![
                    record.path,
                    record.hash,
                    record.last_analyzed,
                    record.atom_count
                ])?;
            }
        }
        tx.commit().context("commit file hashes")?;
        Ok(records.len())
    }

    /// Deletes a file row and its relation rows; its atoms stay for lineage.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM files WHERE path = ?", params![path])?;
        tx.execute("DELETE FROM relations WHERE source_file = ?", params![path])?;
        tx.commit().context("commit file delete")?;
        Ok(())
    }

    pub fn relations_from(&self, source_atom_id: &str) -> Result<Vec<RelationRow>> {
        self.query_relations(
            "SELECT source_atom_id, source_file, call_name, call_type, line, target_atom_id
             FROM relations WHERE source_atom_id = ? ORDER BY line, call_name",
            source_atom_id,
        )
    }

    pub fn relations_to(&self, target_atom_id: &str) -> Result<Vec<RelationRow>> {
        self.query_relations(
            "SELECT source_atom_id, source_file, call_name, call_type, line, target_atom_id
             FROM relations WHERE target_atom_id = ? ORDER BY source_atom_id, line",
            target_atom_id,
        )
    }

    pub fn relations_for_file(&self, source_file: &str) -> Result<Vec<RelationRow>> {
        self.query_relations(
            "SELECT source_atom_id, source_file, call_name, call_type, line, target_atom_id
             FROM relations WHERE source_file = ? ORDER BY source_atom_id, line, call_name",
            source_file,
        )
    }

    fn query_relations(&self, sql: &str, key: &str) -> Result<Vec<RelationRow>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], relation_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn overview(&self, repo_root: &Path) -> Result<RepoOverview> {
        let last_indexed = self.get_meta_i64("last_indexed")?;
        let conn = self.read_conn()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
        let files = count("SELECT COUNT(*) FROM files")?;
        let atoms = count("SELECT COUNT(*) FROM atoms WHERE is_removed = 0")?;
        let removed_atoms = count("SELECT COUNT(*) FROM atoms WHERE is_removed = 1")?;
        let relations = count("SELECT COUNT(*) FROM relations")?;
        let resolved_relations =
            count("SELECT COUNT(*) FROM relations WHERE target_atom_id IS NOT NULL")?;
        let archetypes = group_counts(&conn, "archetype")?;
        let purposes = group_counts(&conn, "purpose")?;
        Ok(RepoOverview {
            repo_root: repo_root.to_string_lossy().to_string(),
            files,
            atoms,
            removed_atoms,
            relations,
            resolved_relations,
            last_indexed,
            archetypes,
            purposes,
        })
    }

    pub fn get_meta_i64(&self, key: &str) -> Result<Option<i64>> {
        let value: Option<String> = self
            .read_conn()?
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()))
    }

    pub fn set_meta_i64(&self, key: &str, value: i64) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value.to_string()],
        )?;
        Ok(())
    }
}

fn group_counts(conn: &Connection, column: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM atoms
         WHERE is_removed = 0 AND {column} IS NOT NULL
         GROUP BY {column} ORDER BY COUNT(*) DESC, {column}"
    ))?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn decode_atom(payload: &str) -> Result<Atom> {
    serde_json::from_str(payload).context("decode atom payload")
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<RelationRow> {
    let call_type: String = row.get(3)?;
    Ok(RelationRow {
        source_atom_id: row.get(0)?,
        source_file: row.get(1)?,
        call_name: row.get(2)?,
        call_type: if call_type == CallType::Internal.as_str() {
            CallType::Internal
        } else {
            CallType::External
        },
        line: row.get(4)?,
        target_atom_id: row.get(5)?,
    })
}

/// `(?, ?, …), (?, ?, …)` for `rows` rows of `columns` placeholders.
fn placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(", ")
}

fn atom_values(atom: &Atom) -> Result<Vec<SqlValue>> {
    let payload = serde_json::to_string(atom).context("encode atom payload")?;
    let text = |value: Option<&str>| match value {
        Some(value) => SqlValue::Text(value.to_string()),
        None => SqlValue::Null,
    };
    Ok(vec![
        SqlValue::Text(atom.id.clone()),
        SqlValue::Text(atom.file_path.clone()),
        SqlValue::Text(atom.name.clone()),
        text(atom.class_name.as_deref()),
        SqlValue::Text(
            match atom.kind {
                crate::model::AtomKind::Function => "function",
                crate::model::AtomKind::Variable => "variable",
            }
            .to_string(),
        ),
        SqlValue::Integer(atom.line),
        SqlValue::Integer(atom.end_line),
        SqlValue::Integer(atom.complexity),
        SqlValue::Integer(atom.lines_of_code),
        SqlValue::Integer(i64::from(atom.is_exported)),
        SqlValue::Integer(i64::from(atom.is_async)),
        text(atom.archetype.as_ref().map(|a| a.kind.as_str())),
        text(atom.purpose.as_ref().map(|p| p.kind.as_str())),
        SqlValue::Real(atom.importance_score),
        SqlValue::Integer(i64::from(atom.is_removed())),
        SqlValue::Integer(atom.created_at),
        SqlValue::Integer(atom.extracted_at),
        SqlValue::Integer(atom.updated_at),
        SqlValue::Text(payload),
    ])
}

fn upsert_atoms_tx(tx: &Transaction<'_>, atoms: &[Atom], rows_per_statement: usize) -> Result<usize> {
    let updates = ATOM_COLUMNS
        .iter()
        .skip(1)
        .map(|col| format!("{col} = excluded.{col}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut saved = 0;
    for chunk in atoms.chunks(rows_per_statement.max(1)) {
        let sql = format!(
            "INSERT INTO atoms ({}) VALUES {} ON CONFLICT(id) DO UPDATE SET {updates}",
            ATOM_COLUMNS.join(", "),
            placeholders(chunk.len(), ATOM_COLUMNS.len()),
        );
        let mut values = Vec::with_capacity(chunk.len() * ATOM_COLUMNS.len());
        for atom in chunk {
            values.extend(atom_values(atom)?);
        }
        tx.execute(&sql, params_from_iter(values))
            .map_err(|err| IndexError::StorageFailure(format!("upsert atoms: {err}")))?;
        saved += chunk.len();
    }
    Ok(saved)
}

fn delete_relations_for_files_tx(tx: &Transaction<'_>, files: &[String]) -> Result<()> {
    let mut stmt = tx.prepare_cached("DELETE FROM relations WHERE source_file = ?")?;
    for file in files {
        stmt.execute(params![file])?;
    }
    Ok(())
}

fn insert_relations_tx(
    tx: &Transaction<'_>,
    rows: &[RelationRow],
    rows_per_statement: usize,
) -> Result<usize> {
    let mut saved = 0;
    for chunk in rows.chunks(rows_per_statement.max(1)) {
        let sql = format!(
            "INSERT OR REPLACE INTO relations ({}) VALUES {}",
            RELATION_COLUMNS.join(", "),
            placeholders(chunk.len(), RELATION_COLUMNS.len()),
        );
        let mut values = Vec::with_capacity(chunk.len() * RELATION_COLUMNS.len());
        for row in chunk {
            values.push(SqlValue::Text(row.source_atom_id.clone()));
            values.push(SqlValue::Text(row.source_file.clone()));
            values.push(SqlValue::Text(row.call_name.clone()));
            values.push(SqlValue::Text(row.call_type.as_str().to_string()));
            values.push(SqlValue::Integer(row.line));
            values.push(match &row.target_atom_id {
                Some(target) => SqlValue::Text(target.clone()),
                None => SqlValue::Null,
            });
        }
        tx.execute(&sql, params_from_iter(values))
            .map_err(|err| IndexError::StorageFailure(format!("insert relations: {err}")))?;
        saved += chunk.len();
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomKind, CallRef};

    fn open_db(dir: &Path, batch_rows: usize) -> Db {
        let config = Config {
            batch_rows,
            pool_size: 2,
            pool_min_idle: 0,
            ..Config::default()
        };
        Db::open(&dir.join("atoms.sqlite"), &config).unwrap()
    }

    fn atom(path: &str, name: &str) -> Atom {
        let mut atom = Atom::new(path, name, None, AtomKind::Function);
        atom.calls.push(CallRef {
            name: "other".into(),
            call_type: CallType::External,
            line: 2,
        });
        atom
    }

    #[test]
    fn save_many_chunks_and_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), 2);
        let atoms: Vec<Atom> = (0..5).map(|i| atom("a.js", &format!("f{i}"))).collect();
        assert_eq!(db.save_many(&atoms).unwrap(), 5);

        let mut changed = atoms[0].clone();
        changed.complexity = 9;
        db.save_many(&[changed]).unwrap();

        let loaded = db.get_by_file("a.js").unwrap();
        assert_eq!(loaded.len(), 5);
        let first = db.get_atom("a.js::f0").unwrap().unwrap();
        assert_eq!(first.complexity, 9);
        assert_eq!(first.calls, atoms[0].calls);
    }

    #[test]
    fn relations_are_replaced_per_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), 50);
        let row = |name: &str, target: Option<&str>| RelationRow {
            source_atom_id: "a.js::f".into(),
            source_file: "a.js".into(),
            call_name: name.into(),
            call_type: CallType::External,
            line: 1,
            target_atom_id: target.map(str::to_string),
        };
        db.save_relations_bulk(&["a.js".into()], &[row("g", None), row("h", None)])
            .unwrap();
        db.save_relations_bulk(&["a.js".into()], &[row("g", Some("b.js::g"))])
            .unwrap();
        let rows = db.relations_from("a.js::f").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target_atom_id.as_deref(), Some("b.js::g"));
        assert_eq!(db.relations_to("b.js::g").unwrap().len(), 1);
    }

    #[test]
    fn file_hashes_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), 50);
        let record = FileRecord {
            path: "a.js".into(),
            hash: "abc".into(),
            last_analyzed: 1,
            atom_count: 2,
        };
        db.upsert_file_hashes(&[record]).unwrap();
        assert_eq!(db.get_all_file_hashes().unwrap()["a.js"], "abc");
        db.delete_file("a.js").unwrap();
        assert!(db.get_all_file_hashes().unwrap().is_empty());
    }

    #[test]
    fn list_atoms_hides_removed_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), 50);
        let live = atom("a.js", "live");
        let mut gone = atom("a.js", "gone");
        crate::indexer::differ::soft_remove(&mut gone, 5);
        db.save_many(&[live, gone]).unwrap();
        assert_eq!(db.list_atoms(&AtomFilter::default()).unwrap().len(), 1);
        assert_eq!(db.all_atoms().unwrap().len(), 2);
        let overview = db.overview(dir.path()).unwrap();
        assert_eq!(overview.atoms, 1);
        assert_eq!(overview.removed_atoms, 1);
    }

    #[test]
    fn meta_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path(), 50);
        assert_eq!(db.get_meta_i64("last_indexed").unwrap(), None);
        db.set_meta_i64("last_indexed", 42).unwrap();
        assert_eq!(db.get_meta_i64("last_indexed").unwrap(), Some(42));
    }
}
