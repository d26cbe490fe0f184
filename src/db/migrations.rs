use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: i64 = 2;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            hash TEXT NOT NULL,
            last_analyzed INTEGER NOT NULL,
            atom_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS atoms (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            name TEXT NOT NULL,
            class_name TEXT,
            kind TEXT NOT NULL,
            line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            complexity INTEGER NOT NULL,
            lines_of_code INTEGER NOT NULL,
            is_exported INTEGER NOT NULL,
            is_async INTEGER NOT NULL,
            archetype TEXT,
            purpose TEXT,
            importance_score REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            extracted_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            payload TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_atoms_file ON atoms(file_path);
        CREATE INDEX IF NOT EXISTS idx_atoms_name ON atoms(name);
        CREATE INDEX IF NOT EXISTS idx_atoms_archetype ON atoms(archetype);
        CREATE INDEX IF NOT EXISTS idx_atoms_purpose ON atoms(purpose);

        CREATE TABLE IF NOT EXISTS relations (
            source_atom_id TEXT NOT NULL,
            source_file TEXT NOT NULL,
            call_name TEXT NOT NULL,
            call_type TEXT NOT NULL,
            line INTEGER NOT NULL,
            target_atom_id TEXT,
            PRIMARY KEY (source_atom_id, call_name, line)
        );

        CREATE INDEX IF NOT EXISTS idx_relations_file ON relations(source_file);
        CREATE INDEX IF NOT EXISTS idx_relations_target ON relations(target_atom_id);
        COMMIT;
        ",
    )?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                row.get::<_, String>(0)
                    .map(|v| v.parse::<i64>().unwrap_or(0))
            },
        )
        .optional()?;

    let existing = existing.unwrap_or(0);

    if existing < 2 {
        // Soft-removed atoms are filtered in SQL rather than by decoding payloads
        if !has_column(conn, "atoms", "is_removed")? {
            conn.execute(
                "ALTER TABLE atoms ADD COLUMN is_removed INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_atoms_removed ON atoms(is_removed)",
            [],
        )?;
    }

    if existing < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [SCHEMA_VERSION.to_string()],
        )?;
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
