use rusqlite::Connection;
use anyhow::{Result, Context};
use tracing::info;

/// `artworks.artist_id` is a plain column, not a foreign key: source rows may
/// name artists that are missing from the artists file.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        gender TEXT,
        year_of_birth INTEGER,
        year_of_death INTEGER,
        place_of_birth TEXT,
        place_of_death TEXT,
        nationality TEXT
    );

    CREATE TABLE IF NOT EXISTS artworks (
        id INTEGER PRIMARY KEY,
        accession_number TEXT UNIQUE,
        artist_id INTEGER,
        title TEXT,
        medium TEXT,
        year TEXT,
        acquisition_year INTEGER,
        width TEXT,
        height TEXT,
        depth TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_artworks_artist ON artworks(artist_id);
";

/// Derived columns layered on top of the imported tables.
/// Added in place; existing rows start out NULL and are filled by the cleaning pass.
pub const DERIVED_COLUMNS: &[(&str, &str, &str)] = &[
    ("artworks", "cleaned_width", "REAL"),
    ("artworks", "cleaned_height", "REAL"),
    ("artworks", "cleaned_depth", "REAL"),
    ("artists", "cleaned_birth_year", "INTEGER"),
    ("artists", "cleaned_death_year", "INTEGER"),
];

/// Adds every missing derived column. Safe to run on every open.
pub fn evolve(conn: &Connection) -> Result<usize> {
    let mut added = 0;
    for (table, column, sql_type) in DERIVED_COLUMNS {
        if column_exists(conn, table, column)? {
            continue;
        }
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type};"))
            .with_context(|| format!("Failed to add {table}.{column}"))?;
        info!("Added derived column {}.{}", table, column);
        added += 1;
    }
    Ok(added)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
