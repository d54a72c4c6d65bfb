use rusqlite::{ffi, Connection, ErrorCode, OptionalExtension, Row, Savepoint, params};
use anyhow::{Result, Context};
use crate::database::schema::{self, SCHEMA};
use crate::error::CollectionError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtworkRecord {
    pub id: i64,
    pub accession_number: Option<String>,
    pub artist_id: Option<i64>,
    pub title: Option<String>,
    pub medium: Option<String>,
    pub year: Option<String>,
    pub acquisition_year: Option<i32>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub depth: Option<String>,
    pub cleaned_width: Option<f64>,
    pub cleaned_height: Option<f64>,
    pub cleaned_depth: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistRecord {
    pub id: i64,
    pub name: String,
    pub gender: Option<String>,
    pub year_of_birth: Option<i32>,
    pub year_of_death: Option<i32>,
    pub place_of_birth: Option<String>,
    pub place_of_death: Option<String>,
    pub nationality: Option<String>,
    pub cleaned_birth_year: Option<i32>,
    pub cleaned_death_year: Option<i32>,
}

const ARTWORK_COLUMNS: &str = "id, accession_number, artist_id, title, medium, year, acquisition_year,
     width, height, depth, cleaned_width, cleaned_height, cleaned_depth";

const ARTIST_COLUMNS: &str = "id, name, gender, year_of_birth, year_of_death, place_of_birth,
     place_of_death, nationality, cleaned_birth_year, cleaned_death_year";

fn artwork_from_row(row: &Row<'_>) -> rusqlite::Result<ArtworkRecord> {
    Ok(ArtworkRecord {
        id: row.get(0)?,
        accession_number: row.get(1)?,
        artist_id: row.get(2)?,
        title: row.get(3)?,
        medium: row.get(4)?,
        year: row.get(5)?,
        acquisition_year: row.get(6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        depth: row.get(9)?,
        cleaned_width: row.get(10)?,
        cleaned_height: row.get(11)?,
        cleaned_depth: row.get(12)?,
    })
}

fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<ArtistRecord> {
    Ok(ArtistRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        year_of_birth: row.get(3)?,
        year_of_death: row.get(4)?,
        place_of_birth: row.get(5)?,
        place_of_death: row.get(6)?,
        nationality: row.get(7)?,
        cleaned_birth_year: row.get(8)?,
        cleaned_death_year: row.get(9)?,
    })
}

/// Clamps a row count to what SQLite accepts as a LIMIT.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Maps unique/primary key violations to a structural error naming the row.
/// Other constraint failures pass through unchanged.
fn insert_error(err: rusqlite::Error, table: &'static str, id: i64) -> CollectionError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            CollectionError::DuplicateKey { table, id }
        }
        other => CollectionError::Database(other),
    }
}

const IMPORT_SAVEPOINT: &str = "bulk_import";

/// SQLite-backed record store. Imports are buffered and written in one
/// transaction per flush; cleaning writes only ever fill NULL derived columns.
pub struct CollectionStore {
    conn: Connection,
    artworks: Vec<ArtworkRecord>,
    artists: Vec<ArtistRecord>,
    buffer_limit: usize,
}

impl CollectionStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Databases created before artist_id stopped being a foreign key still carry the clause.
        conn.execute_batch("PRAGMA foreign_keys = OFF;").context("Failed to configure database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        schema::evolve(&conn).context("Failed to add derived columns")?;
        Ok(Self {
            conn,
            artworks: Vec::new(),
            artists: Vec::new(),
            buffer_limit: 1000,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn add_artwork(&mut self, record: ArtworkRecord) -> Result<()> {
        self.artworks.push(record);
        if self.artworks.len() >= self.buffer_limit {
            self.flush()?;
        }
        Ok(())
    }

    pub fn add_artist(&mut self, record: ArtistRecord) -> Result<()> {
        self.artists.push(record);
        if self.artists.len() >= self.buffer_limit {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.artworks.is_empty() && self.artists.is_empty() {
            return Ok(());
        }

        // A savepoint rather than a transaction so flushes nest inside `atomic`.
        let sp = self.conn.savepoint().context("Failed to begin transaction")?;
        Self::insert_artists(&sp, &self.artists)?;
        Self::insert_artworks(&sp, &self.artworks)?;
        sp.commit().context("Failed to commit transaction")?;

        self.artists.clear();
        self.artworks.clear();
        Ok(())
    }

    /// Runs `f` as one unit: everything it adds is kept only if it succeeds,
    /// including rows already flushed along the way. On error the store is left
    /// as it was before the call, so a corrected import can simply be re-run.
    pub fn atomic<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {IMPORT_SAVEPOINT};"))
            .context("Failed to begin import")?;

        let result = f(self).and_then(|value| self.flush().map(|_| value));
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {IMPORT_SAVEPOINT};"))
                    .context("Failed to commit import")?;
                Ok(value)
            }
            Err(err) => {
                self.artists.clear();
                self.artworks.clear();
                self.conn
                    .execute_batch(&format!(
                        "ROLLBACK TO {IMPORT_SAVEPOINT}; RELEASE {IMPORT_SAVEPOINT};"
                    ))
                    .context("Failed to roll back import")?;
                Err(err)
            }
        }
    }

    fn insert_artists(tx: &Savepoint<'_>, records: &[ArtistRecord]) -> Result<()> {
        let mut stmt = tx.prepare(
            "INSERT INTO artists (id, name, gender, year_of_birth, year_of_death,
                                  place_of_birth, place_of_death, nationality)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        )?;
        for record in records {
            stmt.execute(params![
                record.id,
                record.name,
                record.gender,
                record.year_of_birth,
                record.year_of_death,
                record.place_of_birth,
                record.place_of_death,
                record.nationality,
            ]).map_err(|e| insert_error(e, "artists", record.id))?;
        }
        Ok(())
    }

    fn insert_artworks(tx: &Savepoint<'_>, records: &[ArtworkRecord]) -> Result<()> {
        let mut stmt = tx.prepare(
            "INSERT INTO artworks (id, accession_number, artist_id, title, medium, year,
                                   acquisition_year, width, height, depth)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        )?;
        for record in records {
            stmt.execute(params![
                record.id,
                record.accession_number,
                record.artist_id,
                record.title,
                record.medium,
                record.year,
                record.acquisition_year,
                record.width,
                record.height,
                record.depth,
            ]).map_err(|e| insert_error(e, "artworks", record.id))?;
        }
        Ok(())
    }

    /// Artworks with at least one NULL derived dimension and an id above `after_id`, in id order.
    pub fn pending_artworks(&self, after_id: i64, limit: usize) -> Result<Vec<ArtworkRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks
             WHERE id > ?1
               AND (cleaned_width IS NULL OR cleaned_height IS NULL OR cleaned_depth IS NULL)
             ORDER BY id
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![after_id, sql_limit(limit)], artwork_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to load pending artworks")
    }

    /// Artists with at least one NULL derived year and an id above `after_id`, in id order.
    pub fn pending_artists(&self, after_id: i64, limit: usize) -> Result<Vec<ArtistRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTIST_COLUMNS} FROM artists
             WHERE id > ?1
               AND (cleaned_birth_year IS NULL OR cleaned_death_year IS NULL)
             ORDER BY id
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![after_id, sql_limit(limit)], artist_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to load pending artists")
    }

    pub fn count_pending_artworks(&self) -> Result<u64> {
        self.count("artworks WHERE cleaned_width IS NULL OR cleaned_height IS NULL OR cleaned_depth IS NULL")
    }

    pub fn count_pending_artists(&self) -> Result<u64> {
        self.count("artists WHERE cleaned_birth_year IS NULL OR cleaned_death_year IS NULL")
    }

    pub fn count_artworks(&self) -> Result<u64> {
        self.count("artworks")
    }

    pub fn count_artists(&self) -> Result<u64> {
        self.count("artists")
    }

    fn count(&self, from: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(&format!("SELECT COUNT(*) FROM {from}"), [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Writes derived dimensions. A column that is already populated keeps its value.
    pub fn write_artwork_dimensions(&mut self, records: &[ArtworkRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE artworks
                 SET cleaned_width = COALESCE(cleaned_width, ?2),
                     cleaned_height = COALESCE(cleaned_height, ?3),
                     cleaned_depth = COALESCE(cleaned_depth, ?4)
                 WHERE id = ?1"
            )?;
            for record in records {
                written += stmt.execute(params![
                    record.id,
                    record.cleaned_width,
                    record.cleaned_height,
                    record.cleaned_depth,
                ])?;
            }
        }
        tx.commit().context("Failed to commit derived dimensions")?;
        Ok(written)
    }

    /// Writes derived years. A column that is already populated keeps its value.
    pub fn write_artist_years(&mut self, records: &[ArtistRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().context("Failed to begin transaction")?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE artists
                 SET cleaned_birth_year = COALESCE(cleaned_birth_year, ?2),
                     cleaned_death_year = COALESCE(cleaned_death_year, ?3)
                 WHERE id = ?1"
            )?;
            for record in records {
                written += stmt.execute(params![
                    record.id,
                    record.cleaned_birth_year,
                    record.cleaned_death_year,
                ])?;
            }
        }
        tx.commit().context("Failed to commit derived years")?;
        Ok(written)
    }

    pub fn artwork(&self, id: i64) -> Result<Option<ArtworkRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?1"),
                params![id],
                artwork_from_row,
            )
            .optional()
            .context("Failed to load artwork")
    }

    pub fn artist(&self, id: i64) -> Result<Option<ArtistRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {ARTIST_COLUMNS} FROM artists WHERE id = ?1"),
                params![id],
                artist_from_row,
            )
            .optional()
            .context("Failed to load artist")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artwork(id: i64, accession: &str, width: &str) -> ArtworkRecord {
        ArtworkRecord {
            id,
            accession_number: Some(accession.to_string()),
            width: Some(width.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_flush_and_load() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        store.add_artist(ArtistRecord { id: 1, name: "Blake, Robert".into(), ..Default::default() })?;
        store.add_artwork(artwork(10, "A00001", "300 mm"))?;
        store.flush()?;

        assert_eq!(store.count_artists()?, 1);
        assert_eq!(store.count_artworks()?, 1);
        let loaded = store.artwork(10)?.expect("artwork stored");
        assert_eq!(loaded.width.as_deref(), Some("300 mm"));
        assert_eq!(loaded.cleaned_width, None);
        assert!(store.artwork(99)?.is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_accession_is_structural_error() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        store.add_artwork(artwork(1, "A1", "1"))?;
        store.add_artwork(artwork(2, "A1", "2"))?;

        let err = store.flush().unwrap_err();
        match err.downcast_ref::<CollectionError>() {
            Some(CollectionError::DuplicateKey { table, id }) => {
                assert_eq!(*table, "artworks");
                assert_eq!(*id, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.count_artworks()?, 0);
        Ok(())
    }

    #[test]
    fn test_guarded_write_keeps_existing_values() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        store.add_artwork(artwork(1, "A1", "10"))?;
        store.flush()?;

        let mut first = store.artwork(1)?.expect("artwork stored");
        first.cleaned_width = Some(10.0);
        store.write_artwork_dimensions(&[first.clone()])?;

        first.cleaned_width = Some(99.0);
        first.cleaned_height = Some(5.0);
        store.write_artwork_dimensions(&[first])?;

        let loaded = store.artwork(1)?.expect("artwork stored");
        assert_eq!(loaded.cleaned_width, Some(10.0));
        assert_eq!(loaded.cleaned_height, Some(5.0));
        Ok(())
    }

    #[test]
    fn test_unresolved_artist_reference_is_kept() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        store.add_artist(ArtistRecord { id: 1, name: "Known".into(), gender: Some("Female".into()), ..Default::default() })?;
        store.add_artwork(ArtworkRecord { id: 1, artist_id: Some(99), ..Default::default() })?;
        store.add_artwork(ArtworkRecord { id: 2, artist_id: Some(1), ..Default::default() })?;
        store.flush()?;

        assert_eq!(store.artwork(1)?.expect("artwork 1").artist_id, Some(99));
        let shares = crate::report::queries::gender_share(store.conn())?;
        let unknown = shares.iter().find(|s| s.category == "Unknown").expect("unknown bucket");
        assert_eq!(unknown.count, 1);
        Ok(())
    }

    #[test]
    fn test_other_constraint_failures_are_not_duplicates() -> Result<()> {
        let store = CollectionStore::open_in_memory()?;
        let err = store
            .conn()
            .execute("INSERT INTO artists (id, name) VALUES (1, NULL)", [])
            .unwrap_err();
        assert!(matches!(insert_error(err, "artists", 1), CollectionError::Database(_)));

        store.conn().execute("INSERT INTO artists (id, name) VALUES (1, 'A')", [])?;
        let err = store
            .conn()
            .execute("INSERT INTO artists (id, name) VALUES (1, 'B')", [])
            .unwrap_err();
        assert!(matches!(
            insert_error(err, "artists", 1),
            CollectionError::DuplicateKey { table: "artists", id: 1 }
        ));
        Ok(())
    }

    #[test]
    fn test_atomic_rolls_back_flushed_rows() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        store.add_artist(ArtistRecord { id: 1, name: "Before".into(), ..Default::default() })?;
        store.flush()?;

        let result: Result<()> = store.atomic(|store| {
            store.add_artist(ArtistRecord { id: 2, name: "Flushed".into(), ..Default::default() })?;
            store.flush()?;
            store.add_artist(ArtistRecord { id: 1, name: "Clash".into(), ..Default::default() })
        });
        assert!(result.is_err());
        assert_eq!(store.count_artists()?, 1);
        assert!(store.artist(2)?.is_none());

        let added = store.atomic(|store| {
            store.add_artist(ArtistRecord { id: 2, name: "Retry".into(), ..Default::default() })?;
            Ok(1)
        })?;
        assert_eq!(added, 1);
        assert_eq!(store.count_artists()?, 2);
        Ok(())
    }

    #[test]
    fn test_unbounded_limit_loads_everything() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        for id in 1..=3 {
            store.add_artwork(artwork(id, &format!("A{id}"), "x"))?;
        }
        store.flush()?;
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
        assert_eq!(store.pending_artworks(i64::MIN, usize::MAX)?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_pending_uses_keyset_order() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        for id in 1..=5 {
            store.add_artwork(artwork(id, &format!("A{id}"), "x"))?;
        }
        store.flush()?;

        let page = store.pending_artworks(2, 2)?;
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(store.count_pending_artworks()?, 5);
        Ok(())
    }
}
