use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context};
use csv::ReaderBuilder;
use indicatif::ProgressBar;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::database::repo::{ArtistRecord, ArtworkRecord, CollectionStore};
use crate::error::CollectionError;

/// One line of the artworks CSV. Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct ArtworkRow {
    id: Option<String>,
    accession_number: Option<String>,
    #[serde(rename = "artistId")]
    artist_id: Option<String>,
    title: Option<String>,
    medium: Option<String>,
    year: Option<String>,
    #[serde(rename = "acquisitionYear")]
    acquisition_year: Option<String>,
    width: Option<String>,
    height: Option<String>,
    depth: Option<String>,
}

/// One line of the artists CSV.
#[derive(Debug, Deserialize)]
struct ArtistRow {
    id: Option<String>,
    name: Option<String>,
    gender: Option<String>,
    #[serde(rename = "yearOfBirth")]
    year_of_birth: Option<String>,
    #[serde(rename = "yearOfDeath")]
    year_of_death: Option<String>,
    #[serde(rename = "placeOfBirth")]
    place_of_birth: Option<String>,
    #[serde(rename = "placeOfDeath")]
    place_of_death: Option<String>,
    nationality: Option<String>,
}

/// Where a row came from, for error messages.
struct RowRef<'a> {
    source_name: &'a str,
    line: u64,
}

impl RowRef<'_> {
    fn invalid(&self, field: &'static str, value: &str) -> CollectionError {
        CollectionError::InvalidField {
            source_name: self.source_name.to_string(),
            line: self.line,
            field,
            value: value.to_string(),
        }
    }

    fn id(&self, raw: Option<String>) -> Result<i64, CollectionError> {
        let raw = non_empty(raw).ok_or_else(|| CollectionError::MissingIdentity {
            source_name: self.source_name.to_string(),
            line: self.line,
        })?;
        raw.parse().map_err(|_| self.invalid("id", &raw))
    }

    fn integer(&self, field: &'static str, raw: Option<String>) -> Result<Option<i64>, CollectionError> {
        match non_empty(raw) {
            None => Ok(None),
            Some(raw) => parse_integer(&raw).map(Some).ok_or_else(|| self.invalid(field, &raw)),
        }
    }

    fn year(&self, field: &'static str, raw: Option<String>) -> Result<Option<i32>, CollectionError> {
        match self.integer(field, raw.clone())? {
            None => Ok(None),
            Some(year) => i32::try_from(year)
                .map(Some)
                .map_err(|_| self.invalid(field, raw.as_deref().unwrap_or_default())),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Integer cells sometimes arrive as "1922.0" from spreadsheet exports.
fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

impl ArtworkRow {
    fn into_record(self, at: &RowRef<'_>) -> Result<ArtworkRecord, CollectionError> {
        Ok(ArtworkRecord {
            id: at.id(self.id)?,
            accession_number: non_empty(self.accession_number),
            artist_id: at.integer("artistId", self.artist_id)?,
            title: non_empty(self.title),
            medium: non_empty(self.medium),
            year: non_empty(self.year),
            acquisition_year: at.year("acquisitionYear", self.acquisition_year)?,
            // Raw dimension text is kept exactly as supplied.
            width: self.width,
            height: self.height,
            depth: self.depth,
            ..Default::default()
        })
    }
}

impl ArtistRow {
    fn into_record(self, at: &RowRef<'_>) -> Result<ArtistRecord, CollectionError> {
        Ok(ArtistRecord {
            id: at.id(self.id)?,
            name: non_empty(self.name).unwrap_or_default(),
            gender: non_empty(self.gender),
            year_of_birth: at.year("yearOfBirth", self.year_of_birth)?,
            year_of_death: at.year("yearOfDeath", self.year_of_death)?,
            place_of_birth: non_empty(self.place_of_birth),
            place_of_death: non_empty(self.place_of_death),
            nationality: non_empty(self.nationality),
            ..Default::default()
        })
    }
}

fn progress_bar(show: bool) -> ProgressBar {
    if show {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    }
}

/// Deserializes every data row, handing each to `each` with its line number.
fn read_rows<R, T, F>(reader: R, show_progress: bool, mut each: F) -> Result<usize>
where
    R: Read,
    T: DeserializeOwned,
    F: FnMut(T, u64) -> Result<()>,
{
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().map_err(CollectionError::from)?.clone();
    let pb = progress_bar(show_progress);
    let mut count = 0;

    for result in rdr.records() {
        let record = result.map_err(CollectionError::from)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: T = record.deserialize(Some(&headers)).map_err(CollectionError::from)?;
        each(row, line)?;
        count += 1;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(count)
}

pub fn import_artworks<R: Read>(
    reader: R,
    source_name: &str,
    store: &mut CollectionStore,
    show_progress: bool,
) -> Result<usize> {
    let count = store.atomic(|store| {
        read_rows(reader, show_progress, |row: ArtworkRow, line| {
            let at = RowRef { source_name, line };
            store.add_artwork(row.into_record(&at)?)
        })
    })?;

    info!("Imported {} artworks from {}", count, source_name);
    Ok(count)
}

pub fn import_artists<R: Read>(
    reader: R,
    source_name: &str,
    store: &mut CollectionStore,
    show_progress: bool,
) -> Result<usize> {
    let count = store.atomic(|store| {
        read_rows(reader, show_progress, |row: ArtistRow, line| {
            let at = RowRef { source_name, line };
            store.add_artist(row.into_record(&at)?)
        })
    })?;

    info!("Imported {} artists from {}", count, source_name);
    Ok(count)
}

/// Loads both source files as one unit; a failure in either leaves the store untouched.
pub fn import_files(
    artists_csv: &Path,
    artworks_csv: &Path,
    store: &mut CollectionStore,
    show_progress: bool,
) -> Result<(usize, usize)> {
    let artists = std::fs::File::open(artists_csv)
        .with_context(|| format!("Failed to open artists file: {:?}", artists_csv))?;
    let artworks = std::fs::File::open(artworks_csv)
        .with_context(|| format!("Failed to open artworks file: {:?}", artworks_csv))?;

    store.atomic(|store| {
        let artist_count =
            import_artists(artists, &artists_csv.display().to_string(), store, show_progress)?;
        let artwork_count =
            import_artworks(artworks, &artworks_csv.display().to_string(), store, show_progress)?;
        Ok((artist_count, artwork_count))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const ARTISTS: &str = "\
id,name,gender,dates,yearOfBirth,yearOfDeath,placeOfBirth,placeOfDeath,url
10,\"Abbey, Edwin Austin\",Male,1852–1911,1852,1911,Philadelphia,London,http://x
11,Anonymous,,,0,0,,,http://y
12,\"Hall, Clara\",Female,born 1960,1960.0,,Leeds,,http://z
";

    const ARTWORKS: &str = "\
id,accession_number,artist,artistId,title,medium,year,acquisitionYear,width,height,depth,units
1035,A00001,\"Blake, Robert\",10,A Figure,Watercolour,no date,1922,394,419,,mm
1036,A00002,\"Blake, Robert\",99,Two Figures,Oil paint on canvas,1785,1922.0,  45.5 CM ,120mm,,mm
";

    #[test]
    fn test_import_artists_and_artworks() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        assert_eq!(import_artists(Cursor::new(ARTISTS), "artists.csv", &mut store, false)?, 3);
        assert_eq!(import_artworks(Cursor::new(ARTWORKS), "artworks.csv", &mut store, false)?, 2);

        let anon = store.artist(11)?.expect("artist 11");
        assert_eq!(anon.year_of_birth, Some(0));
        assert_eq!(anon.gender, None);

        let hall = store.artist(12)?.expect("artist 12");
        assert_eq!(hall.year_of_birth, Some(1960));
        assert_eq!(hall.year_of_death, None);

        let second = store.artwork(1036)?.expect("artwork 1036");
        assert_eq!(second.artist_id, Some(99));
        assert_eq!(second.acquisition_year, Some(1922));
        assert_eq!(second.width.as_deref(), Some("  45.5 CM "));
        assert_eq!(second.depth, None);
        assert_eq!(second.cleaned_width, None);
        Ok(())
    }

    #[test]
    fn test_missing_id_aborts_import() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        let csv = "id,name\n1,A\n,B\n";
        let err = import_artists(Cursor::new(csv), "artists.csv", &mut store, false).unwrap_err();
        match err.downcast_ref::<CollectionError>() {
            Some(CollectionError::MissingIdentity { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_duplicate_id_aborts_import() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        let csv = "id,name\n1,A\n1,B\n";
        let err = import_artists(Cursor::new(csv), "artists.csv", &mut store, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectionError>(),
            Some(CollectionError::DuplicateKey { table: "artists", id: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_non_numeric_year_is_rejected() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;
        let csv = "id,name,yearOfBirth\n1,A,c.1900\n";
        let err = import_artists(Cursor::new(csv), "artists.csv", &mut store, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectionError>(),
            Some(CollectionError::InvalidField { field: "yearOfBirth", .. })
        ));
        Ok(())
    }

    fn numbered_artists(ids: impl Iterator<Item = i64>) -> String {
        let mut csv = String::from("id,name\n");
        for id in ids {
            csv.push_str(&format!("{id},Artist {id}\n"));
        }
        csv
    }

    #[test]
    fn test_failed_import_rolls_back_flushed_batches() -> Result<()> {
        let mut store = CollectionStore::open_in_memory()?;

        // The first 1000 rows fill a buffer and are flushed before the duplicate is seen.
        let mut broken = numbered_artists(1..=1000);
        broken.push_str("5,Duplicate\n");
        let err = import_artists(Cursor::new(broken), "artists.csv", &mut store, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectionError>(),
            Some(CollectionError::DuplicateKey { table: "artists", id: 5 })
        ));
        assert_eq!(store.count_artists()?, 0);

        let fixed = numbered_artists(1..=1000);
        assert_eq!(import_artists(Cursor::new(fixed), "artists.csv", &mut store, false)?, 1000);
        assert_eq!(store.count_artists()?, 1000);
        Ok(())
    }

    #[test]
    fn test_import_files_is_all_or_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let artists_path = dir.path().join("artist_data.csv");
        let artworks_path = dir.path().join("artwork_data.csv");
        std::fs::write(&artists_path, ARTISTS)?;
        std::fs::write(&artworks_path, "id,accession_number\n1,A1\n,A2\n")?;

        let mut store = CollectionStore::open_in_memory()?;
        assert!(import_files(&artists_path, &artworks_path, &mut store, false).is_err());
        assert_eq!(store.count_artists()?, 0);
        assert_eq!(store.count_artworks()?, 0);

        std::fs::write(&artworks_path, ARTWORKS)?;
        assert_eq!(import_files(&artists_path, &artworks_path, &mut store, false)?, (3, 2));
        Ok(())
    }

    #[test]
    fn test_import_files_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let artists_path = dir.path().join("artist_data.csv");
        let artworks_path = dir.path().join("artwork_data.csv");
        std::fs::File::create(&artists_path)?.write_all(ARTISTS.as_bytes())?;
        std::fs::File::create(&artworks_path)?.write_all(ARTWORKS.as_bytes())?;

        let mut store = CollectionStore::open_in_memory()?;
        let counts = import_files(&artists_path, &artworks_path, &mut store, false)?;
        assert_eq!(counts, (3, 2));
        Ok(())
    }
}
