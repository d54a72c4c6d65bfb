use crate::database::repo::ArtistRecord;

/// Raw source files use 0 for "unknown year".
pub const UNKNOWN_YEAR: i32 = 0;

/// SQL expression for an artist's lifespan in years, over the `artists` table.
pub const LIFESPAN_SQL: &str = "(cleaned_death_year - cleaned_birth_year)";

/// SQL predicate selecting artists whose lifespan is known and positive.
/// Must agree with [`lifespan`].
pub const KNOWN_LIFESPAN_SQL: &str = "(cleaned_birth_year IS NOT NULL \
     AND cleaned_death_year IS NOT NULL \
     AND cleaned_death_year - cleaned_birth_year > 0)";

pub fn clean_year(raw: Option<i32>) -> Option<i32> {
    raw.filter(|year| *year != UNKNOWN_YEAR)
}

/// Cleans birth and death year of one artist, touching only empty derived fields.
/// Returns how many derived fields were populated.
pub fn clean_years(record: &mut ArtistRecord) -> usize {
    let mut filled = 0;
    if record.cleaned_birth_year.is_none() {
        record.cleaned_birth_year = clean_year(record.year_of_birth);
        filled += usize::from(record.cleaned_birth_year.is_some());
    }
    if record.cleaned_death_year.is_none() {
        record.cleaned_death_year = clean_year(record.year_of_death);
        filled += usize::from(record.cleaned_death_year.is_some());
    }
    filled
}

/// Lifespan in years, or `None` when either year is unknown or the span is not positive.
/// A zero or negative span points at bad source data and is left out of every aggregate.
pub fn lifespan(birth: Option<i32>, death: Option<i32>) -> Option<i32> {
    let span = death?.checked_sub(birth?)?;
    (span > 0).then_some(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_mapping() {
        assert_eq!(clean_year(Some(0)), None);
        assert_eq!(clean_year(None), None);
        assert_eq!(clean_year(Some(1975)), Some(1975));
        assert_eq!(clean_year(Some(-50)), Some(-50));
    }

    #[test]
    fn test_clean_years_only_fills_nulls() {
        let mut artist = ArtistRecord {
            id: 7,
            name: "Unknown birth".to_string(),
            year_of_birth: Some(0),
            year_of_death: Some(1975),
            ..Default::default()
        };

        assert_eq!(clean_years(&mut artist), 1);
        assert_eq!(artist.cleaned_birth_year, None);
        assert_eq!(artist.cleaned_death_year, Some(1975));

        artist.year_of_death = Some(1980);
        assert_eq!(clean_years(&mut artist), 0);
        assert_eq!(artist.cleaned_death_year, Some(1975));
    }

    #[test]
    fn test_lifespan_exclusions() {
        assert_eq!(lifespan(Some(1900), Some(1975)), Some(75));
        assert_eq!(lifespan(Some(1990), Some(1990)), None);
        assert_eq!(lifespan(Some(1990), Some(1950)), None);
        assert_eq!(lifespan(None, Some(1975)), None);
        assert_eq!(lifespan(Some(1900), None), None);
    }

    #[test]
    fn test_sql_predicate_matches_lifespan() -> anyhow::Result<()> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE artists (id INTEGER PRIMARY KEY, cleaned_birth_year INTEGER, cleaned_death_year INTEGER);",
        )?;
        let cases = [
            (Some(1900), Some(1975)),
            (Some(1990), Some(1990)),
            (Some(1990), Some(1950)),
            (None, Some(1975)),
            (Some(1900), None),
            (None, None),
        ];
        for (id, (birth, death)) in cases.iter().enumerate() {
            conn.execute(
                "INSERT INTO artists (id, cleaned_birth_year, cleaned_death_year) VALUES (?1, ?2, ?3)",
                rusqlite::params![id as i64, birth, death],
            )?;
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT id, {LIFESPAN_SQL} FROM artists WHERE {KNOWN_LIFESPAN_SQL} ORDER BY id"
        ))?;
        let from_sql: Vec<(i64, i32)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let from_rust: Vec<(i64, i32)> = cases
            .iter()
            .enumerate()
            .filter_map(|(id, (birth, death))| lifespan(*birth, *death).map(|span| (id as i64, span)))
            .collect();

        assert_eq!(from_sql, from_rust);
        Ok(())
    }
}
