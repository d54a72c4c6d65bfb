//! Read-only aggregate reports.
//!
//! Numeric work uses the cleaned columns only. Raw dimension and year text
//! is never parsed here.

use rusqlite::{Connection, params};
use anyhow::{Result, Context};
use serde::Serialize;

use crate::clean::years::{KNOWN_LIFESPAN_SQL, LIFESPAN_SQL};
use crate::database::repo::sql_limit;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub artworks: i64,
    pub artworks_with_dimensions: i64,
    pub artists: i64,
    pub artists_with_lifespan: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRank {
    pub rank: i64,
    pub artist_id: i64,
    pub name: String,
    pub artworks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediumDimensions {
    pub medium: String,
    pub measured: i64,
    pub avg_width: f64,
    pub avg_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LargestInDecade {
    pub decade: i32,
    pub artwork_id: i64,
    pub title: Option<String>,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifespanStats {
    pub gender: String,
    pub artists: i64,
    pub avg_years: f64,
    pub min_years: i32,
    pub max_years: i32,
}

const UNKNOWN: &str = "Unknown";

pub fn summary(conn: &Connection) -> Result<CollectionSummary> {
    conn.query_row(
        &format!(
            "SELECT
                (SELECT COUNT(*) FROM artworks),
                (SELECT COUNT(*) FROM artworks
                 WHERE cleaned_width IS NOT NULL
                    OR cleaned_height IS NOT NULL
                    OR cleaned_depth IS NOT NULL),
                (SELECT COUNT(*) FROM artists),
                (SELECT COUNT(*) FROM artists WHERE {KNOWN_LIFESPAN_SQL})"
        ),
        [],
        |row| {
            Ok(CollectionSummary {
                artworks: row.get(0)?,
                artworks_with_dimensions: row.get(1)?,
                artists: row.get(2)?,
                artists_with_lifespan: row.get(3)?,
            })
        },
    )
    .context("Failed to compute collection summary")
}

/// Artworks per artist gender as a share of all artworks.
/// Artworks without a resolvable artist count under "Unknown".
pub fn gender_share(conn: &Connection) -> Result<Vec<CategoryShare>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(NULLIF(ar.gender, ''), ?1) AS category,
                COUNT(*) AS n,
                100.0 * COUNT(*) / SUM(COUNT(*)) OVER () AS pct
         FROM artworks aw
         LEFT JOIN artists ar ON ar.id = aw.artist_id
         GROUP BY category
         ORDER BY n DESC, category",
    )?;
    let rows = stmt.query_map(params![UNKNOWN], share_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to compute gender share")
}

/// Artists per nationality as a share of all artists.
pub fn nationality_share(conn: &Connection) -> Result<Vec<CategoryShare>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(NULLIF(nationality, ''), ?1) AS category,
                COUNT(*) AS n,
                100.0 * COUNT(*) / SUM(COUNT(*)) OVER () AS pct
         FROM artists
         GROUP BY category
         ORDER BY n DESC, category",
    )?;
    let rows = stmt.query_map(params![UNKNOWN], share_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to compute nationality share")
}

fn share_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CategoryShare> {
    Ok(CategoryShare {
        category: row.get(0)?,
        count: row.get(1)?,
        percent: row.get(2)?,
    })
}

/// Artists ranked by number of artworks. Ties share a rank; every artist at
/// a rank up to `limit` is returned.
pub fn top_artists(conn: &Connection, limit: usize) -> Result<Vec<ArtistRank>> {
    let mut stmt = conn.prepare(
        "SELECT rnk, id, name, n FROM (
             SELECT ar.id, ar.name, COUNT(aw.id) AS n,
                    RANK() OVER (ORDER BY COUNT(aw.id) DESC) AS rnk
             FROM artists ar
             JOIN artworks aw ON aw.artist_id = ar.id
             GROUP BY ar.id, ar.name
         )
         WHERE rnk <= ?1
         ORDER BY rnk, name",
    )?;
    let rows = stmt.query_map(params![sql_limit(limit)], |row| {
        Ok(ArtistRank {
            rank: row.get(0)?,
            artist_id: row.get(1)?,
            name: row.get(2)?,
            artworks: row.get(3)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to rank artists")
}

/// Average cleaned width and height per medium, over artworks that have both.
pub fn medium_dimensions(conn: &Connection) -> Result<Vec<MediumDimensions>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(NULLIF(medium, ''), ?1) AS m,
                COUNT(*) AS n,
                AVG(cleaned_width),
                AVG(cleaned_height)
         FROM artworks
         WHERE cleaned_width IS NOT NULL AND cleaned_height IS NOT NULL
         GROUP BY m
         ORDER BY n DESC, m",
    )?;
    let rows = stmt.query_map(params![UNKNOWN], |row| {
        Ok(MediumDimensions {
            medium: row.get(0)?,
            measured: row.get(1)?,
            avg_width: row.get(2)?,
            avg_height: row.get(3)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to compute medium dimensions")
}

/// Largest artwork by cleaned area for each acquisition decade. Ties are all kept.
pub fn largest_per_decade(conn: &Connection) -> Result<Vec<LargestInDecade>> {
    let mut stmt = conn.prepare(
        "SELECT decade, id, title, area FROM (
             SELECT (acquisition_year / 10) * 10 AS decade,
                    id, title,
                    cleaned_width * cleaned_height AS area,
                    RANK() OVER (
                        PARTITION BY (acquisition_year / 10)
                        ORDER BY cleaned_width * cleaned_height DESC
                    ) AS rnk
             FROM artworks
             WHERE acquisition_year IS NOT NULL
               AND cleaned_width IS NOT NULL
               AND cleaned_height IS NOT NULL
         )
         WHERE rnk = 1
         ORDER BY decade, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(LargestInDecade {
            decade: row.get(0)?,
            artwork_id: row.get(1)?,
            title: row.get(2)?,
            area: row.get(3)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to rank artworks per decade")
}

/// Lifespan statistics per gender, over artists with a known positive lifespan.
pub fn lifespan_by_gender(conn: &Connection) -> Result<Vec<LifespanStats>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE(NULLIF(gender, ''), ?1) AS g,
                COUNT(*),
                AVG({LIFESPAN_SQL}),
                MIN({LIFESPAN_SQL}),
                MAX({LIFESPAN_SQL})
         FROM artists
         WHERE {KNOWN_LIFESPAN_SQL}
         GROUP BY g
         ORDER BY g"
    ))?;
    let rows = stmt.query_map(params![UNKNOWN], |row| {
        Ok(LifespanStats {
            gender: row.get(0)?,
            artists: row.get(1)?,
            avg_years: row.get(2)?,
            min_years: row.get(3)?,
            max_years: row.get(4)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("Failed to compute lifespans")
}
