pub mod queries;

use std::fmt::Write as _;
use rusqlite::Connection;
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use self::queries::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Summary,
    GenderShare,
    TopArtists,
    MediumDimensions,
    LargestPerDecade,
    NationalityShare,
    LifespanByGender,
}

impl ReportKind {
    pub const ALL: [ReportKind; 7] = [
        ReportKind::Summary,
        ReportKind::GenderShare,
        ReportKind::TopArtists,
        ReportKind::MediumDimensions,
        ReportKind::LargestPerDecade,
        ReportKind::NationalityShare,
        ReportKind::LifespanByGender,
    ];

    fn title(self) -> &'static str {
        match self {
            ReportKind::Summary => "Collection summary",
            ReportKind::GenderShare => "Artworks by artist gender",
            ReportKind::TopArtists => "Most represented artists",
            ReportKind::MediumDimensions => "Average dimensions by medium",
            ReportKind::LargestPerDecade => "Largest artwork per acquisition decade",
            ReportKind::NationalityShare => "Artists by nationality",
            ReportKind::LifespanByGender => "Artist lifespan by gender",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// One computed report, ready to render.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "report", content = "rows", rename_all = "snake_case")]
pub enum Report {
    Summary(CollectionSummary),
    GenderShare(Vec<CategoryShare>),
    TopArtists(Vec<ArtistRank>),
    MediumDimensions(Vec<MediumDimensions>),
    LargestPerDecade(Vec<LargestInDecade>),
    NationalityShare(Vec<CategoryShare>),
    LifespanByGender(Vec<LifespanStats>),
}

pub fn build(conn: &Connection, kind: ReportKind, top_n: usize) -> Result<Report> {
    Ok(match kind {
        ReportKind::Summary => Report::Summary(summary(conn)?),
        ReportKind::GenderShare => Report::GenderShare(gender_share(conn)?),
        ReportKind::TopArtists => Report::TopArtists(top_artists(conn, top_n)?),
        ReportKind::MediumDimensions => Report::MediumDimensions(medium_dimensions(conn)?),
        ReportKind::LargestPerDecade => Report::LargestPerDecade(largest_per_decade(conn)?),
        ReportKind::NationalityShare => Report::NationalityShare(nationality_share(conn)?),
        ReportKind::LifespanByGender => Report::LifespanByGender(lifespan_by_gender(conn)?),
    })
}

impl Report {
    fn kind(&self) -> ReportKind {
        match self {
            Report::Summary(_) => ReportKind::Summary,
            Report::GenderShare(_) => ReportKind::GenderShare,
            Report::TopArtists(_) => ReportKind::TopArtists,
            Report::MediumDimensions(_) => ReportKind::MediumDimensions,
            Report::LargestPerDecade(_) => ReportKind::LargestPerDecade,
            Report::NationalityShare(_) => ReportKind::NationalityShare,
            Report::LifespanByGender(_) => ReportKind::LifespanByGender,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let title = self.kind().title();
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{}", "-".repeat(title.len()));

        match self {
            Report::Summary(s) => {
                let _ = writeln!(out, "{:<28}{:>10}", "artworks", s.artworks);
                let _ = writeln!(out, "{:<28}{:>10}", "with cleaned dimensions", s.artworks_with_dimensions);
                let _ = writeln!(out, "{:<28}{:>10}", "artists", s.artists);
                let _ = writeln!(out, "{:<28}{:>10}", "with known lifespan", s.artists_with_lifespan);
            }
            Report::GenderShare(rows) | Report::NationalityShare(rows) => {
                for r in rows {
                    let _ = writeln!(out, "{:<28}{:>10}{:>9.2}%", r.category, r.count, r.percent);
                }
            }
            Report::TopArtists(rows) => {
                for r in rows {
                    let _ = writeln!(out, "{:>4}  {:<40}{:>8}", r.rank, r.name, r.artworks);
                }
            }
            Report::MediumDimensions(rows) => {
                for r in rows {
                    let _ = writeln!(
                        out,
                        "{:<40}{:>8}{:>12.1}{:>12.1}",
                        r.medium, r.measured, r.avg_width, r.avg_height
                    );
                }
            }
            Report::LargestPerDecade(rows) => {
                for r in rows {
                    let _ = writeln!(
                        out,
                        "{}s  #{:<8} {:<40}{:>14.1}",
                        r.decade,
                        r.artwork_id,
                        r.title.as_deref().unwrap_or("(untitled)"),
                        r.area
                    );
                }
            }
            Report::LifespanByGender(rows) => {
                for r in rows {
                    let _ = writeln!(
                        out,
                        "{:<12}{:>8}{:>10.1}{:>6}{:>6}",
                        r.gender, r.artists, r.avg_years, r.min_years, r.max_years
                    );
                }
            }
        }
        out
    }
}

pub fn render(reports: &[Report], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        OutputFormat::Text => Ok(reports
            .iter()
            .map(Report::to_text)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}
