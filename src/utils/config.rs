use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use anyhow::{Result, Context, anyhow};
use tracing::info;

pub const ARTWORKS_FILE: &str = "artwork_data.csv";
pub const ARTISTS_FILE: &str = "artist_data.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPaths {
    pub artworks_csv: PathBuf,
    pub artists_csv: PathBuf,
}

/// Resolves the source CSV files.
/// Explicit paths win; otherwise .env is checked, then the filesystem is searched.
pub fn get_collection_paths(
    artworks_csv: Option<PathBuf>,
    artists_csv: Option<PathBuf>,
) -> Result<CollectionPaths> {
    if let (Some(artworks_csv), Some(artists_csv)) = (artworks_csv.clone(), artists_csv.clone()) {
        return Ok(CollectionPaths { artworks_csv, artists_csv });
    }

    let env_path = Path::new(".env");
    let found = match load_from_env(env_path) {
        Ok(paths) => {
            info!("Loaded source paths from .env");
            paths
        }
        Err(_) => {
            info!("Source files not listed in .env. Searching filesystem...");
            let paths = CollectionPaths {
                artworks_csv: find_file(ARTWORKS_FILE, 5)?,
                artists_csv: find_file(ARTISTS_FILE, 5)?,
            };
            info!("Found artworks file: {:?}", paths.artworks_csv);
            info!("Found artists file: {:?}", paths.artists_csv);

            save_to_env(env_path, &paths)?;
            info!("Saved paths to .env");
            paths
        }
    };

    Ok(CollectionPaths {
        artworks_csv: artworks_csv.unwrap_or(found.artworks_csv),
        artists_csv: artists_csv.unwrap_or(found.artists_csv),
    })
}

fn find_file(filename: &str, max_depth: usize) -> Result<PathBuf> {
    let root = std::env::current_dir()?;

    if let Some(path) = find_under(&root, filename, max_depth) {
        return Ok(path);
    }

    // Running from a subdirectory of the data checkout is common.
    if let Some(parent) = root.parent() {
        if let Some(path) = find_under(parent, filename, max_depth) {
            return Ok(path);
        }
    }

    Err(anyhow!("Could not find file '{}' in nearby directories.", filename))
}

fn find_under(root: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == filename)
        .map(|e| e.path().to_path_buf())
}

const ARTWORKS_KEY: &str = "ARTWORKS_CSV";
const ARTISTS_KEY: &str = "ARTISTS_CSV";

/// Splits `.env` text into `(key, value)` pairs. Blank lines, `#` comments and
/// lines without `=` are skipped; a later duplicate key wins on lookup.
fn parse_env(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn lookup<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .rev()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.as_str())
}

fn load_from_env(path: &Path) -> Result<CollectionPaths> {
    let text = fs::read_to_string(path)?;
    let entries = parse_env(&text);

    match (lookup(&entries, ARTWORKS_KEY), lookup(&entries, ARTISTS_KEY)) {
        (Some(artworks), Some(artists)) => Ok(CollectionPaths {
            artworks_csv: PathBuf::from(artworks),
            artists_csv: PathBuf::from(artists),
        }),
        _ => Err(anyhow!("Incomplete .env file")),
    }
}

/// Writes the source paths, replacing earlier values and keeping every other line.
fn save_to_env(path: &Path, paths: &CollectionPaths) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).context("Failed to read .env file"),
    };

    let mut out = String::new();
    for line in existing.lines() {
        let key = line.split_once('=').map(|(k, _)| k.trim());
        if matches!(key, Some(ARTWORKS_KEY) | Some(ARTISTS_KEY)) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("{ARTWORKS_KEY}={}\n", paths.artworks_csv.display()));
    out.push_str(&format!("{ARTISTS_KEY}={}\n", paths.artists_csv.display()));

    fs::write(path, out).context("Failed to write .env file")?;
    Ok(())
}
