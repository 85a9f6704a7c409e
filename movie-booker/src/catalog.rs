//! Loads the initial catalog from a JSON file:
//!
//! ```json
//! { "movies": [ { "title": "Heat", "theaters": ["Odeon", "Rex"] } ] }
//! ```
//!
//! Individual entries that cannot be used are skipped with a warning; only a
//! document without a `movies` array is an error.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::inventory::MovieBooker;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    movies: Vec<Value>,
}

/// Registers every usable movie and returns how many were added.
pub fn load_from_str(json: &str, booker: &dyn MovieBooker) -> Result<usize> {
    let catalog: CatalogFile = serde_json::from_str(json).context("invalid catalog document")?;

    let mut added = 0;
    for (index, entry) in catalog.movies.iter().enumerate() {
        let Some(title) = entry.get("title").and_then(Value::as_str) else {
            warn!(index, "skipping catalog entry without a title");
            continue;
        };
        let theaters: Vec<&str> = entry
            .get("theaters")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        match booker.add_movie(title, &theaters) {
            Ok(()) => added += 1,
            Err(err) => warn!(index, title, error = %err, "skipping catalog entry"),
        }
    }

    Ok(added)
}

pub fn load_from_path(path: impl AsRef<Path>, booker: &dyn MovieBooker) -> Result<usize> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let added = load_from_str(&json, booker)
        .with_context(|| format!("failed to load catalog {}", path.display()))?;

    info!(path = %path.display(), movies = added, "catalog loaded");
    Ok(added)
}
