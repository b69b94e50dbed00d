//! Catalog I/O: load the paper and conference JSON files, seed remote fields
//! from a prior run's output, and write the updated catalog back atomically.
//!
//! The output file has the same shape as the input, with remote fields
//! populated. It is written once at the end of a full batch, to a temp file
//! in the target directory that is renamed into place, so a crashed run
//! never leaves a half-written catalog behind.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use zenodo_sync_core::models::{Conference, ConferenceTable, Paper};

pub fn load_papers(path: &Path) -> Result<Vec<Paper>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read paper catalog {}", path.display()))?;
    let papers: Vec<Paper> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse paper catalog {}", path.display()))?;
    info!(count = papers.len(), path = %path.display(), "Loaded paper catalog");
    Ok(papers)
}

pub fn load_conferences(path: &Path) -> Result<ConferenceTable> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read conference catalog {}", path.display()))?;
    let conferences: HashMap<String, Conference> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse conference catalog {}", path.display()))?;
    info!(count = conferences.len(), path = %path.display(), "Loaded conference catalog");
    Ok(conferences)
}

/// Load a previous run's output, if the file exists.
pub fn load_prior(path: &Path) -> Result<Option<Vec<Paper>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read prior output {}", path.display()))?;
    let papers: Vec<Paper> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse prior output {}", path.display()))?;
    info!(count = papers.len(), path = %path.display(), "Loaded prior output catalog");
    Ok(Some(papers))
}

/// Copy remote fields from a prior run's records onto the input papers,
/// matched by title. Fields already present on the input win.
pub fn seed_from_prior(papers: &mut [Paper], prior: &[Paper]) {
    let by_title: HashMap<&str, &Paper> =
        prior.iter().map(|p| (p.title.as_str(), p)).collect();
    let mut seeded = 0usize;
    for paper in papers.iter_mut() {
        let Some(previous) = by_title.get(paper.title.as_str()) else {
            continue;
        };
        if paper.zenodo_id.is_none() {
            paper.zenodo_id = previous.zenodo_id;
        }
        if paper.doi.is_none() {
            paper.doi = previous.doi.clone();
        }
        if paper.url.is_none() {
            paper.url = previous.url.clone();
        }
        if paper.version.is_none() {
            paper.version = previous.version;
        }
        if paper.zenodo_id.is_some() {
            seeded += 1;
        }
    }
    info!(seeded, total = papers.len(), "Seeded papers from prior output");
}

/// Apply the sampling cap: shuffle, then keep at most `max` papers.
pub fn sample(mut papers: Vec<Paper>, max: Option<usize>) -> Vec<Paper> {
    let Some(max) = max else { return papers };
    if papers.len() > max {
        warn!(max, total = papers.len(), "Sampling paper catalog down");
        papers.shuffle(&mut rand::thread_rng());
        papers.truncate(max);
    }
    papers
}

/// Write the output catalog atomically: temp file in the same directory,
/// then rename into place.
pub fn write_output(path: &Path, papers: &[Paper]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = parent.unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    let body = serde_json::to_string_pretty(papers).context("failed to serialize output")?;
    tmp.write_all(body.as_bytes())
        .context("failed to write output")?;
    tmp.persist(path)
        .with_context(|| format!("failed to persist output to {}", path.display()))?;
    info!(count = papers.len(), path = %path.display(), "Wrote output catalog");
    Ok(())
}
