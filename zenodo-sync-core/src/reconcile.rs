//! Reconciliation and versioning: the decision of what to do per paper.
//!
//! For each local paper record the reconciler decides between creating a new
//! remote record, opening a new version of an existing one, or skipping the
//! upload, based on a content-checksum comparison. Metadata update and
//! publish always run so the remote block stays current.
//!
//! - [`plan`] is the pure decision function, unit-testable without I/O.
//! - [`sync_paper`] executes one paper's plan against a [`Depositor`],
//!   issuing at most one file upload per pass.
//! - [`archive`] runs a whole catalog with bounded concurrency, collecting
//!   per-paper failures into a report instead of aborting the batch.

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::checksum::{self, ContentError};
use crate::config::{resolve_workers, RunOptions};
use crate::contract::{ApiError, Deposition, Depositor, EditOutcome};
use crate::models::{merge_metadata, ConferenceTable, Paper};

/// Failure of a single paper's sync; aborts that paper only.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no conference metadata for year {year}")]
    MissingConference { year: String },
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The action required to bring the remote record in line with the paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// No prior remote record: create, upload, annotate, publish.
    Create,
    /// Prior record exists: reopen it, upload only when the content changed,
    /// then refresh metadata and publish.
    Refresh { changed: bool, next_version: u32 },
}

/// Decide the required remote action from the local checksum and the cached
/// remote snapshot. Pure; every remote call is made by [`sync_paper`].
pub fn plan(paper: &Paper, local_checksum: &str, snapshot: Option<&Deposition>) -> Plan {
    let snapshot = match snapshot {
        Some(s) => s,
        None => return Plan::Create,
    };
    let changed = !snapshot
        .files
        .iter()
        .any(|f| f.checksum_hex() == local_checksum);
    // A record uploaded without a recorded version is at version 1.
    let previous = snapshot.version.or(paper.version).unwrap_or(1);
    Plan::Refresh {
        changed,
        next_version: previous + 1,
    }
}

/// Synchronise one paper against the remote, returning the updated record
/// with identifier, DOI, public URL and version written back.
///
/// In dry-run mode the decision logic (checksum comparison, conference
/// lookup) still runs, but no mutating call is issued and the record is
/// returned unchanged.
pub async fn sync_paper<D>(
    client: &D,
    paper: &Paper,
    conferences: &ConferenceTable,
    snapshot: Option<&Deposition>,
    options: &RunOptions,
) -> Result<Paper, SyncError>
where
    D: Depositor + ?Sized,
{
    let conference = conferences
        .get(&paper.year)
        .ok_or_else(|| SyncError::MissingConference {
            year: paper.year.clone(),
        })?;

    let content = checksum::load_content(&paper.file).await?;
    let local_checksum = checksum::md5_hex(&content);
    let action = plan(paper, &local_checksum, snapshot);
    debug!(
        title = %paper.title,
        checksum = %local_checksum,
        ?action,
        "Planned reconciliation action"
    );

    if options.dry_run {
        info!(title = %paper.title, ?action, "Dry run: skipping remote mutations");
        return Ok(paper.clone());
    }

    let mut updated = paper.clone();
    let filename = checksum::basename(&paper.file);

    match action {
        Plan::Create => {
            let draft = client.create().await?;
            info!(title = %paper.title, id = draft.id, "Created new draft deposition");
            client
                .upload_file(draft.id, filename, &content, None)
                .await?;
            let metadata = merge_metadata(&updated, conference);
            client.update_metadata(draft.id, &metadata).await?;
            let published = client.publish(draft.id).await?;
            info!(title = %paper.title, id = draft.id, doi = ?published.doi, "Published new deposition");

            updated.zenodo_id = Some(draft.id);
            updated.doi = published.doi;
            updated.url = published.doi_url;
            updated.version = Some(1);
        }
        Plan::Refresh {
            changed,
            next_version,
        } => {
            let prior = snapshot.expect("refresh plan requires a snapshot");
            let draft = match client.edit(prior.id).await? {
                EditOutcome::Opened(draft) => draft,
                EditOutcome::Locked => {
                    warn!(
                        title = %paper.title,
                        id = prior.id,
                        "Edit rejected, falling back to new version"
                    );
                    client.new_version(prior.id).await?
                }
            };
            // A freshly opened version has no content yet and must be fed
            // the file even when the checksum matches.
            let fresh_draft = draft.id != prior.id;
            if changed || fresh_draft {
                client
                    .upload_file(draft.id, filename, &content, Some(next_version))
                    .await?;
                updated.version = Some(next_version);
                info!(
                    title = %paper.title,
                    id = draft.id,
                    version = next_version,
                    "Uploaded new file version"
                );
            } else {
                updated.version = prior.version.or(paper.version).or(Some(1));
                info!(title = %paper.title, id = draft.id, "Content unchanged, skipping upload");
            }
            let mut refreshed = updated.clone();
            refreshed.zenodo_id = Some(draft.id);
            let metadata = merge_metadata(&refreshed, conference);
            client.update_metadata(draft.id, &metadata).await?;
            let published = client.publish(draft.id).await?;
            info!(title = %paper.title, id = draft.id, doi = ?published.doi, "Republished deposition");

            updated.zenodo_id = Some(draft.id);
            if published.doi.is_some() {
                updated.doi = published.doi;
            }
            if published.doi_url.is_some() {
                updated.url = published.doi_url;
            }
        }
    }

    Ok(updated)
}

/// Failure record for one paper in a batch run.
#[derive(Debug)]
pub struct SyncFailure {
    pub title: String,
    pub year: String,
    pub error: String,
}

/// Outcome of a batch run: updated records in input order, plus the papers
/// that failed. Failed papers are carried through unchanged so the output
/// catalog keeps the full shape of the input.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub papers: Vec<Paper>,
    pub failures: Vec<SyncFailure>,
}

/// Run a whole catalog through [`sync_paper`] with a bounded worker count.
/// Papers are independent; the conference table is shared read-only.
pub async fn archive<D>(
    client: &D,
    papers: Vec<Paper>,
    conferences: &ConferenceTable,
    options: &RunOptions,
) -> ArchiveReport
where
    D: Depositor,
{
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = resolve_workers(options.workers, available);
    info!(
        papers = papers.len(),
        workers,
        dry_run = options.dry_run,
        "Starting archive batch"
    );

    let mut results: Vec<(usize, Paper, Option<SyncError>)> =
        stream::iter(papers.into_iter().enumerate())
            .map(|(index, paper)| async move {
                let outcome = sync_one(client, &paper, conferences, options).await;
                match outcome {
                    Ok(updated) => (index, updated, None),
                    Err(err) => {
                        error!(title = %paper.title, error = %err, "Paper sync failed");
                        (index, paper, Some(err))
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

    // buffer_unordered yields in completion order; restore input order.
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = ArchiveReport::default();
    for (_, paper, failure) in results {
        if let Some(err) = failure {
            report.failures.push(SyncFailure {
                title: paper.title.clone(),
                year: paper.year.clone(),
                error: err.to_string(),
            });
        }
        report.papers.push(paper);
    }
    info!(
        synced = report.papers.len() - report.failures.len(),
        failed = report.failures.len(),
        "Archive batch complete"
    );
    report
}

/// Fetch the cached remote snapshot for a previously uploaded paper, then
/// reconcile. Papers without a remote id skip the fetch entirely.
async fn sync_one<D>(
    client: &D,
    paper: &Paper,
    conferences: &ConferenceTable,
    options: &RunOptions,
) -> Result<Paper, SyncError>
where
    D: Depositor + ?Sized,
{
    let snapshot = match paper.zenodo_id {
        Some(id) => Some(client.fetch(id).await?),
        None => None,
    };
    sync_paper(client, paper, conferences, snapshot.as_ref(), options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{DepositionFile, DepositionState};
    use std::collections::HashMap;

    fn paper() -> Paper {
        Paper {
            title: "A".to_owned(),
            year: "2020".to_owned(),
            author: vec!["Doe, Jane".to_owned()],
            abstract_text: None,
            pages: None,
            file: "a.pdf".to_owned(),
            zenodo_id: None,
            doi: None,
            url: None,
            version: None,
            extra: HashMap::new(),
        }
    }

    fn snapshot(id: u64, checksum: &str, version: Option<u32>) -> Deposition {
        Deposition {
            id,
            state: DepositionState::Published,
            files: vec![DepositionFile {
                filename: "a.pdf".into(),
                checksum: checksum.into(),
                download: None,
            }],
            metadata: None,
            doi: None,
            doi_url: None,
            version,
        }
    }

    #[test]
    fn no_snapshot_means_create() {
        assert_eq!(plan(&paper(), "aaaa", None), Plan::Create);
    }

    #[test]
    fn matching_checksum_means_unchanged_refresh() {
        let snap = snapshot(42, "aaaa", Some(3));
        assert_eq!(
            plan(&paper(), "aaaa", Some(&snap)),
            Plan::Refresh {
                changed: false,
                next_version: 4
            }
        );
    }

    #[test]
    fn checksum_prefix_does_not_defeat_comparison() {
        let snap = snapshot(42, "md5:aaaa", Some(1));
        assert_eq!(
            plan(&paper(), "aaaa", Some(&snap)),
            Plan::Refresh {
                changed: false,
                next_version: 2
            }
        );
    }

    #[test]
    fn differing_checksum_bumps_version() {
        let snap = snapshot(42, "aaaa", Some(2));
        assert_eq!(
            plan(&paper(), "bbbb", Some(&snap)),
            Plan::Refresh {
                changed: true,
                next_version: 3
            }
        );
    }

    #[test]
    fn version_defaults_to_one_when_absent() {
        let snap = snapshot(42, "aaaa", None);
        assert_eq!(
            plan(&paper(), "bbbb", Some(&snap)),
            Plan::Refresh {
                changed: true,
                next_version: 2
            }
        );
    }

    #[test]
    fn paper_version_seeds_the_lineage_when_snapshot_has_none() {
        let mut p = paper();
        p.version = Some(5);
        let snap = snapshot(42, "aaaa", None);
        assert_eq!(
            plan(&p, "bbbb", Some(&snap)),
            Plan::Refresh {
                changed: true,
                next_version: 6
            }
        );
    }

    #[test]
    fn snapshot_with_no_files_counts_as_changed() {
        let mut snap = snapshot(42, "aaaa", Some(1));
        snap.files.clear();
        assert_eq!(
            plan(&paper(), "aaaa", Some(&snap)),
            Plan::Refresh {
                changed: true,
                next_version: 2
            }
        );
    }
}
