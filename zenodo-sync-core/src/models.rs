//! Catalog records and the deposition metadata merge.
//!
//! [`Paper`] and [`Conference`] mirror the JSON catalogs on disk; unknown
//! fields are preserved through a flattened map so the output catalog keeps
//! the exact shape of the input. [`DepositionMetadata`] is the transient
//! merge of paper + conference + computed fields sent on a metadata update;
//! it is never persisted on its own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single conference-paper record from the local catalog.
///
/// The remote fields (`zenodo_id`, `doi`, `url`, `version`) are absent until
/// the first successful upload and written back in place afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub year: String,
    #[serde(default)]
    pub author: Vec<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    /// Location of the paper's PDF: a local path or an http(s) URL.
    #[serde(rename = "ee")]
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zenodo_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Version of the file currently stored remotely. Carried explicitly so
    /// no filename suffix ever needs to be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Per-year venue metadata, read-only input keyed by year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conference {
    pub conference_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_dates: Option<String>,
    /// Title of the proceedings volume the paper is part of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partof_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imprint_publisher: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Conference lookup table keyed by year.
pub type ConferenceTable = HashMap<String, Conference>;

/// One creator entry in the deposition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
}

/// Map the catalog author list to deposition creators, preserving order.
pub fn authors_to_creators(authors: &[String]) -> Vec<Creator> {
    authors
        .iter()
        .map(|name| Creator { name: name.clone() })
        .collect()
}

/// The metadata block sent on `update_metadata`, shaped for the remote API.
/// `Option` fields are dropped from the JSON body when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositionMetadata {
    pub title: String,
    pub upload_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partof_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partof_pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_dates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imprint_publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Build the merged metadata block for one paper and its conference.
pub fn merge_metadata(paper: &Paper, conference: &Conference) -> DepositionMetadata {
    DepositionMetadata {
        title: paper.title.clone(),
        upload_type: "publication".to_owned(),
        publication_type: Some("conferencepaper".to_owned()),
        publication_date: Some(format!("{}-01-01", paper.year)),
        description: paper
            .abstract_text
            .clone()
            .unwrap_or_else(|| paper.title.clone()),
        creators: authors_to_creators(&paper.author),
        partof_title: conference.partof_title.clone(),
        partof_pages: paper.pages.clone(),
        conference_title: Some(conference.conference_title.clone()),
        conference_place: conference.conference_place.clone(),
        conference_dates: conference.conference_dates.clone(),
        imprint_publisher: conference.imprint_publisher.clone(),
        version: paper.version.map(|v| v.to_string()),
    }
}
