//! Content checksums and file naming.
//!
//! The reconciler compares a locally computed MD5 digest against the checksum
//! the remote reports for a deposition's current file; MD5 because that is
//! what the remote reports. Content is read fully into memory once and the
//! same buffer is reused for the upload.

use md5::{Digest, Md5};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to download {location}: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Hex MD5 digest of a byte buffer.
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Load the paper content from a local path or an http(s) URL.
pub async fn load_content(location: &str) -> Result<Vec<u8>, ContentError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| ContentError::Http {
                location: location.to_owned(),
                source,
            })?;
        let bytes = response.bytes().await.map_err(|source| ContentError::Http {
            location: location.to_owned(),
            source,
        })?;
        Ok(bytes.to_vec())
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|source| ContentError::Io {
                location: location.to_owned(),
                source,
            })
    }
}

/// Final path or URL segment of a file location.
pub fn basename(location: &str) -> &str {
    location
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(location)
}

/// Insert a version suffix before the extension: `a.pdf` + 2 -> `a_2.pdf`.
pub fn versioned_filename(name: &str, version: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{version}.{ext}"),
        None => format!("{name}_{version}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn md5_matches_known_vector() {
        // RFC 1321 test vector for "abc".
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn basename_handles_paths_and_urls() {
        assert_eq!(basename("papers/2020/a.pdf"), "a.pdf");
        assert_eq!(basename("https://host/x/y/b.pdf"), "b.pdf");
        assert_eq!(basename("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn versioned_filename_inserts_suffix() {
        assert_eq!(versioned_filename("a.pdf", 2), "a_2.pdf");
        assert_eq!(versioned_filename("archive.tar.gz", 3), "archive.tar_3.gz");
        assert_eq!(versioned_filename("noext", 4), "noext_4");
    }

    #[tokio::test]
    async fn load_content_reads_local_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"pdf bytes").unwrap();
        let content = load_content(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(content, b"pdf bytes");
    }

    #[tokio::test]
    async fn load_content_reports_missing_files() {
        let err = load_content("/definitely/not/here.pdf").await.unwrap_err();
        assert!(matches!(err, ContentError::Io { .. }));
    }
}
