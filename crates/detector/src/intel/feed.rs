#![forbid(unsafe_code)]

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to open feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON feed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed CSV feed: {0}")]
    Csv(#[from] csv::Error),
}

/// One record of a JSON feed. Either digest may be missing or empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashRecord {
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl HashRecord {
    pub fn digests(&self) -> impl Iterator<Item = &str> {
        [self.md5.as_deref(), self.sha256.as_deref()]
            .into_iter()
            .flatten()
            .filter(|digest| !digest.is_empty())
    }
}

pub(crate) fn read_json_feed(path: &Path) -> Result<Vec<String>, FeedError> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<HashRecord> = serde_json::from_reader(reader)?;
    Ok(records
        .iter()
        .flat_map(HashRecord::digests)
        .map(str::to_owned)
        .collect())
}

pub(crate) fn read_csv_feed(path: &Path) -> Result<Vec<String>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut digests = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let Some(first) = record.get(0) else {
            continue;
        };
        if index == 0 && (first == "md5" || first == "sha256") {
            continue;
        }
        if is_digest(first) {
            digests.push(first.to_owned());
        }
    }
    Ok(digests)
}

/// An md5 (32) or sha256 (64) hex string.
pub(crate) fn is_digest(candidate: &str) -> bool {
    matches!(candidate.len(), 32 | 64) && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn feed(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_skips_header_and_rejects_wrong_length() {
        let file = feed("md5\nd41d8cd98f00b204e9800998ecf8427e\nbad\n");
        let digests = read_csv_feed(file.path()).unwrap();
        assert_eq!(digests, vec!["d41d8cd98f00b204e9800998ecf8427e".to_string()]);
    }

    #[test]
    fn csv_header_match_is_case_sensitive() {
        let file = feed("MD5\nd41d8cd98f00b204e9800998ecf8427e\n");
        // "MD5" is neither a header nor a digest; the digest row still counts.
        assert_eq!(read_csv_feed(file.path()).unwrap().len(), 1);
    }

    #[test]
    fn csv_uses_first_column_only() {
        let sha = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let file = feed(&format!(
            "sha256,family\n{sha},emotet\nnot-a-hash,{sha}\n"
        ));
        assert_eq!(read_csv_feed(file.path()).unwrap(), vec![sha.to_string()]);
    }

    #[test]
    fn json_collects_both_digest_fields() {
        let file = feed(
            r#"[
                {"md5": "d41d8cd98f00b204e9800998ecf8427e", "type": "trojan"},
                {"sha256": "abc", "md5": ""},
                {"md5": null},
                {}
            ]"#,
        );
        let digests = read_json_feed(file.path()).unwrap();
        assert_eq!(
            digests,
            vec!["d41d8cd98f00b204e9800998ecf8427e".to_string(), "abc".to_string()]
        );
    }

    #[test]
    fn json_rejects_non_array() {
        let file = feed(r#"{"md5": "d41d8cd98f00b204e9800998ecf8427e"}"#);
        assert!(matches!(read_json_feed(file.path()), Err(FeedError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert!(matches!(read_csv_feed(&path), Err(FeedError::Io(_)) | Err(FeedError::Csv(_))));
        assert!(matches!(read_json_feed(&path), Err(FeedError::Io(_))));
    }

    proptest! {
        #[test]
        fn digest_shape(candidate in "[0-9a-fA-Fxz]{0,70}") {
            let expected = (candidate.len() == 32 || candidate.len() == 64)
                && candidate.chars().all(|c| c.is_ascii_hexdigit());
            prop_assert_eq!(is_digest(&candidate), expected);
        }
    }
}
