//! Reproducibility verification
//!
//! Asserts that two archives (or an archive and a previously recorded
//! hash) are identical, and on mismatch names the first differing entry
//! to point at the regression. Diagnostic only; nothing is repaired.

use crate::archive::assemble::sha256_hex;
use crate::error::{DocforgeError, DocforgeResult};
use serde::Serialize;
use std::io::Read;

/// Outcome of a verification, kept for audit alongside the hashes.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub matches: bool,
    pub left_sha256: String,
    pub right_sha256: String,
    /// First point of divergence, when entry-level diagnostics were
    /// possible.
    pub first_divergence: Option<String>,
}

/// Compare two archives byte-for-byte via their content hashes.
///
/// On mismatch the tar entries of both are walked to describe where the
/// archives first disagree.
pub fn compare(left: &[u8], right: &[u8]) -> VerifyReport {
    let left_sha256 = sha256_hex(left);
    let right_sha256 = sha256_hex(right);

    if left_sha256 == right_sha256 {
        return VerifyReport {
            matches: true,
            left_sha256,
            right_sha256,
            first_divergence: None,
        };
    }

    VerifyReport {
        matches: false,
        left_sha256,
        right_sha256,
        first_divergence: find_divergence(left, right),
    }
}

/// Compare an archive against a previously recorded hash.
pub fn against_hash(bytes: &[u8], expected_hex: &str) -> VerifyReport {
    let actual = sha256_hex(bytes);
    let expected = expected_hex.trim().to_ascii_lowercase();
    let matches = actual == expected;
    VerifyReport {
        matches,
        left_sha256: actual,
        right_sha256: expected,
        first_divergence: None,
    }
}

/// Entry list of a gzip-compressed tar: (path, content hash) pairs in
/// archive order.
fn entries(bytes: &[u8]) -> DocforgeResult<Vec<(String, String)>> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    let mut result = vec![];

    let iter = archive
        .entries()
        .map_err(|e| DocforgeError::io("reading archive entries", e))?;
    for entry in iter {
        let mut entry = entry.map_err(|e| DocforgeError::io("reading archive entry", e))?;
        let path = entry
            .path()
            .map_err(|e| DocforgeError::io("reading archive entry path", e))?
            .to_string_lossy()
            .into_owned();
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| DocforgeError::io(format!("reading archive entry {path}"), e))?;
        result.push((path, sha256_hex(&content)));
    }
    Ok(result)
}

fn find_divergence(left: &[u8], right: &[u8]) -> Option<String> {
    let (left_entries, right_entries) = match (entries(left), entries(right)) {
        (Ok(l), Ok(r)) => (l, r),
        // Undecodable input still fails verification; there is just no
        // entry-level story to tell.
        _ => return Some("archive contents could not be decoded".to_string()),
    };

    for (l, r) in left_entries.iter().zip(right_entries.iter()) {
        if l.0 != r.0 {
            return Some(format!("entry order differs: '{}' vs '{}'", l.0, r.0));
        }
        if l.1 != r.1 {
            return Some(format!("entry '{}' differs", l.0));
        }
    }

    match left_entries.len().cmp(&right_entries.len()) {
        std::cmp::Ordering::Less => {
            let missing = &right_entries[left_entries.len()].0;
            Some(format!("entry '{missing}' is missing from the first archive"))
        }
        std::cmp::Ordering::Greater => {
            let missing = &left_entries[right_entries.len()].0;
            Some(format!("entry '{missing}' is missing from the second archive"))
        }
        // Same entries, same contents: the difference is in headers or
        // compression metadata.
        std::cmp::Ordering::Equal => {
            Some("entries match; archives differ in metadata".to_string())
        }
    }
}
